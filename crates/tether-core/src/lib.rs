//! Core types for the tether connection manager: the wire envelope, the
//! channel state machine vocabulary, and the capability traits a channel is
//! wired with (transport, status sink, wire policy).

pub mod envelope;
pub mod error;
pub mod handler;
pub mod options;
pub mod state;
pub mod status;
pub mod transport;

pub use envelope::{Envelope, Frame};
pub use error::ChannelError;
pub use handler::{JsonHandler, WireHandler};
pub use options::ConnectOptions;
pub use state::ChannelState;
pub use status::StatusSink;
pub use transport::{CloseInfo, EventSender, Transport, TransportEvent};
