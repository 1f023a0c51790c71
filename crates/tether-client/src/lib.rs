//! Channel and registry: the client side of a long-lived, frame-based
//! connection. One [`Channel`] owns a state machine, a pending-request
//! queue, a listener registry, and the heartbeat/idle/reconnect timers;
//! a [`ChannelRegistry`] multiplexes several channels behind integer ids.

pub mod channel;
pub mod listeners;
pub mod mock;
pub mod pending;
pub mod registry;
mod timer;

pub use channel::Channel;
pub use listeners::EventFn;
pub use registry::{ChannelRegistry, DEFAULT_CHANNEL};
