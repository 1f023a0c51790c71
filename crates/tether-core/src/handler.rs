use serde_json::Value;

use crate::envelope::{Envelope, Frame};

/// Injected wire policy: content legality and the keep-alive frame.
///
/// The channel runs `is_legal` on every inbound frame before decoding and
/// dispatching it; illegal frames are dropped and logged without touching
/// timers or the pending queue.
pub trait WireHandler: Send + Sync {
    /// Whether an inbound frame may be dispatched.
    fn is_legal(&self, frame: &Frame) -> bool;

    /// The envelope to send after the heartbeat interval of silence.
    fn heartbeat(&self) -> Envelope;
}

/// Default policy: a frame is legal iff it decodes as an envelope, and the
/// heartbeat is `{"cmd":"heartbeat","data":null}`.
#[derive(Clone, Debug, Default)]
pub struct JsonHandler;

impl WireHandler for JsonHandler {
    fn is_legal(&self, frame: &Frame) -> bool {
        Envelope::decode(frame).is_ok()
    }

    fn heartbeat(&self) -> Envelope {
        Envelope::new("heartbeat", Value::Null)
    }
}
