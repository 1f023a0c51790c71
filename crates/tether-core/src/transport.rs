use tokio::sync::mpsc;

use crate::envelope::Frame;
use crate::options::ConnectOptions;

/// Sender half a transport uses to deliver events back into its channel.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Lifecycle and traffic events a transport reports to its channel.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// The connection attempt succeeded.
    Connected,
    /// An inbound frame arrived.
    Frame(Frame),
    /// A transport-level error. Logged only; does not trigger reconnection.
    Error(String),
    /// The connection dropped. Drives the reconnect path.
    Closed(CloseInfo),
}

/// Detail attached to a close, when the transport has any.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: Option<String>,
}

/// An abstract bidirectional message socket driven by a channel.
///
/// A channel attaches its event sender exactly once per lifetime (guarded by
/// its wired flag) and detaches it on explicit close, so reconnect cycles
/// never double-subscribe. All methods are non-blocking; the network effect
/// of `connect`/`send` is reported asynchronously through the event sender.
pub trait Transport: Send + 'static {
    /// Install the channel's event sender. Replaces any previous one.
    fn attach(&mut self, events: EventSender);

    /// Drop the event sender; the channel no longer wants callbacks.
    fn detach(&mut self);

    /// Start a connection attempt. `false` means the attempt was refused
    /// synchronously (bad address, no event sender); no events will follow.
    fn connect(&mut self, opts: &ConnectOptions) -> bool;

    /// Forward one frame. `false` means the frame was dropped.
    fn send(&mut self, frame: Frame) -> bool;

    /// Tear the connection down. A live connection reports a
    /// [`TransportEvent::Closed`] if the sender is still attached.
    fn close(&mut self, code: Option<u16>, reason: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_info_default_is_empty() {
        let info = CloseInfo::default();
        assert_eq!(info.code, None);
        assert_eq!(info.reason, None);
    }

    #[test]
    fn events_are_cloneable() {
        let event = TransportEvent::Closed(CloseInfo {
            code: Some(1000),
            reason: Some("normal".into()),
        });
        if let TransportEvent::Closed(info) = event.clone() {
            assert_eq!(info.code, Some(1000));
        } else {
            panic!("clone changed variant");
        }
    }
}
