use std::fmt;

/// Lifecycle of one logical connection.
///
/// `Resending` is the short window right after the transport reports a
/// connection, while the pending queue is flushed in enqueue order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelState {
    #[default]
    Closed,
    Connecting,
    Resending,
    Connected,
}

impl ChannelState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Resending => "resending",
            Self::Connected => "connected",
        }
    }

    /// Whether outbound traffic is forwarded immediately rather than queued.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(ChannelState::Closed.name(), "closed");
        assert_eq!(ChannelState::Resending.name(), "resending");
        assert_eq!(ChannelState::Connected.to_string(), "connected");
    }

    #[test]
    fn default_is_closed() {
        assert_eq!(ChannelState::default(), ChannelState::Closed);
    }

    #[test]
    fn only_connected_forwards() {
        assert!(ChannelState::Connected.is_connected());
        assert!(!ChannelState::Connecting.is_connected());
        assert!(!ChannelState::Resending.is_connected());
        assert!(!ChannelState::Closed.is_connected());
    }
}
