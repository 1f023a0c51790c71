use crate::state::ChannelState;

/// Typed error hierarchy for channel and registry operations.
///
/// Every failure here is local and non-fatal: callers get an `Err` plus a
/// log line, nothing escalates past the channel/registry boundary.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ChannelError {
    // Configuration
    #[error("channel is {state}, connect refused")]
    AlreadyActive { state: ChannelState },
    #[error("channel {id} not found")]
    UnknownChannel { id: u32 },
    #[error("channel {id} already registered")]
    DuplicateChannel { id: u32 },

    // Connection
    #[error("transport refused connection to {address}")]
    ConnectRejected { address: String },
    #[error("cannot send {cmd}, channel is {state}")]
    NotConnected { cmd: String, state: ChannelState },
    #[error("request {cmd} already in flight")]
    DuplicateRequest { cmd: String },

    // Wire
    #[error("envelope encode failed: {0}")]
    Encode(String),
    #[error("envelope decode failed: {0}")]
    Decode(String),
}

impl ChannelError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AlreadyActive { .. } => "already_active",
            Self::UnknownChannel { .. } => "unknown_channel",
            Self::DuplicateChannel { .. } => "duplicate_channel",
            Self::ConnectRejected { .. } => "connect_rejected",
            Self::NotConnected { .. } => "not_connected",
            Self::DuplicateRequest { .. } => "duplicate_request",
            Self::Encode(_) => "encode",
            Self::Decode(_) => "decode",
        }
    }

    /// Whether the failure came from caller configuration rather than the
    /// connection itself (unknown id, duplicate id, illegal state).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::AlreadyActive { .. } | Self::UnknownChannel { .. } | Self::DuplicateChannel { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_strings() {
        assert_eq!(
            ChannelError::UnknownChannel { id: 3 }.error_kind(),
            "unknown_channel"
        );
        assert_eq!(
            ChannelError::DuplicateRequest { cmd: "login".into() }.error_kind(),
            "duplicate_request"
        );
        assert_eq!(ChannelError::Encode("oops".into()).error_kind(), "encode");
    }

    #[test]
    fn config_classification() {
        assert!(ChannelError::DuplicateChannel { id: 0 }.is_config());
        assert!(ChannelError::AlreadyActive {
            state: ChannelState::Connecting
        }
        .is_config());
        assert!(!ChannelError::NotConnected {
            cmd: "ping".into(),
            state: ChannelState::Closed
        }
        .is_config());
    }

    #[test]
    fn display_includes_context() {
        let err = ChannelError::NotConnected {
            cmd: "ping".into(),
            state: ChannelState::Closed,
        };
        let text = err.to_string();
        assert!(text.contains("ping"));
        assert!(text.contains("closed"));
    }
}
