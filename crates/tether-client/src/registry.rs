use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tracing::error;

use tether_core::{ChannelError, ConnectOptions};

use crate::channel::Channel;
use crate::listeners::EventFn;

/// Id of the channel most callers talk to.
pub const DEFAULT_CHANNEL: u32 = 0;

/// Holds zero or more named channels and routes calls by channel id.
///
/// The registry itself carries no retry or timer state; everything
/// connection-shaped lives in the individual [`Channel`]s.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<u32, Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under an id. Fails if the id is taken.
    pub fn add(&self, channel: Channel, id: u32) -> Result<(), ChannelError> {
        match self.channels.entry(id) {
            Entry::Occupied(_) => {
                error!(id, "add failed, channel id already registered");
                Err(ChannelError::DuplicateChannel { id })
            }
            Entry::Vacant(slot) => {
                let _ = slot.insert(channel);
                Ok(())
            }
        }
    }

    /// Detach and discard a channel, invoking its close semantics.
    pub fn remove(&self, id: u32) -> Result<(), ChannelError> {
        match self.channels.remove(&id) {
            Some((_, channel)) => {
                channel.close(None, Some("removed from registry"));
                Ok(())
            }
            None => {
                error!(id, "remove failed, channel not found");
                Err(ChannelError::UnknownChannel { id })
            }
        }
    }

    /// A cloned handle to a registered channel, e.g. for listener setup.
    pub fn get(&self, id: u32) -> Option<Channel> {
        self.channels.get(&id).map(|entry| entry.clone())
    }

    pub fn connect(&self, opts: ConnectOptions, id: u32) -> Result<(), ChannelError> {
        let Some(channel) = self.channels.get(&id) else {
            error!(id, address = %opts.address, "connect failed, channel not found");
            return Err(ChannelError::UnknownChannel { id });
        };
        channel.connect(opts)
    }

    pub fn send(&self, cmd: &str, data: Value, id: u32) -> Result<(), ChannelError> {
        let Some(channel) = self.channels.get(&id) else {
            error!(id, cmd, "send failed, channel not found");
            return Err(ChannelError::UnknownChannel { id });
        };
        channel.send(cmd, data)
    }

    pub fn request(
        &self,
        cmd: &str,
        data: Value,
        on_response: EventFn,
        hint: bool,
        id: u32,
    ) -> Result<(), ChannelError> {
        let Some(channel) = self.channels.get(&id) else {
            error!(id, cmd, "request failed, channel not found");
            return Err(ChannelError::UnknownChannel { id });
        };
        channel.request(cmd, data, on_response, hint)
    }

    pub fn unique(
        &self,
        cmd: &str,
        data: Value,
        on_response: EventFn,
        hint: bool,
        id: u32,
    ) -> Result<(), ChannelError> {
        let Some(channel) = self.channels.get(&id) else {
            error!(id, cmd, "unique failed, channel not found");
            return Err(ChannelError::UnknownChannel { id });
        };
        channel.unique(cmd, data, on_response, hint)
    }

    /// Close and drop every channel. Used at shutdown.
    pub fn close_all(&self) {
        let ids: Vec<u32> = self.channels.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            let _ = self.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.channels.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde_json::json;
    use std::sync::Arc;
    use tether_core::{ChannelState, JsonHandler};

    fn channel() -> (Channel, crate::mock::MockHandle) {
        let (transport, handle) = MockTransport::new();
        let channel = Channel::new(Box::new(transport), Arc::new(JsonHandler));
        (channel, handle)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn add_and_remove() {
        let registry = ChannelRegistry::new();
        let (a, _ha) = channel();
        let (b, _hb) = channel();

        registry.add(a, DEFAULT_CHANNEL).unwrap();
        registry.add(b, 7).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(7));

        assert!(registry.get(7).is_some());
        registry.remove(7).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(7));
        assert!(registry.get(7).is_none());
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let registry = ChannelRegistry::new();
        let (a, _ha) = channel();
        let (b, _hb) = channel();
        registry.add(a, 3).unwrap();
        let err = registry.add(b, 3).unwrap_err();
        assert_eq!(err.error_kind(), "duplicate_channel");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn remove_missing_fails() {
        let registry = ChannelRegistry::new();
        let err = registry.remove(9).unwrap_err();
        assert_eq!(err.error_kind(), "unknown_channel");
    }

    #[tokio::test]
    async fn remove_closes_the_channel() {
        let registry = ChannelRegistry::new();
        let (ch, handle) = channel();
        let probe = ch.clone();
        registry.add(ch, 1).unwrap();
        registry
            .connect(ConnectOptions::new("ws://a", 2), 1)
            .unwrap();
        registry.remove(1).unwrap();

        assert_eq!(probe.state(), ChannelState::Closed);
        assert!(!handle.is_attached());
    }

    #[tokio::test]
    async fn routes_by_id() {
        let registry = ChannelRegistry::new();
        let (a, ha) = channel();
        let (b, hb) = channel();
        registry.add(a, 1).unwrap();
        registry.add(b, 2).unwrap();

        registry.connect(ConnectOptions::new("ws://a", 0), 1).unwrap();
        ha.emit_connected();
        settle().await;

        registry.send("ping", json!(null), 1).unwrap();
        assert_eq!(ha.sent_cmds(), vec!["ping"]);
        assert!(hb.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_a_clear_error() {
        let registry = ChannelRegistry::new();
        let err = registry
            .connect(ConnectOptions::new("ws://a", 0), 42)
            .unwrap_err();
        assert_eq!(err.error_kind(), "unknown_channel");

        let err = registry.send("ping", json!(null), 42).unwrap_err();
        assert_eq!(err.error_kind(), "unknown_channel");

        let cb: EventFn = Arc::new(|_| {});
        let err = registry
            .request("login", json!(null), Arc::clone(&cb), false, 42)
            .unwrap_err();
        assert_eq!(err.error_kind(), "unknown_channel");

        let err = registry.unique("login", json!(null), cb, false, 42).unwrap_err();
        assert_eq!(err.error_kind(), "unknown_channel");
    }

    #[tokio::test]
    async fn unique_routed_through_registry() {
        let registry = ChannelRegistry::new();
        let (ch, _handle) = channel();
        registry.add(ch, DEFAULT_CHANNEL).unwrap();

        let cb: EventFn = Arc::new(|_| {});
        registry
            .unique("login", json!(1), Arc::clone(&cb), false, DEFAULT_CHANNEL)
            .unwrap();
        let err = registry
            .unique("login", json!(2), cb, false, DEFAULT_CHANNEL)
            .unwrap_err();
        assert_eq!(err.error_kind(), "duplicate_request");
    }

    #[tokio::test]
    async fn close_all_empties_registry() {
        let registry = ChannelRegistry::new();
        let (a, _ha) = channel();
        let (b, _hb) = channel();
        let probe = a.clone();
        registry.add(a, 1).unwrap();
        registry.add(b, 2).unwrap();

        registry.close_all();
        assert!(registry.is_empty());
        assert_eq!(probe.state(), ChannelState::Closed);
    }
}
