use std::collections::HashMap;
use std::sync::Arc;

use tether_core::Envelope;

/// Callback invoked with a decoded inbound envelope. Used both for
/// persistent listeners and for per-request response targets.
pub type EventFn = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Ordered per-command listener registry.
///
/// No de-duplication: registering the same callback twice means it fires
/// twice. Listeners persist until [`ListenerSet::clear`] (channel close).
#[derive(Default)]
pub(crate) struct ListenerSet {
    by_cmd: HashMap<String, Vec<EventFn>>,
}

impl ListenerSet {
    pub fn register(&mut self, cmd: &str, callback: EventFn) {
        self.by_cmd.entry(cmd.to_owned()).or_default().push(callback);
    }

    /// Callbacks for a command, in registration order. Cloned out so they
    /// can be invoked without holding the channel lock.
    pub fn matching(&self, cmd: &str) -> Vec<EventFn> {
        self.by_cmd.get(cmd).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.by_cmd.clear();
    }

    pub fn count(&self, cmd: &str) -> usize {
        self.by_cmd.get(cmd).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.by_cmd.is_empty()
    }
}
