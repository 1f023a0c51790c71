use std::collections::VecDeque;

use serde_json::Value;

use crate::listeners::EventFn;

/// A queued outbound message, kept until a matching response arrives or the
/// channel is explicitly closed.
pub(crate) struct PendingRequest {
    pub cmd: String,
    pub data: Value,
    /// Response target; `None` for plain sends queued while disconnected.
    pub response: Option<EventFn>,
    /// Whether the caller asked for the requesting status signal.
    pub hint: bool,
}

/// Insertion-ordered pending queue with FIFO-by-command resolution.
///
/// Correlation matches only the command of an inbound frame against the
/// oldest pending entry with that command; there are no per-request ids, so
/// two in-flight requests with the same command resolve in enqueue order.
#[derive(Default)]
pub(crate) struct PendingQueue {
    items: VecDeque<PendingRequest>,
}

impl PendingQueue {
    pub fn push(&mut self, request: PendingRequest) {
        self.items.push_back(request);
    }

    /// Whether any entry with this command is already in flight.
    pub fn contains_cmd(&self, cmd: &str) -> bool {
        self.items.iter().any(|req| req.cmd == cmd)
    }

    /// Remove and return the oldest entry matching `cmd`.
    pub fn resolve(&mut self, cmd: &str) -> Option<PendingRequest> {
        let idx = self.items.iter().position(|req| req.cmd == cmd)?;
        self.items.remove(idx)
    }

    /// Entries in enqueue order, for the reconnection flush.
    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
