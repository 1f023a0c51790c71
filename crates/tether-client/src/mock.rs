//! Scriptable test doubles: a transport whose events are driven by hand, a
//! status sink that records every signal, and a configurable wire policy.
//! Published (not `cfg(test)`) so downstream crates can test against a
//! channel without a live endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use tether_core::{
    CloseInfo, ConnectOptions, Envelope, EventSender, Frame, StatusSink, Transport, TransportEvent,
    WireHandler,
};

#[derive(Default)]
struct MockShared {
    events: Mutex<Option<EventSender>>,
    sent: Mutex<Vec<Frame>>,
    connects: Mutex<Vec<ConnectOptions>>,
    closes: Mutex<Vec<CloseInfo>>,
    /// Whether `connect` succeeds synchronously.
    accept: AtomicBool,
    /// Whether the mock believes it holds a live connection.
    open: AtomicBool,
}

/// In-memory [`Transport`] driven entirely by its [`MockHandle`].
///
/// `connect` only records the attempt; the test decides when (and whether)
/// the connection "succeeds" by emitting events through the handle.
pub struct MockTransport {
    shared: Arc<MockShared>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let shared = Arc::new(MockShared {
            accept: AtomicBool::new(true),
            ..MockShared::default()
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockHandle { shared },
        )
    }
}

impl Transport for MockTransport {
    fn attach(&mut self, events: EventSender) {
        *self.shared.events.lock() = Some(events);
    }

    fn detach(&mut self) {
        let _ = self.shared.events.lock().take();
    }

    fn connect(&mut self, opts: &ConnectOptions) -> bool {
        self.shared.connects.lock().push(opts.clone());
        self.shared.accept.load(Ordering::Relaxed)
    }

    fn send(&mut self, frame: Frame) -> bool {
        self.shared.sent.lock().push(frame);
        self.shared.open.load(Ordering::Relaxed)
    }

    fn close(&mut self, code: Option<u16>, reason: Option<&str>) {
        self.shared.closes.lock().push(CloseInfo {
            code,
            reason: reason.map(str::to_owned),
        });
        // Closing a live connection reports back, like a real socket.
        if self.shared.open.swap(false, Ordering::Relaxed) {
            self.shared.emit(TransportEvent::Closed(CloseInfo {
                code,
                reason: reason.map(str::to_owned),
            }));
        }
    }
}

impl MockShared {
    fn emit(&self, event: TransportEvent) {
        if let Some(events) = &*self.events.lock() {
            let _ = events.send(event);
        }
    }
}

/// Test-side controls and observations for a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<MockShared>,
}

impl MockHandle {
    /// Whether future `connect` calls are accepted synchronously.
    pub fn set_accept(&self, accept: bool) {
        self.shared.accept.store(accept, Ordering::Relaxed);
    }

    /// Report a successful connection.
    pub fn emit_connected(&self) {
        self.shared.open.store(true, Ordering::Relaxed);
        self.shared.emit(TransportEvent::Connected);
    }

    /// Deliver a raw inbound frame.
    pub fn emit_frame(&self, frame: Frame) {
        self.shared.emit(TransportEvent::Frame(frame));
    }

    /// Deliver an inbound envelope.
    pub fn emit_envelope(&self, cmd: &str, data: Value) {
        if let Ok(frame) = Envelope::new(cmd, data).encode() {
            self.emit_frame(frame);
        }
    }

    /// Deliver an inbound text frame verbatim.
    pub fn emit_text(&self, text: &str) {
        self.emit_frame(Frame::Text(text.to_owned()));
    }

    /// Report a transport-level error.
    pub fn emit_error(&self, info: &str) {
        self.shared.emit(TransportEvent::Error(info.to_owned()));
    }

    /// Report the connection dropping.
    pub fn emit_closed(&self) {
        self.shared.open.store(false, Ordering::Relaxed);
        self.shared.emit(TransportEvent::Closed(CloseInfo::default()));
    }

    /// Every frame the channel pushed, in order.
    pub fn sent(&self) -> Vec<Frame> {
        self.shared.sent.lock().clone()
    }

    /// Commands of every decodable sent frame, in order.
    pub fn sent_cmds(&self) -> Vec<String> {
        self.shared
            .sent
            .lock()
            .iter()
            .filter_map(|frame| Envelope::decode(frame).ok())
            .map(|env| env.cmd)
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.lock().len()
    }

    pub fn last_connect(&self) -> Option<ConnectOptions> {
        self.shared.connects.lock().last().cloned()
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.lock().len()
    }

    pub fn is_attached(&self) -> bool {
        self.shared.events.lock().is_some()
    }
}

/// Status sink that records every signal in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    log: Mutex<Vec<(String, bool)>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<(String, bool)> {
        self.log.lock().clone()
    }

    /// The most recent value of one signal, if it was ever emitted.
    pub fn last(&self, signal: &str) -> Option<bool> {
        self.log
            .lock()
            .iter()
            .rev()
            .find(|(name, _)| name == signal)
            .map(|(_, value)| *value)
    }
}

impl StatusSink for RecordingSink {
    fn connecting(&self, active: bool) {
        self.log.lock().push(("connecting".into(), active));
    }

    fn reconnecting(&self, active: bool) {
        self.log.lock().push(("reconnecting".into(), active));
    }

    fn requesting(&self, active: bool) {
        self.log.lock().push(("requesting".into(), active));
    }
}

/// Wire policy with a switchable legality verdict and a custom beat command.
pub struct MockHandler {
    legal: AtomicBool,
    beat_cmd: String,
}

impl Default for MockHandler {
    fn default() -> Self {
        Self {
            legal: AtomicBool::new(true),
            beat_cmd: "beat".into(),
        }
    }
}

impl MockHandler {
    pub fn rejecting() -> Self {
        Self {
            legal: AtomicBool::new(false),
            ..Self::default()
        }
    }

    pub fn set_legal(&self, legal: bool) {
        self.legal.store(legal, Ordering::Relaxed);
    }
}

impl WireHandler for MockHandler {
    fn is_legal(&self, _frame: &Frame) -> bool {
        self.legal.load(Ordering::Relaxed)
    }

    fn heartbeat(&self) -> Envelope {
        Envelope::new(self.beat_cmd.clone(), Value::Null)
    }
}
