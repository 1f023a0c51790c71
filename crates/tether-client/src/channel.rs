use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tether_core::{
    ChannelError, ChannelState, CloseInfo, ConnectOptions, Envelope, StatusSink, Transport,
    TransportEvent, WireHandler,
};

use crate::listeners::{EventFn, ListenerSet};
use crate::pending::{PendingQueue, PendingRequest};
use crate::timer::TimerSlot;

/// Delay before an automatic reconnect attempt.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Silence on the inbound side before a keep-alive frame is sent.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Silence on the inbound side before the transport is forced closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// One logical connection: state machine, pending-request queue, listener
/// registry, reconnect budget, and the heartbeat/idle/reconnect timers.
///
/// Cheap to clone; all clones share the same underlying channel. Every
/// mutation goes through one mutex, and transport events are serialized by
/// a single pump task, so operations never interleave mid-transition. User
/// callbacks (status sink, response targets, listeners) are invoked outside
/// the lock and may safely re-enter channel operations.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    state: ChannelState,
    /// Transport events subscribed; set once per lifetime, reset by close().
    wired: bool,
    opts: Option<ConnectOptions>,
    retries_left: u32,
    transport: Box<dyn Transport>,
    handler: Arc<dyn WireHandler>,
    status: Option<Arc<dyn StatusSink>>,
    pending: PendingQueue,
    listeners: ListenerSet,
    heartbeat: TimerSlot,
    idle: TimerSlot,
    reconnect: TimerSlot,
    pump: Option<JoinHandle<()>>,
}

impl Channel {
    pub fn new(transport: Box<dyn Transport>, handler: Arc<dyn WireHandler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ChannelState::Closed,
                wired: false,
                opts: None,
                retries_left: 0,
                transport,
                handler,
                status: None,
                pending: PendingQueue::default(),
                listeners: ListenerSet::default(),
                heartbeat: TimerSlot::default(),
                idle: TimerSlot::default(),
                reconnect: TimerSlot::default(),
                pump: None,
            })),
        }
    }

    /// Attach a status sink for connecting/reconnecting/requesting signals.
    #[must_use]
    pub fn with_status(self, sink: Arc<dyn StatusSink>) -> Self {
        self.inner.lock().status = Some(sink);
        self
    }

    /// Start a connection attempt. Refused unless the channel is `Closed`.
    ///
    /// On success the options are stored and reused verbatim for every
    /// automatic reconnect; the retry budget is set to `max_retries`.
    pub fn connect(&self, opts: ConnectOptions) -> Result<(), ChannelError> {
        let rejected = {
            let mut guard = self.inner.lock();
            if guard.state != ChannelState::Closed {
                warn!(
                    address = %opts.address,
                    state = %guard.state,
                    "connect refused, channel not closed"
                );
                return Err(ChannelError::AlreadyActive { state: guard.state });
            }

            guard.state = ChannelState::Connecting;
            if !guard.wired {
                guard.wired = true;
                let (tx, rx) = mpsc::unbounded_channel();
                guard.transport.attach(tx);
                guard.pump = Some(spawn_pump(Arc::downgrade(&self.inner), rx));
            }

            info!(address = %opts.address, max_retries = opts.max_retries, "connecting");
            if guard.transport.connect(&opts) {
                guard.retries_left = opts.max_retries;
                guard.opts = Some(opts);
                None
            } else {
                error!(address = %opts.address, "transport refused connection");
                Some((guard.status.clone(), opts.address))
            }
        };

        match rejected {
            None => Ok(()),
            Some((sink, address)) => {
                if let Some(sink) = sink {
                    sink.connecting(false);
                }
                Err(ChannelError::ConnectRejected { address })
            }
        }
    }

    /// Forward a message, or queue it while a connection is in progress.
    ///
    /// Fails only when the channel is `Closed`; frames queued while
    /// `Connecting`/`Resending` are flushed in order once connected.
    pub fn send(&self, cmd: &str, data: Value) -> Result<(), ChannelError> {
        let mut guard = self.inner.lock();
        match guard.state {
            ChannelState::Connected => {
                let frame = Envelope::new(cmd, data).encode()?;
                if !guard.transport.send(frame) {
                    warn!(cmd, "transport dropped outbound frame");
                }
                Ok(())
            }
            ChannelState::Connecting | ChannelState::Resending => {
                guard.pending.push(PendingRequest {
                    cmd: cmd.to_owned(),
                    data,
                    response: None,
                    hint: false,
                });
                Ok(())
            }
            ChannelState::Closed => {
                error!(cmd, "send failed, channel closed");
                Err(ChannelError::NotConnected {
                    cmd: cmd.to_owned(),
                    state: guard.state,
                })
            }
        }
    }

    /// Send a correlated request.
    ///
    /// If connected the frame goes out immediately; either way the entry is
    /// queued until an inbound frame with the same command resolves it
    /// (FIFO per command) or the channel is closed. `hint` raises the
    /// requesting status signal.
    pub fn request(
        &self,
        cmd: &str,
        data: Value,
        on_response: EventFn,
        hint: bool,
    ) -> Result<(), ChannelError> {
        let sink = {
            let mut guard = self.inner.lock();
            Self::request_locked(&mut guard, cmd, data, on_response, hint)?
        };
        if let Some(sink) = sink {
            sink.requesting(true);
        }
        Ok(())
    }

    /// As [`Channel::request`], but refuses to queue a second request with
    /// the same command while one is still in flight.
    pub fn unique(
        &self,
        cmd: &str,
        data: Value,
        on_response: EventFn,
        hint: bool,
    ) -> Result<(), ChannelError> {
        let sink = {
            let mut guard = self.inner.lock();
            if guard.pending.contains_cmd(cmd) {
                warn!(cmd, "unique request refused, command already in flight");
                return Err(ChannelError::DuplicateRequest {
                    cmd: cmd.to_owned(),
                });
            }
            Self::request_locked(&mut guard, cmd, data, on_response, hint)?
        };
        if let Some(sink) = sink {
            sink.requesting(true);
        }
        Ok(())
    }

    fn request_locked(
        guard: &mut Inner,
        cmd: &str,
        data: Value,
        on_response: EventFn,
        hint: bool,
    ) -> Result<Option<Arc<dyn StatusSink>>, ChannelError> {
        if guard.state == ChannelState::Connected {
            let frame = Envelope::new(cmd, data.clone()).encode()?;
            if !guard.transport.send(frame) {
                warn!(cmd, "transport dropped outbound frame");
            }
        }
        guard.pending.push(PendingRequest {
            cmd: cmd.to_owned(),
            data,
            response: Some(on_response),
            hint,
        });
        Ok(if hint { guard.status.clone() } else { None })
    }

    /// Register a listener for a command. No de-duplication; registering
    /// the same callback twice means it fires twice, in registration order.
    pub fn listen(&self, cmd: &str, callback: EventFn) {
        self.inner.lock().listeners.register(cmd, callback);
    }

    /// Tear the channel down from any state.
    ///
    /// Disarms all timers, detaches and closes the transport, and clears
    /// both the listener registry and the pending queue. This is the only
    /// operation that unconditionally drops pending requests.
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) {
        let sink = {
            let mut guard = self.inner.lock();
            warn!(code, reason, "channel closing");
            clear_timers(&mut guard);
            guard.transport.detach();
            guard.transport.close(code, reason);
            if let Some(pump) = guard.pump.take() {
                pump.abort();
            }
            guard.wired = false;
            guard.listeners.clear();
            guard.pending.clear();
            guard.state = ChannelState::Closed;
            guard.status.clone()
        };
        if let Some(sink) = sink {
            sink.connecting(false);
            sink.reconnecting(false);
            sink.requesting(false);
        }
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    /// Number of queued requests awaiting flush or correlation.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

/// Serialize transport events onto the channel. One pump per wire-up; the
/// task ends when the transport drops its sender or the channel goes away.
fn spawn_pump(
    inner: Weak<Mutex<Inner>>,
    mut rx: mpsc::UnboundedReceiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(inner) = inner.upgrade() else { break };
            match event {
                TransportEvent::Connected => on_connected(&inner),
                TransportEvent::Frame(frame) => on_frame(&inner, frame),
                TransportEvent::Error(info) => {
                    error!(info = %info, "transport error");
                }
                TransportEvent::Closed(info) => on_closed(&inner, &info),
            }
        }
    })
}

/// Connection established: reset the budget, flush the queue in enqueue
/// order (entries stay queued for correlation), then go `Connected` and arm
/// the keep-alive timers.
fn on_connected(inner: &Arc<Mutex<Inner>>) {
    let (sink, pending) = {
        let mut guard = inner.lock();
        clear_timers(&mut guard);
        if let Some(opts) = &guard.opts {
            info!(address = %opts.address, "connected");
            guard.retries_left = opts.max_retries;
        }
        guard.state = ChannelState::Resending;

        let pending = guard.pending.len();
        if pending > 0 {
            info!(size = pending, "resending queued frames");
            let frames: Vec<_> = guard
                .pending
                .iter()
                .map(|req| Envelope::new(&req.cmd, req.data.clone()).encode())
                .collect();
            for frame in frames {
                match frame {
                    Ok(frame) => {
                        if !guard.transport.send(frame) {
                            warn!("transport dropped queued frame during resend");
                        }
                    }
                    Err(err) => warn!(error = %err, "skipping unencodable queued frame"),
                }
            }
        }

        guard.state = ChannelState::Connected;
        arm_heartbeat(&mut guard, inner);
        arm_idle(&mut guard, inner);
        (guard.status.clone(), pending)
    };

    if let Some(sink) = sink {
        sink.connecting(false);
        sink.reconnecting(false);
        sink.requesting(pending > 0);
    }
}

/// Inbound frame: validate, decode, re-arm the silence timers, resolve the
/// oldest matching pending request, then fan out to listeners.
fn on_frame(inner: &Arc<Mutex<Inner>>, frame: tether_core::Frame) {
    let (envelope, response, listeners, requesting, sink) = {
        let mut guard = inner.lock();
        if !guard.handler.is_legal(&frame) {
            warn!(len = frame.len(), "dropping illegal inbound frame");
            return;
        }
        let envelope = match Envelope::decode(&frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "dropping undecodable inbound frame");
                return;
            }
        };

        arm_idle(&mut guard, inner);
        arm_heartbeat(&mut guard, inner);

        let response = guard.pending.resolve(&envelope.cmd).and_then(|req| req.response);
        let listeners = guard.listeners.matching(&envelope.cmd);
        let requesting = !guard.pending.is_empty();
        (envelope, response, listeners, requesting, guard.status.clone())
    };

    if let Some(response) = response {
        response(&envelope);
    }
    if let Some(sink) = &sink {
        sink.requesting(requesting);
    }
    for listener in listeners {
        listener(&envelope);
    }
}

/// Connection dropped: either a reconnect is already pending (ignore), the
/// budget is spent (terminal close, queue left untouched), or a reconnect
/// timer is armed.
fn on_closed(inner: &Arc<Mutex<Inner>>, info: &CloseInfo) {
    let sink = {
        let mut guard = inner.lock();
        info!(code = info.code, reason = info.reason.as_deref(), "transport closed");
        if guard.reconnect.is_armed() {
            // The pending reconnect will still fire.
            return;
        }
        clear_timers(&mut guard);

        if guard.retries_left == 0 {
            warn!("retry budget exhausted, channel closed");
            guard.state = ChannelState::Closed;
            return;
        }

        let weak = Arc::downgrade(inner);
        guard.reconnect.arm(RECONNECT_DELAY, move || {
            if let Some(inner) = weak.upgrade() {
                on_reconnect_due(&inner);
            }
        });
        guard.status.clone()
    };

    if let Some(sink) = sink {
        sink.reconnecting(true);
    }
}

/// Reconnect timer fired: spend one retry, force the transport closed, and
/// re-run the connect path with the stored options (budget untouched).
fn on_reconnect_due(inner: &Arc<Mutex<Inner>>) {
    let sink = {
        let mut guard = inner.lock();
        guard.reconnect.disarm();
        guard.state = ChannelState::Closed;

        if guard.retries_left == 0 {
            warn!("retry budget exhausted, reconnect abandoned");
            clear_timers(&mut guard);
            return;
        }
        let Some(opts) = guard.opts.clone() else {
            error!("reconnect fired without stored connect options");
            return;
        };

        guard.retries_left -= 1;
        info!(
            address = %opts.address,
            remaining = guard.retries_left,
            "reconnecting"
        );
        guard.transport.close(None, None);
        guard.state = ChannelState::Connecting;
        if guard.transport.connect(&opts) {
            None
        } else {
            error!(address = %opts.address, "transport refused reconnection");
            guard.status.clone()
        }
    };

    if let Some(sink) = sink {
        sink.connecting(false);
    }
}

/// Heartbeat timer fired: push the handler's keep-alive frame. One-shot;
/// re-armed by the next inbound frame or reconnection.
fn on_heartbeat_due(inner: &Arc<Mutex<Inner>>) {
    let mut guard = inner.lock();
    if guard.state != ChannelState::Connected {
        return;
    }
    let beat = guard.handler.heartbeat();
    debug!(cmd = %beat.cmd, "sending heartbeat");
    match beat.encode() {
        Ok(frame) => {
            if !guard.transport.send(frame) {
                warn!("transport dropped heartbeat frame");
            }
        }
        Err(err) => warn!(error = %err, "heartbeat frame failed to encode"),
    }
}

/// Idle timer fired: the peer has been silent too long; force the transport
/// closed and let the Closed event drive reconnection.
fn on_idle_due(inner: &Arc<Mutex<Inner>>) {
    let mut guard = inner.lock();
    warn!("idle timeout, forcing transport closed");
    guard.transport.close(None, Some("idle timeout"));
}

fn arm_heartbeat(guard: &mut Inner, inner: &Arc<Mutex<Inner>>) {
    let weak = Arc::downgrade(inner);
    guard.heartbeat.arm(HEARTBEAT_INTERVAL, move || {
        if let Some(inner) = weak.upgrade() {
            on_heartbeat_due(&inner);
        }
    });
}

fn arm_idle(guard: &mut Inner, inner: &Arc<Mutex<Inner>>) {
    let weak = Arc::downgrade(inner);
    guard.idle.arm(IDLE_TIMEOUT, move || {
        if let Some(inner) = weak.upgrade() {
            on_idle_due(&inner);
        }
    });
}

fn clear_timers(guard: &mut Inner) {
    guard.heartbeat.disarm();
    guard.idle.disarm();
    guard.reconnect.disarm();
}
