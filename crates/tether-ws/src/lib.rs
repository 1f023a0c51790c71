//! WebSocket transport over `tokio-tungstenite`.
//!
//! [`WsTransport`] owns no socket itself; each `connect` spawns a session
//! task that dials the endpoint, pumps outbound messages from a queue, and
//! reports everything back through the attached event sender.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tether_core::{CloseInfo, ConnectOptions, EventSender, Frame, Transport, TransportEvent};

/// A [`Transport`] backed by a client WebSocket connection.
///
/// Safe to reuse across reconnects: `close` tears the current session down
/// and the next `connect` spawns a fresh one on the same event sender.
#[derive(Default)]
pub struct WsTransport {
    events: Option<EventSender>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    cancel: Option<CancellationToken>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn cancel_session(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.outbound = None;
    }
}

impl Transport for WsTransport {
    fn attach(&mut self, events: EventSender) {
        self.events = Some(events);
    }

    fn detach(&mut self) {
        self.events = None;
        self.cancel_session();
    }

    fn connect(&mut self, opts: &ConnectOptions) -> bool {
        let Some(events) = self.events.clone() else {
            error!("connect without an attached event sender");
            return false;
        };
        if !opts.address.starts_with("ws://") && !opts.address.starts_with("wss://") {
            error!(address = %opts.address, "refusing non-websocket address");
            return false;
        }

        // One live session at a time.
        self.cancel_session();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run_session(
            opts.address.clone(),
            events,
            rx,
            cancel.clone(),
        ));
        self.outbound = Some(tx);
        self.cancel = Some(cancel);
        true
    }

    fn send(&mut self, frame: Frame) -> bool {
        let Some(outbound) = &self.outbound else {
            warn!("send with no session");
            return false;
        };
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        outbound.send(message).is_ok()
    }

    fn close(&mut self, code: Option<u16>, reason: Option<&str>) {
        if let Some(outbound) = &self.outbound {
            let frame = CloseFrame {
                code: CloseCode::from(code.unwrap_or(1000)),
                reason: reason.unwrap_or_default().to_owned().into(),
            };
            let _ = outbound.send(Message::Close(Some(frame)));
        }
        self.cancel_session();
    }
}

/// Dial, then pump until the peer closes, the write side fails, or the
/// session is cancelled. Cancellation is silent: the transport owner already
/// knows, and a late `Closed` event would double-drive reconnection.
async fn run_session(
    address: String,
    events: EventSender,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) {
    let stream = tokio::select! {
        () = cancel.cancelled() => return,
        result = connect_async(&address) => match result {
            Ok((stream, _response)) => stream,
            Err(err) => {
                error!(address = %address, error = %err, "websocket connect failed");
                let _ = events.send(TransportEvent::Error(err.to_string()));
                let _ = events.send(TransportEvent::Closed(CloseInfo::default()));
                return;
            }
        },
    };

    info!(address = %address, "websocket connected");
    let _ = events.send(TransportEvent::Connected);
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            // Flush queued outbound traffic before honoring cancellation, so
            // an explicit close frame still reaches the wire.
            biased;

            message = outbound.recv() => {
                let Some(message) = message else {
                    let _ = write.close().await;
                    return;
                };
                let closing = matches!(message, Message::Close(_));
                if let Err(err) = write.send(message).await {
                    warn!(error = %err, "websocket write failed");
                    let _ = events.send(TransportEvent::Error(err.to_string()));
                    let _ = events.send(TransportEvent::Closed(CloseInfo::default()));
                    return;
                }
                if closing {
                    let _ = write.close().await;
                    let _ = events.send(TransportEvent::Closed(CloseInfo::default()));
                    return;
                }
            }

            () = cancel.cancelled() => {
                let _ = write.close().await;
                return;
            }

            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Frame(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let _ = events.send(TransportEvent::Frame(Frame::Binary(bytes)));
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = frame.map(|frame| CloseInfo {
                        code: Some(u16::from(frame.code)),
                        reason: (!frame.reason.is_empty())
                            .then(|| frame.reason.as_str().to_owned()),
                    });
                    info!(code = info.as_ref().and_then(|i| i.code), "websocket closed by peer");
                    let _ = events.send(TransportEvent::Closed(info.unwrap_or_default()));
                    return;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(other)) => debug!(len = other.len(), "ignoring control message"),
                Some(Err(err)) => {
                    warn!(error = %err, "websocket read failed");
                    let _ = events.send(TransportEvent::Error(err.to_string()));
                    let _ = events.send(TransportEvent::Closed(CloseInfo::default()));
                    return;
                }
                None => {
                    let _ = events.send(TransportEvent::Closed(CloseInfo::default()));
                    return;
                }
            },
        }
    }
}
