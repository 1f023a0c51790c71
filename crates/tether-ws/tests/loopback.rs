//! Round trip against a real in-process WebSocket echo server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

use tether_core::{ConnectOptions, Frame, Transport, TransportEvent};
use tether_ws::WsTransport;

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport event channel closed")
}

async fn spawn_echo_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                    if message.is_text() || message.is_binary() {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });
    (format!("ws://{addr}"), handle)
}

#[tokio::test]
async fn connect_echo_close() {
    let (url, server) = spawn_echo_server().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new();
    transport.attach(tx);
    assert!(transport.connect(&ConnectOptions::new(&url, 0)));

    assert!(matches!(
        next_event(&mut rx).await,
        TransportEvent::Connected
    ));

    assert!(transport.send(Frame::Text(r#"{"cmd":"echo","data":1}"#.into())));
    match next_event(&mut rx).await {
        TransportEvent::Frame(Frame::Text(text)) => {
            assert_eq!(text, r#"{"cmd":"echo","data":1}"#);
        }
        other => panic!("expected echoed text frame, got {other:?}"),
    }

    transport.close(Some(1000), Some("done"));
    server.abort();
}

#[tokio::test]
async fn frames_sent_before_open_are_delivered_after() {
    let (url, server) = spawn_echo_server().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new();
    transport.attach(tx);
    assert!(transport.connect(&ConnectOptions::new(&url, 0)));
    // Queued while the handshake is still in flight.
    assert!(transport.send(Frame::Text("early".into())));

    assert!(matches!(
        next_event(&mut rx).await,
        TransportEvent::Connected
    ));
    match next_event(&mut rx).await {
        TransportEvent::Frame(Frame::Text(text)) => assert_eq!(text, "early"),
        other => panic!("expected echoed text frame, got {other:?}"),
    }

    transport.close(None, None);
    server.abort();
}

#[tokio::test]
async fn server_disconnect_surfaces_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.close(None).await;
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new();
    transport.attach(tx);
    assert!(transport.connect(&ConnectOptions::new(&format!("ws://{addr}"), 0)));

    assert!(matches!(
        next_event(&mut rx).await,
        TransportEvent::Connected
    ));
    assert!(matches!(
        next_event(&mut rx).await,
        TransportEvent::Closed(_)
    ));

    server.abort();
}
