use crate::error::{JanusError, Result};
use crate::transport::{Transport, TransportEvent};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::connect_async;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// WebSocket binding of the [`Transport`] contract.
///
/// The gateway requires the `janus-protocol` subprotocol during the
/// handshake. After connecting, two tasks own the socket halves: a writer
/// draining the outbound queue (which is what makes concurrent `send`
/// callers safe and each frame atomic) and a reader forwarding inbound text
/// messages in arrival order. tungstenite reassembles fragmented frames, so
/// one `TransportEvent::Message` always carries one complete logical
/// message.
pub struct WebSocketTransport {
    url: String,
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    connected: AtomicBool,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outbound: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    fn outbound_sender(&self) -> Option<mpsc::Sender<Message>> {
        self.outbound.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>> {
        if self.connected.load(Ordering::SeqCst) {
            return Err(JanusError::Connection("already connected".to_string()));
        }

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| JanusError::Connection(e.to_string()))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static("janus-protocol"),
        );

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| JanusError::Connection(e.to_string()))?;
        log::info!("Connected to Janus Gateway at {}", self.url);

        let (mut sink, mut source) = stream.split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CHANNEL_CAPACITY);

        *self.outbound.lock().unwrap() = Some(out_tx.clone());
        self.connected.store(true, Ordering::SeqCst);

        // Queued before any inbound frame can be read, so the owner always
        // observes Connected first.
        let _ = event_tx.send(TransportEvent::Connected).await;

        // Writer: sole owner of the sink.
        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let is_close = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    let _ = writer_events
                        .send(TransportEvent::Error(e.to_string()))
                        .await;
                    break;
                }
                if is_close {
                    break;
                }
            }
        });

        // Reader: the single in-order delivery source.
        let reader_events = event_tx;
        let reader_out = out_tx;
        tokio::spawn(async move {
            let mut close_event: Option<TransportEvent> = None;
            while let Some(incoming) = source.next().await {
                match incoming {
                    Ok(Message::Text(text)) => {
                        if reader_events
                            .send(TransportEvent::Message(text))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = reader_out.send(Message::Pong(payload)).await;
                    }
                    Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                    Ok(Message::Binary(payload)) => {
                        log::warn!(
                            "Dropping unexpected {}-byte binary frame from gateway",
                            payload.len()
                        );
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((1005, String::new()));
                        close_event = Some(TransportEvent::Closed { code, reason });
                        break;
                    }
                    Err(e) => {
                        let _ = reader_events
                            .send(TransportEvent::Error(e.to_string()))
                            .await;
                        break;
                    }
                }
            }
            // 1006: connection dropped without a Close frame.
            let close_event = close_event.unwrap_or(TransportEvent::Closed {
                code: 1006,
                reason: "connection lost".to_string(),
            });
            let _ = reader_events.send(close_event).await;
        });

        Ok(event_rx)
    }

    async fn send(&self, text: String) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(JanusError::NotConnected);
        }
        let sender = self.outbound_sender().ok_or(JanusError::NotConnected)?;
        sender
            .send(Message::Text(text))
            .await
            .map_err(|_| JanusError::NotConnected)
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        let sender = self.outbound.lock().unwrap().take();
        if let Some(sender) = sender {
            let _ = sender.send(Message::Close(None)).await;
        }
        Ok(())
    }
}
