// ABOUTME: WebSocket transport for the shell relay session
// One physical connection per session, delivers frames in order, no retries at this layer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, error, info};

use crate::relay::error::RelayError;

/// A frame as it arrives off the socket, before protocol classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Transport notifications delivered to the session controller, in socket
/// order. After `Closed` no further events are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Frame(WireFrame),
    Error(String),
    Closed { code: Option<u16>, reason: String },
}

/// Outbound half of the transport, owned exclusively by one session.
pub trait FrameSink: Send {
    fn send_text(&mut self, text: String) -> Result<(), RelayError>;
    fn send_binary(&mut self, data: Vec<u8>) -> Result<(), RelayError>;
    /// Close the socket. Idempotent, safe on an already-closed transport.
    fn close(&mut self);
    fn is_open(&self) -> bool;
}

/// Clean close codes: normal closure and going-away. Everything else,
/// including a missing close frame, counts as abnormal termination.
pub fn is_clean_close(code: Option<u16>) -> bool {
    matches!(code, Some(1000) | Some(1001))
}

/// Operator-facing text for a close, falling back to a neutral message when
/// the server supplied no reason.
pub fn close_message(reason: &str) -> String {
    if reason.trim().is_empty() {
        "Connection ended. Reopen the shell view to start a new session.".to_string()
    } else {
        reason.to_string()
    }
}

/// Turn a connect/transport failure into actionable guidance.
///
/// On a TLS origin the most common cause in the field is the relay's
/// self-signed certificate, so point the operator at it instead of showing a
/// bare error code.
pub fn describe_transport_error(secure_origin: bool, detail: &str) -> String {
    if secure_origin {
        format!(
            "{detail}\r\nIf the relay uses a self-signed certificate, open the API URL in a \
             browser, accept the certificate and reopen the shell."
        )
    } else {
        format!("{detail}\r\nCheck that the relay endpoint is reachable.")
    }
}

enum Outgoing {
    Frame(tungstenite::Message),
    Close,
}

/// Live WebSocket transport. `connect` performs the handshake and spawns a
/// writer task plus a reader task that forwards every frame, in order, to the
/// returned event channel.
pub struct WsTransport {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    open: Arc<AtomicBool>,
}

impl WsTransport {
    /// Open the socket and start pumping events.
    ///
    /// Exactly one physical connection per call. The handshake error is
    /// returned raw; the caller decides how to present it (see
    /// [`describe_transport_error`]).
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), RelayError> {
        debug!("opening relay socket: {}", url);
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;
        info!("relay socket open, HTTP status {:?}", response.status());

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();
        let open = Arc::new(AtomicBool::new(true));

        // Writer task: drains the outgoing queue until close or sink failure.
        tokio::spawn(async move {
            while let Some(item) = out_rx.recv().await {
                match item {
                    Outgoing::Frame(msg) => {
                        if let Err(e) = ws_sender.send(msg).await {
                            error!("relay send failed: {}", e);
                            break;
                        }
                    }
                    Outgoing::Close => {
                        let _ = ws_sender.send(tungstenite::Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        // Reader task: forwards frames in delivery order, then reports the
        // close exactly once.
        let open_flag = open.clone();
        tokio::spawn(async move {
            let _ = event_tx.send(TransportEvent::Open);
            let mut close_reported = false;

            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(tungstenite::Message::Text(text)) => {
                        if event_tx
                            .send(TransportEvent::Frame(WireFrame::Text(text)))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(tungstenite::Message::Binary(data)) => {
                        if event_tx
                            .send(TransportEvent::Frame(WireFrame::Binary(data)))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(tungstenite::Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                            None => (None, String::new()),
                        };
                        info!("relay socket closed by server: code={:?}", code);
                        let _ = event_tx.send(TransportEvent::Closed { code, reason });
                        close_reported = true;
                        break;
                    }
                    Ok(_) => {
                        // Ping/Pong handled by tungstenite itself
                    }
                    Err(e) => {
                        error!("relay socket error: {}", e);
                        let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                        let _ = event_tx.send(TransportEvent::Closed {
                            code: None,
                            reason: String::new(),
                        });
                        close_reported = true;
                        break;
                    }
                }
            }

            if !close_reported {
                // Stream ended without a close frame: abnormal termination
                let _ = event_tx.send(TransportEvent::Closed {
                    code: None,
                    reason: String::new(),
                });
            }
            open_flag.store(false, Ordering::SeqCst);
        });

        Ok((
            Self {
                outgoing: out_tx,
                open,
            },
            event_rx,
        ))
    }
}

impl FrameSink for WsTransport {
    fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        if !self.is_open() {
            return Err(RelayError::TransportClosed);
        }
        self.outgoing
            .send(Outgoing::Frame(tungstenite::Message::Text(text)))
            .map_err(|_| RelayError::TransportClosed)
    }

    fn send_binary(&mut self, data: Vec<u8>) -> Result<(), RelayError> {
        if !self.is_open() {
            return Err(RelayError::TransportClosed);
        }
        self.outgoing
            .send(Outgoing::Frame(tungstenite::Message::Binary(data)))
            .map_err(|_| RelayError::TransportClosed)
    }

    fn close(&mut self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("closing relay socket");
            let _ = self.outgoing.send(Outgoing::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
