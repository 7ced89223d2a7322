// ABOUTME: Wire protocol for the shell relay socket
// Rust counterpart to the control-frame schema spoken by the server-side SSH proxy

use serde::{Deserialize, Serialize};

use crate::relay::error::RelayError;

// ============================================
// Server → Client control frames
// ============================================

/// Control message received on the shared socket.
///
/// The server multiplexes session lifecycle signaling and raw terminal output
/// over one connection. A text frame is a control message only if it parses
/// against this schema; everything else is terminal data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Server asks for SSH credentials before it can open the node shell
    NeedCredentials {
        node: String,
        #[serde(default)]
        ip: Option<String>,
        #[serde(rename = "allowManualIp", default)]
        allow_manual_ip: bool,
    },
    /// Relay is establishing the SSH session
    Connecting,
    /// SSH session is up, terminal traffic flows from here on
    Connected,
    /// Relay-side failure, human readable
    Error { message: String },
}

/// A frame as delivered by the transport, classified at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Control(ControlMessage),
    /// Raw terminal bytes (server banners, shell output, ANSI sequences)
    Data(Vec<u8>),
}

impl InboundFrame {
    /// Classify a text frame.
    ///
    /// Only text that starts with `{` is even considered as a control frame,
    /// and a schema parse failure falls back to raw data. The shell stream can
    /// legitimately contain `{`-prefixed text (e.g. `echo '{"status":1}'`), so
    /// parse failure must never be treated as a protocol error.
    pub fn from_text(text: String) -> Self {
        if text.trim_start().starts_with('{') {
            if let Ok(msg) = serde_json::from_str::<ControlMessage>(&text) {
                return InboundFrame::Control(msg);
            }
        }
        InboundFrame::Data(text.into_bytes())
    }

    /// Binary frames are always terminal data.
    pub fn from_binary(data: Vec<u8>) -> Self {
        InboundFrame::Data(data)
    }

    pub fn is_control(&self) -> bool {
        matches!(self, InboundFrame::Control(_))
    }
}

// ============================================
// Client → Server frames
// ============================================

/// The single reply to `need_credentials`.
///
/// Exactly one of `password`/`private_key` carries the secret; the other is
/// sent as an empty string so the server can discriminate the auth method from
/// the payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFrame {
    pub username: String,
    pub password: String,
    #[serde(rename = "privateKey")]
    pub private_key: String,
    pub host: String,
}

impl CredentialFrame {
    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Terminal geometry notification, sent only while the session is connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub cols: u16,
    pub rows: u16,
}

impl ResizeFrame {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            frame_type: "resize".to_string(),
            cols,
            rows,
        }
    }

    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================
// Connect URL
// ============================================

/// Build the relay connect URL for a node shell.
///
/// Scheme follows the API origin (https → wss), the session ticket and the
/// previously resolved IP ride as query parameters. An unresolved IP leaves
/// the parameter empty; the server then announces its own best guess in
/// `need_credentials`.
pub fn shell_url(
    api_base: &str,
    cluster: &str,
    node: &str,
    ticket: &str,
    ip: Option<&str>,
) -> Result<String, RelayError> {
    let (scheme, rest) = if let Some(rest) = api_base.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = api_base.strip_prefix("http://") {
        ("ws", rest)
    } else {
        return Err(RelayError::InvalidUrl(format!(
            "API base must start with http:// or https://: {api_base}"
        )));
    };

    let authority = rest.trim_end_matches('/');
    if authority.is_empty() {
        return Err(RelayError::InvalidUrl(format!("empty host in {api_base}")));
    }

    Ok(format!(
        "{scheme}://{authority}/api/clusters/{cluster}/nodes/{node}/shell?ticket={ticket}&ip={ip}",
        ip = ip.unwrap_or("")
    ))
}

/// True when the connect URL will use TLS; drives the certificate guidance
/// attached to early transport failures.
pub fn is_secure_origin(api_base: &str) -> bool {
    api_base.starts_with("https://")
}
