// ABOUTME: Error types for the relay session layer
// Covers transport, frame encoding and connect URL failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Transport is closed")]
    TransportClosed,

    #[error("Frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid relay URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
