// ABOUTME: Relay module for the interactive node-shell session
// Protocol, transport, credential negotiation and the session state machine

pub mod credentials;
pub mod error;
pub mod protocol;
pub mod resize;
pub mod session;
pub mod surface;
pub mod transport;

pub use credentials::{AuthMethod, CredentialError, Credentials, LoginForm};
pub use error::RelayError;
pub use protocol::{shell_url, ControlMessage, CredentialFrame, InboundFrame, ResizeFrame};
pub use session::SessionController;
pub use surface::TerminalSurface;
pub use transport::{FrameSink, TransportEvent, WireFrame, WsTransport};
