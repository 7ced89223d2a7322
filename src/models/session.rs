// ABOUTME: Session data model representing one remote-shell connection attempt to a cluster node

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Node addressed by a shell session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTarget {
    pub cluster: String,
    pub node: String,
}

impl SessionTarget {
    pub fn new(cluster: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            node: node.into(),
        }
    }
}

/// Lifecycle of a shell session.
///
/// `Connected` means the SSH session behind the relay is authenticated and
/// live; a merely open socket still counts as `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Dependencies (terminal surface, transport) are being prepared
    Loading,
    /// Socket opening, or waiting for the relay to establish SSH
    Connecting,
    /// Server asked for credentials; terminal input is suspended
    Login,
    /// Shell is live, terminal traffic flows both ways
    Connected,
    /// Session over; the operator must reopen the view to start a new one
    Disconnected,
    /// Transport or relay failure; may auto-return to Login for auth errors
    Error,
}

impl SessionState {
    pub fn indicator(&self) -> &'static str {
        match self {
            SessionState::Loading => "…",
            SessionState::Connecting => "◌",
            SessionState::Login => "?",
            SessionState::Connected => "●",
            SessionState::Disconnected => "⏸",
            SessionState::Error => "✗",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Connecting => "connecting",
            SessionState::Login => "login",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::Error => "error",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// Terminal state: nothing further happens without operator action.
    pub fn is_over(&self) -> bool {
        matches!(self, SessionState::Disconnected)
    }
}

/// One end-to-end shell connection attempt.
///
/// Owned by its session controller; never shared across sessions. All state
/// mutation goes through controller methods.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub target: SessionTarget,
    /// Node IP resolved via REST before connecting, if the lookup succeeded
    pub resolved_host: Option<String>,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    /// Last geometry reported by the terminal surface
    pub last_geometry: Option<(u16, u16)>,
}

impl Session {
    pub fn new(target: SessionTarget, resolved_host: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            resolved_host,
            state: SessionState::Loading,
            created_at: Utc::now(),
            last_geometry: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_session_starts_loading() {
        let session = Session::new(SessionTarget::new("c1", "pve1"), None);
        assert_eq!(session.state, SessionState::Loading);
        assert_eq!(session.resolved_host, None);
        assert_eq!(session.last_geometry, None);
    }

    #[test]
    fn state_helpers() {
        assert!(SessionState::Connected.is_connected());
        assert!(!SessionState::Login.is_connected());
        assert!(SessionState::Disconnected.is_over());
        assert!(!SessionState::Error.is_over());
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(SessionState::Connecting.label(), "connecting");
        assert_eq!(SessionState::Error.indicator(), "✗");
    }
}
