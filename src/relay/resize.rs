// ABOUTME: Resize coordinator translating surface geometry changes into resize frames
// Geometry reported outside the Connected state is recorded and silently dropped

use crate::relay::protocol::ResizeFrame;

/// Decides whether a surface geometry change becomes a wire frame.
///
/// There is no queued resend: the surface re-fits and re-notifies once the
/// session connects, so geometry observed earlier only updates the record.
/// Duplicate identical geometries are sent anyway; the server tolerates them.
#[derive(Debug, Default)]
pub struct ResizeCoordinator {
    last: Option<(u16, u16)>,
}

impl ResizeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the new geometry and, while connected, produce the frame to send.
    pub fn notify(&mut self, connected: bool, cols: u16, rows: u16) -> Option<ResizeFrame> {
        self.last = Some((cols, rows));
        if connected {
            Some(ResizeFrame::new(cols, rows))
        } else {
            None
        }
    }

    /// Last geometry the surface reported, connected or not.
    pub fn last_geometry(&self) -> Option<(u16, u16)> {
        self.last
    }
}
