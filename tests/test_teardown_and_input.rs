// ABOUTME: Integration tests for input gating, frame ordering and teardown inertness

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;

use pegashell::models::{SessionState, SessionTarget};
use pegashell::relay::session::SessionController;
use pegashell::relay::surface::TerminalSurface;
use pegashell::relay::transport::TransportEvent;

#[test]
fn server_bytes_reach_surface_in_every_state_and_in_order() {
    let (mut controller, surface_log, _sink_log) = controller_with_transport(None);

    controller.handle_event(text_frame("one "));
    controller.handle_event(text_frame(NEED_CREDENTIALS)); // -> Login
    controller.handle_event(binary_frame(b"two "));
    controller.handle_event(text_frame(CONNECTED)); // -> Connected
    controller.handle_event(text_frame("three"));

    assert_eq!(surface_log.text(), "one two three");
    assert_eq!(
        surface_log.writes(),
        vec![b"one ".to_vec(), b"two ".to_vec(), b"three".to_vec()]
    );
}

#[test]
fn keystrokes_are_forwarded_only_while_connected() {
    let (mut controller, _surface_log, sink_log) = controller_with_transport(None);

    // Connecting
    controller.handle_input(b"ls\r");
    // Login
    controller.handle_event(text_frame(NEED_CREDENTIALS));
    controller.handle_input(b"secret-password");
    assert!(sink_log.binaries().is_empty());

    // Connected
    controller.handle_event(text_frame(CONNECTED));
    controller.handle_input(b"ls\r");
    assert_eq!(sink_log.binaries(), vec![b"ls\r".to_vec()]);

    // Error
    controller.handle_event(TransportEvent::Error("boom".to_string()));
    controller.handle_input(b"echo no\r");
    assert_eq!(sink_log.binaries().len(), 1);
}

#[test]
fn keystrokes_on_dead_transport_are_dropped_silently() {
    let (mut controller, _surface_log, sink_log) = connected_controller();

    sink_log.force_closed();
    controller.handle_input(b"ls\r");

    assert!(sink_log.binaries().is_empty());
    // State is the relay's call, not the keystroke path's
    assert_eq!(controller.state(), SessionState::Connected);
}

#[test]
fn late_frame_after_teardown_is_a_noop() {
    let (mut controller, surface_log, _sink_log) = connected_controller();
    controller.handle_event(text_frame("before "));
    let writes_before = surface_log.write_count();

    controller.teardown();
    assert_eq!(controller.state(), SessionState::Disconnected);

    // A frame that was already in flight when the session was torn down
    controller.handle_event(text_frame("after"));
    controller.handle_event(TransportEvent::Closed {
        code: Some(1006),
        reason: String::new(),
    });
    controller.handle_input(b"x");
    controller.notify_resize(10, 10);

    assert_eq!(surface_log.write_count(), writes_before);
    assert_eq!(controller.state(), SessionState::Disconnected);
}

#[test]
fn teardown_closes_transport_and_cancels_redirect_timer() {
    let (mut controller, _surface_log, sink_log) = connected_controller();

    controller.handle_event(text_frame(r#"{"status":"error","message":"Login failed"}"#));
    assert!(controller.take_login_redirect_request());

    controller.teardown();
    assert!(!sink_log.is_open());

    // The armed timer fires after teardown and must not resurrect the session
    controller.login_redirect_due();
    assert_eq!(controller.state(), SessionState::Disconnected);
}

struct TrackedSurface {
    released: Arc<AtomicBool>,
}

impl TerminalSurface for TrackedSurface {
    fn write(&mut self, _data: &[u8]) {}
    fn clear_scrollback(&mut self) {}
}

impl Drop for TrackedSurface {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[test]
fn teardown_releases_the_terminal_surface() {
    let released = Arc::new(AtomicBool::new(false));
    let surface = TrackedSurface {
        released: released.clone(),
    };
    let mut controller = SessionController::new(
        SessionTarget::new("c1", "pve1"),
        None,
        Box::new(surface),
        true,
    );

    assert!(!released.load(Ordering::SeqCst));
    controller.teardown();
    // The surface goes with the teardown, not with the controller's own drop
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn teardown_is_idempotent_and_forced_from_any_state() {
    let (mut controller, _surface_log, sink_log) = controller_with_transport(None);
    controller.handle_event(text_frame(NEED_CREDENTIALS));
    assert_eq!(controller.state(), SessionState::Login);

    controller.teardown();
    controller.teardown();

    assert!(controller.is_torn_down());
    assert_eq!(controller.state(), SessionState::Disconnected);
    assert!(!sink_log.is_open());
}
