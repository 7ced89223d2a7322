// ABOUTME: Integration tests for resize notification gating

mod common;

use common::*;
use pretty_assertions::assert_eq;

use pegashell::models::SessionState;
use pegashell::relay::transport::TransportEvent;

#[test]
fn resize_is_sent_only_while_connected() {
    let (mut controller, _surface_log, sink_log) = controller_with_transport(None);

    // Connecting: recorded, dropped
    controller.notify_resize(80, 24);
    assert!(sink_log.texts().is_empty());
    assert_eq!(controller.session().last_geometry, Some((80, 24)));

    // Login: still dropped
    controller.handle_event(text_frame(NEED_CREDENTIALS));
    controller.notify_resize(100, 30);
    assert!(sink_log.texts().is_empty());

    // Connected: sent
    controller.handle_event(text_frame(CONNECTED));
    controller.notify_resize(120, 40);
    assert_eq!(
        sink_log.texts(),
        vec![r#"{"type":"resize","cols":120,"rows":40}"#.to_string()]
    );
}

#[test]
fn duplicate_geometry_is_sent_again() {
    let (mut controller, _surface_log, sink_log) = connected_controller();

    controller.notify_resize(80, 24);
    controller.notify_resize(80, 24);

    assert_eq!(sink_log.texts().len(), 2);
}

#[test]
fn resize_after_close_is_dropped_without_error() {
    let (mut controller, _surface_log, sink_log) = connected_controller();

    controller.handle_event(TransportEvent::Closed {
        code: Some(1000),
        reason: String::new(),
    });
    assert_eq!(controller.state(), SessionState::Disconnected);

    controller.notify_resize(90, 25);

    assert!(sink_log.texts().is_empty());
    assert_eq!(controller.session().last_geometry, Some((90, 25)));
}
