// ABOUTME: Shared recording mocks and builders for relay session integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use pegashell::models::SessionTarget;
use pegashell::relay::error::RelayError;
use pegashell::relay::session::SessionController;
use pegashell::relay::surface::TerminalSurface;
use pegashell::relay::transport::{FrameSink, TransportEvent, WireFrame};

/// Shared view into everything a `RecordingSurface` was asked to do.
#[derive(Clone, Default)]
pub struct SurfaceLog {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    clears: Arc<Mutex<usize>>,
}

impl SurfaceLog {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn clear_count(&self) -> usize {
        *self.clears.lock().unwrap()
    }

    /// Everything written, lossily decoded and concatenated in order.
    pub fn text(&self) -> String {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }
}

pub struct RecordingSurface {
    log: SurfaceLog,
}

impl RecordingSurface {
    pub fn new() -> (Self, SurfaceLog) {
        let log = SurfaceLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl TerminalSurface for RecordingSurface {
    fn write(&mut self, data: &[u8]) {
        self.log.writes.lock().unwrap().push(data.to_vec());
    }

    fn clear_scrollback(&mut self) {
        *self.log.clears.lock().unwrap() += 1;
    }
}

/// Shared view into frames pushed at a `RecordingSink`.
#[derive(Clone)]
pub struct SinkLog {
    texts: Arc<Mutex<Vec<String>>>,
    binaries: Arc<Mutex<Vec<Vec<u8>>>>,
    open: Arc<Mutex<bool>>,
}

impl Default for SinkLog {
    fn default() -> Self {
        Self {
            texts: Arc::new(Mutex::new(Vec::new())),
            binaries: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(Mutex::new(true)),
        }
    }
}

impl SinkLog {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn binaries(&self) -> Vec<Vec<u8>> {
        self.binaries.lock().unwrap().clone()
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock().unwrap()
    }

    /// Simulate the server side dropping the socket.
    pub fn force_closed(&self) {
        *self.open.lock().unwrap() = false;
    }
}

pub struct RecordingSink {
    log: SinkLog,
}

impl RecordingSink {
    pub fn new() -> (Self, SinkLog) {
        let log = SinkLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl FrameSink for RecordingSink {
    fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        if !self.is_open() {
            return Err(RelayError::TransportClosed);
        }
        self.log.texts.lock().unwrap().push(text);
        Ok(())
    }

    fn send_binary(&mut self, data: Vec<u8>) -> Result<(), RelayError> {
        if !self.is_open() {
            return Err(RelayError::TransportClosed);
        }
        self.log.binaries.lock().unwrap().push(data);
        Ok(())
    }

    fn close(&mut self) {
        *self.log.open.lock().unwrap() = false;
    }

    fn is_open(&self) -> bool {
        *self.log.open.lock().unwrap()
    }
}

/// Controller with a recording surface and attached recording transport, in
/// `Connecting` state, targeting c1/pve1 over a TLS origin.
pub fn controller_with_transport(
    resolved_host: Option<&str>,
) -> (SessionController, SurfaceLog, SinkLog) {
    let (surface, surface_log) = RecordingSurface::new();
    let mut controller = SessionController::new(
        SessionTarget::new("c1", "pve1"),
        resolved_host.map(str::to_string),
        Box::new(surface),
        true,
    );
    let (sink, sink_log) = RecordingSink::new();
    controller.attach_transport(Box::new(sink));
    (controller, surface_log, sink_log)
}

pub fn text_frame(text: &str) -> TransportEvent {
    TransportEvent::Frame(WireFrame::Text(text.to_string()))
}

pub fn binary_frame(data: &[u8]) -> TransportEvent {
    TransportEvent::Frame(WireFrame::Binary(data.to_vec()))
}

pub const NEED_CREDENTIALS: &str =
    r#"{"status":"need_credentials","node":"pve1","ip":"10.0.0.5","allowManualIp":false}"#;
pub const CONNECTED: &str = r#"{"status":"connected"}"#;
pub const CONNECTING: &str = r#"{"status":"connecting"}"#;

/// Drive a fresh controller into the `Connected` state.
pub fn connected_controller() -> (SessionController, SurfaceLog, SinkLog) {
    let (mut controller, surface_log, sink_log) = controller_with_transport(Some("10.0.0.5"));
    controller.handle_event(text_frame(CONNECTED));
    (controller, surface_log, sink_log)
}
