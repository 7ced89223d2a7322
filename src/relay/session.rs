// ABOUTME: Session controller - the state machine driving one shell relay session
// Classifies inbound frames, gates terminal input, and owns transport + surface teardown

use tracing::{debug, info, warn};

use crate::models::{Session, SessionState, SessionTarget};
use crate::relay::credentials::{build_credential_frame, CredentialError, LoginForm};
use crate::relay::protocol::{ControlMessage, InboundFrame};
use crate::relay::resize::ResizeCoordinator;
use crate::relay::surface::TerminalSurface;
use crate::relay::transport::{
    close_message, describe_transport_error, is_clean_close, FrameSink, TransportEvent, WireFrame,
};

/// Heuristic carried over from the relay server's error texts: messages that
/// mention login, auth or host problems are soft failures the operator can fix
/// by re-entering credentials.
fn is_auth_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["login", "auth", "host"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Drives one shell session over one transport.
///
/// The controller owns the session record, the login form, the resize
/// coordinator, the terminal surface and (once attached) the transport sink.
/// Events are handled synchronously one at a time; the driver feeding
/// `handle_event` is responsible for preserving delivery order.
pub struct SessionController {
    session: Session,
    login: LoginForm,
    resize: ResizeCoordinator,
    /// `None` only after teardown
    surface: Option<Box<dyn TerminalSurface>>,
    transport: Option<Box<dyn FrameSink>>,
    secure_origin: bool,
    /// True once any control frame arrived; errors before that point get
    /// certificate guidance on TLS origins
    saw_control: bool,
    /// Auth-flavored error seen, driver should schedule the login redirect
    pending_login_redirect: bool,
    /// Redirect timer handed to the driver and not yet fired or cancelled
    redirect_armed: bool,
    /// Inert flag: set at teardown, every entry point becomes a no-op
    torn_down: bool,
}

impl SessionController {
    pub fn new(
        target: SessionTarget,
        resolved_host: Option<String>,
        surface: Box<dyn TerminalSurface>,
        secure_origin: bool,
    ) -> Self {
        let session = Session::new(target, resolved_host);
        info!(
            "session {} created for {}/{}",
            session.id, session.target.cluster, session.target.node
        );
        Self {
            session,
            login: LoginForm::default(),
            resize: ResizeCoordinator::new(),
            surface: Some(surface),
            transport: None,
            secure_origin,
            saw_control: false,
            pending_login_redirect: false,
            redirect_armed: false,
            torn_down: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn login_form(&self) -> &LoginForm {
        &self.login
    }

    pub fn login_form_mut(&mut self) -> &mut LoginForm {
        &mut self.login
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// IP lookup failed; non-fatal, the connect attempt proceeds with an
    /// empty ip parameter.
    pub fn note_resolution_failure(&mut self, detail: &str) {
        if self.torn_down {
            return;
        }
        warn!("node ip resolution failed: {}", detail);
        self.surface_write(
            format!("\r\nWarning: could not resolve node address ({detail})\r\n").as_bytes(),
        );
    }

    /// Hand the freshly opened transport to the session.
    ///
    /// At most one transport per session: a still-open previous transport is
    /// closed first. Moves the session to `Connecting` - an open socket only
    /// proves the relay is reachable, not that the shell is up.
    pub fn attach_transport(&mut self, transport: Box<dyn FrameSink>) {
        if self.torn_down {
            return;
        }
        if let Some(mut old) = self.transport.replace(transport) {
            warn!("replacing transport on session {}", self.session.id);
            old.close();
        }
        self.set_state(SessionState::Connecting);
    }

    /// Entry point for everything the transport delivers, in delivery order.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if self.torn_down {
            debug!("dropping transport event after teardown");
            return;
        }
        match event {
            TransportEvent::Open => {
                debug!("relay socket open for session {}", self.session.id);
            }
            TransportEvent::Frame(WireFrame::Text(text)) => {
                self.handle_frame(InboundFrame::from_text(text));
            }
            TransportEvent::Frame(WireFrame::Binary(data)) => {
                self.handle_frame(InboundFrame::from_binary(data));
            }
            TransportEvent::Error(detail) => self.handle_transport_error(&detail),
            TransportEvent::Closed { code, reason } => self.handle_close(code, &reason),
        }
    }

    fn handle_frame(&mut self, frame: InboundFrame) {
        match frame {
            InboundFrame::Control(msg) => {
                self.saw_control = true;
                self.handle_control(msg);
            }
            // Raw bytes go to the surface in every state, so pre-auth banners
            // stay visible
            InboundFrame::Data(bytes) => self.surface_write(&bytes),
        }
    }

    fn handle_control(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::NeedCredentials {
                node,
                ip,
                allow_manual_ip,
            } => {
                info!("server requests credentials for node {}", node);
                if self.session.resolved_host.is_none() {
                    self.session.resolved_host = ip.clone();
                }
                self.login.present(node, ip, allow_manual_ip);
                self.set_state(SessionState::Login);
            }
            ControlMessage::Connecting => {
                debug!("relay is establishing the ssh session");
                self.set_state(SessionState::Connecting);
            }
            ControlMessage::Connected => {
                info!("shell connected on session {}", self.session.id);
                if let Some(surface) = self.surface.as_mut() {
                    surface.clear_scrollback();
                }
                self.set_state(SessionState::Connected);
            }
            ControlMessage::Error { message } => {
                warn!("relay reported error: {}", message);
                self.fail(&message, true);
            }
        }
    }

    fn handle_transport_error(&mut self, detail: &str) {
        let message = if self.saw_control {
            detail.to_string()
        } else {
            // Socket failed before the relay said anything; on TLS origins the
            // usual culprit is an unaccepted self-signed certificate
            describe_transport_error(self.secure_origin, detail)
        };
        self.fail(&message, false);
    }

    fn handle_close(&mut self, code: Option<u16>, reason: &str) {
        match self.session.state {
            // The error event preceding an abnormal close already settled the
            // session; a clean-shutdown race after teardown-by-cancel is
            // equally final
            SessionState::Error | SessionState::Disconnected => {
                debug!("ignoring close in state {:?}", self.session.state);
            }
            _ if is_clean_close(code) => {
                let message = close_message(reason);
                self.surface_write(format!("\r\n{message}\r\n").as_bytes());
                self.drop_transport();
                self.set_state(SessionState::Disconnected);
            }
            _ => {
                info!("abnormal close, code {:?}", code);
                self.fail(&close_message(reason), false);
            }
        }
    }

    /// Enter `Error`, render the message, and arm the login redirect when the
    /// message looks auth-shaped and `check_auth` allows it.
    fn fail(&mut self, message: &str, check_auth: bool) {
        self.surface_write(format!("\r\n{message}\r\n").as_bytes());
        self.drop_transport_if_dead();
        self.set_state(SessionState::Error);
        if check_auth && is_auth_error(message) {
            debug!("auth-shaped error, scheduling return to login");
            self.pending_login_redirect = true;
        }
    }

    /// Keystrokes from the terminal surface. Forwarded only while `Connected`;
    /// anything typed during `Login` belongs to the credential form, not the
    /// wire.
    pub fn handle_input(&mut self, data: &[u8]) {
        if self.torn_down || !self.session.state.is_connected() {
            return;
        }
        if let Some(transport) = self.transport.as_mut() {
            if transport.is_open() {
                if let Err(e) = transport.send_binary(data.to_vec()) {
                    warn!("dropping keystrokes, transport gone: {}", e);
                }
            }
        }
    }

    /// Surface geometry changed. Sent as a resize frame only while connected;
    /// otherwise recorded and dropped (the surface re-notifies on connect).
    pub fn notify_resize(&mut self, cols: u16, rows: u16) {
        if self.torn_down {
            return;
        }
        self.session.last_geometry = Some((cols, rows));
        let connected = self.session.state.is_connected()
            && self.transport.as_ref().is_some_and(|t| t.is_open());
        if let Some(frame) = self.resize.notify(connected, cols, rows) {
            match frame.to_json() {
                Ok(json) => {
                    if let Some(transport) = self.transport.as_mut() {
                        if let Err(e) = transport.send_text(json) {
                            warn!("resize frame dropped: {}", e);
                        }
                    }
                }
                Err(e) => warn!("resize frame encoding failed: {}", e),
            }
        }
    }

    /// Submit the login form. Sends exactly one credential frame, moves the
    /// session to `Connecting` and hides the form; secret fields stay for a
    /// potential resubmission.
    pub fn submit_credentials(&mut self) -> Result<(), CredentialError> {
        if self.torn_down || self.session.state != SessionState::Login {
            return Ok(());
        }
        let credentials = self.login.credentials();
        let frame = build_credential_frame(
            &credentials,
            self.session.resolved_host.as_deref(),
            self.login.announced_ip.as_deref(),
        )?;
        match frame.to_json() {
            Ok(json) => {
                if let Some(transport) = self.transport.as_mut() {
                    if let Err(e) = transport.send_text(json) {
                        self.fail(&format!("Could not send credentials: {e}"), false);
                        return Ok(());
                    }
                } else {
                    self.fail("Could not send credentials: transport is gone", false);
                    return Ok(());
                }
            }
            Err(e) => {
                self.fail(&format!("Could not encode credentials: {e}"), false);
                return Ok(());
            }
        }
        info!("credentials submitted for session {}", self.session.id);
        self.login.hide();
        self.pending_login_redirect = false;
        self.set_state(SessionState::Connecting);
        Ok(())
    }

    /// Operator dismissed the login form: the session ends and the socket is
    /// closed.
    pub fn cancel_login(&mut self) {
        if self.torn_down || self.session.state != SessionState::Login {
            return;
        }
        info!("login cancelled, ending session {}", self.session.id);
        self.login.hide();
        self.drop_transport();
        self.set_state(SessionState::Disconnected);
    }

    /// Driver-side poll: true once per auth-shaped error. The driver then
    /// waits the configured delay and calls [`Self::login_redirect_due`].
    pub fn take_login_redirect_request(&mut self) -> bool {
        if self.pending_login_redirect {
            self.pending_login_redirect = false;
            self.redirect_armed = true;
            true
        } else {
            false
        }
    }

    /// The login-redirect delay elapsed. Only acts if the session still sits
    /// in `Error` and has not been torn down meanwhile.
    pub fn login_redirect_due(&mut self) {
        if self.torn_down || !self.redirect_armed {
            return;
        }
        self.redirect_armed = false;
        if self.session.state == SessionState::Error {
            info!("returning to login after auth error");
            self.login.visible = true;
            self.set_state(SessionState::Login);
        }
    }

    /// Tear the session down. Runs on every exit path; closes the transport,
    /// releases the terminal surface, cancels the pending redirect and marks
    /// the session inert so late frames are no-ops. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        info!("tearing down session {}", self.session.id);
        self.pending_login_redirect = false;
        self.redirect_armed = false;
        self.drop_transport();
        self.set_state(SessionState::Disconnected);
        self.surface = None;
        self.torn_down = true;
    }

    fn surface_write(&mut self, data: &[u8]) {
        if let Some(surface) = self.surface.as_mut() {
            surface.write(data);
        }
    }

    fn drop_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }

    fn drop_transport_if_dead(&mut self) {
        if self.transport.as_ref().is_some_and(|t| !t.is_open()) {
            self.transport = None;
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.session.state != state {
            debug!(
                "session {}: {} -> {}",
                self.session.id,
                self.session.state.label(),
                state.label()
            );
            self.session.state = state;
        }
    }
}
