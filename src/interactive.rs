// ABOUTME: Interactive CLI driver wiring the crossterm terminal to a relay session
// Owns the event loop: transport events, keystrokes, resize, login prompt, redirect timer

use std::io::{self, Write};

use anyhow::{Context, Result};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::{SessionState, SessionTarget};
use crate::relay::credentials::{AuthMethod, LoginForm};
use crate::relay::protocol::{is_secure_origin, shell_url};
use crate::relay::session::SessionController;
use crate::relay::surface::TerminalSurface;
use crate::relay::transport::{TransportEvent, WsTransport};
use crate::resolver::IpResolver;

/// Terminal surface backed by the process stdout. No emulation: bytes pass
/// through untouched, the hosting terminal does the rendering.
pub struct StdoutSurface;

impl TerminalSurface for StdoutSurface {
    fn write(&mut self, data: &[u8]) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(data);
        let _ = stdout.flush();
    }

    fn clear_scrollback(&mut self) {
        // Erase scrollback, home the cursor, clear the screen
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x1b[3J\x1b[H\x1b[2J");
        let _ = stdout.flush();
    }
}

/// Map a key press to the byte sequence an xterm-style terminal would emit.
/// Returns `None` for keys that have no wire representation.
pub fn encode_key(key: &KeyEvent) -> Option<Vec<u8>> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let c = c.to_ascii_lowercase();
            c.is_ascii_lowercase()
                .then(|| vec![(c as u8) & 0x1f])
        }
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::ALT) => {
            let mut bytes = vec![0x1b];
            bytes.extend(c.to_string().into_bytes());
            Some(bytes)
        }
        KeyCode::Char(c) => Some(c.to_string().into_bytes()),
        KeyCode::Enter => Some(b"\r".to_vec()),
        KeyCode::Tab => Some(b"\t".to_vec()),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Esc => Some(vec![0x1b]),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        KeyCode::Home => Some(b"\x1b[H".to_vec()),
        KeyCode::End => Some(b"\x1b[F".to_vec()),
        KeyCode::Insert => Some(b"\x1b[2~".to_vec()),
        KeyCode::Delete => Some(b"\x1b[3~".to_vec()),
        KeyCode::PageUp => Some(b"\x1b[5~".to_vec()),
        KeyCode::PageDown => Some(b"\x1b[6~".to_vec()),
        _ => None,
    }
}

/// The one event stream the session consumes, in delivery order.
#[derive(Debug)]
pub enum DriverEvent {
    Transport(TransportEvent),
    Key(KeyEvent),
    Resize(u16, u16),
    LoginRedirectDue,
    Detach,
}

/// Detach chord: Ctrl+] (telnet style)
fn is_detach(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char(']') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Run one interactive shell session against a cluster node. Returns when the
/// session ends or the operator detaches; a new session needs a new call.
pub async fn run(config: &AppConfig, target: SessionTarget, ticket: &str) -> Result<()> {
    let secure = is_secure_origin(&config.api_base);

    // Best-effort IP lookup; a failure only leaves the ip parameter empty
    let resolver = IpResolver::new(&config.api_base, ticket, config.insecure);
    let (resolved_host, resolve_failure) =
        match resolver.resolve(&target.cluster, &target.node).await {
            Ok(node_ip) => (Some(node_ip.ip), None),
            Err(e) => (None, Some(e.to_string())),
        };

    let mut controller = SessionController::new(
        target.clone(),
        resolved_host.clone(),
        Box::new(StdoutSurface),
        secure,
    );
    if let Some(detail) = resolve_failure {
        controller.note_resolution_failure(&detail);
    }

    let url = shell_url(
        &config.api_base,
        &target.cluster,
        &target.node,
        ticket,
        resolved_host.as_deref(),
    )?;

    let (tx, mut rx) = mpsc::unbounded_channel::<DriverEvent>();

    match tokio::time::timeout(config.connect_timeout(), WsTransport::connect(&url)).await {
        Ok(Ok((transport, mut transport_events))) => {
            controller.attach_transport(Box::new(transport));
            // Forward transport events into the single driver stream; one
            // forwarder keeps the ordering guarantee intact
            let forward_tx = tx.clone();
            tokio::spawn(async move {
                while let Some(event) = transport_events.recv().await {
                    if forward_tx.send(DriverEvent::Transport(event)).is_err() {
                        break;
                    }
                }
            });
        }
        Ok(Err(e)) => {
            controller.handle_event(TransportEvent::Error(e.to_string()));
        }
        Err(_) => {
            controller.handle_event(TransportEvent::Error(format!(
                "timed out after {:?} waiting for the relay",
                config.connect_timeout()
            )));
        }
    }

    enable_raw_mode().context("enabling raw mode")?;
    spawn_input_reader(tx.clone());
    if let Ok((cols, rows)) = crossterm::terminal::size() {
        controller.notify_resize(cols, rows);
    }

    let loop_result = drive(&mut controller, &tx, &mut rx, config).await;

    controller.teardown();
    disable_raw_mode().context("disabling raw mode")?;
    println!();
    loop_result
}

async fn drive(
    controller: &mut SessionController,
    tx: &mpsc::UnboundedSender<DriverEvent>,
    rx: &mut mpsc::UnboundedReceiver<DriverEvent>,
    config: &AppConfig,
) -> Result<()> {
    let mut previous_state = controller.state();
    let mut prompt: Option<LoginPrompt> = None;
    // Covers a connect failure surfaced before the loop starts
    let mut redirect_in_flight = schedule_redirect(controller, tx, config);
    if session_settled(controller, redirect_in_flight) {
        return Ok(());
    }

    while let Some(event) = rx.recv().await {
        match event {
            DriverEvent::Transport(transport_event) => controller.handle_event(transport_event),
            // The reader thread is the only consumer of the terminal; key
            // events go to the active credential prompt first, to the shell
            // otherwise
            DriverEvent::Key(key) => match prompt.take() {
                Some(mut active) => match active.handle_key(&key) {
                    PromptOutcome::Pending => prompt = Some(active),
                    PromptOutcome::Cancelled => controller.cancel_login(),
                    PromptOutcome::Submitted => {
                        active.apply(controller.login_form_mut());
                        if let Err(e) = controller.submit_credentials() {
                            // Form stays visible, a fresh prompt starts below
                            print_raw(&format!("{e}\r\n"));
                        }
                    }
                },
                None => {
                    if let Some(bytes) = encode_key(&key) {
                        controller.handle_input(&bytes);
                    }
                }
            },
            DriverEvent::Resize(cols, rows) => controller.notify_resize(cols, rows),
            DriverEvent::LoginRedirectDue => {
                redirect_in_flight = false;
                controller.login_redirect_due();
            }
            DriverEvent::Detach => {
                info!("operator detached");
                break;
            }
        }

        if schedule_redirect(controller, tx, config) {
            redirect_in_flight = true;
        }

        // The CLI surface re-fits on connect, like a browser surface would
        if controller.state() == SessionState::Connected && previous_state != SessionState::Connected
        {
            if let Ok((cols, rows)) = crossterm::terminal::size() {
                controller.notify_resize(cols, rows);
            }
        }
        previous_state = controller.state();

        if controller.state() != SessionState::Login {
            prompt = None;
        } else if controller.login_form().visible && prompt.is_none() {
            prompt = Some(LoginPrompt::start(controller.login_form()));
        }

        if session_settled(controller, redirect_in_flight) {
            break;
        }
    }
    Ok(())
}

/// Auth-shaped error: arrange the delayed drop back to the login form.
pub fn schedule_redirect(
    controller: &mut SessionController,
    tx: &mpsc::UnboundedSender<DriverEvent>,
    config: &AppConfig,
) -> bool {
    if !controller.take_login_redirect_request() {
        return false;
    }
    let timer_tx = tx.clone();
    let delay = config.auth_retry_delay();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = timer_tx.send(DriverEvent::LoginRedirectDue);
    });
    true
}

/// The session needs no further events: it is over, or it sits in a hard
/// error with no login redirect on the way.
fn session_settled(controller: &SessionController, redirect_in_flight: bool) -> bool {
    controller.state().is_over()
        || (controller.state() == SessionState::Error && !redirect_in_flight)
}

/// Blocking reader for crossterm events, feeding the driver channel. The
/// thread winds down once the session (and with it the receiver) is gone.
fn spawn_input_reader(tx: mpsc::UnboundedSender<DriverEvent>) {
    std::thread::spawn(move || loop {
        match crossterm::event::read() {
            Ok(Event::Key(key)) => {
                if is_detach(&key) {
                    let _ = tx.send(DriverEvent::Detach);
                    break;
                }
                if tx.send(DriverEvent::Key(key)).is_err() {
                    break;
                }
            }
            Ok(Event::Resize(cols, rows)) => {
                if tx.send(DriverEvent::Resize(cols, rows)).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("input reader stopped: {}", e);
                break;
            }
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptStage {
    Username,
    Method,
    Password,
    KeyPath,
    Passphrase,
    HostOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptOutcome {
    Pending,
    Cancelled,
    Submitted,
}

/// Line-oriented credential prompt fed by key events from the single terminal
/// reader; the shell keystroke path never competes with it for input.
///
/// Raw mode stays on throughout, so echo is manual and the secret stages echo
/// nothing. Esc or an empty username cancels the login.
struct LoginPrompt {
    stage: PromptStage,
    buffer: String,
    allow_manual_ip: bool,
    username: String,
    auth_method: AuthMethod,
    secret: String,
    passphrase: Option<String>,
    host_override: Option<String>,
}

impl LoginPrompt {
    fn start(form: &LoginForm) -> Self {
        let mut banner = format!("\r\nCredentials for node '{}'\r\n", form.node);
        if let Some(ip) = &form.announced_ip {
            banner.push_str(&format!("Target address: {ip}\r\n"));
        }
        print_raw(&banner);
        let prompt = Self {
            stage: PromptStage::Username,
            buffer: String::new(),
            allow_manual_ip: form.allow_manual_ip,
            username: String::new(),
            auth_method: AuthMethod::Password,
            secret: String::new(),
            passphrase: None,
            host_override: None,
        };
        prompt.show_stage();
        prompt
    }

    fn label(&self) -> &'static str {
        match self.stage {
            PromptStage::Username => "Username (empty to cancel): ",
            PromptStage::Method => "Auth method [password/key] (default password): ",
            PromptStage::Password => "Password: ",
            PromptStage::KeyPath => "Private key file: ",
            PromptStage::Passphrase => "Passphrase (empty for none): ",
            PromptStage::HostOverride => "Host override (empty to keep announced): ",
        }
    }

    fn echoes(&self) -> bool {
        !matches!(self.stage, PromptStage::Password | PromptStage::Passphrase)
    }

    fn show_stage(&self) {
        print_raw(self.label());
    }

    fn handle_key(&mut self, key: &KeyEvent) -> PromptOutcome {
        if key.kind != KeyEventKind::Press {
            return PromptOutcome::Pending;
        }
        match key.code {
            KeyCode::Esc => PromptOutcome::Cancelled,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                PromptOutcome::Cancelled
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.buffer.push(c);
                if self.echoes() {
                    print_raw(&c.to_string());
                }
                PromptOutcome::Pending
            }
            KeyCode::Backspace => {
                if self.buffer.pop().is_some() && self.echoes() {
                    print_raw("\x08 \x08");
                }
                PromptOutcome::Pending
            }
            KeyCode::Enter => {
                print_raw("\r\n");
                self.finish_line()
            }
            _ => PromptOutcome::Pending,
        }
    }

    fn finish_line(&mut self) -> PromptOutcome {
        let line = std::mem::take(&mut self.buffer);
        match self.stage {
            PromptStage::Username => {
                if line.trim().is_empty() {
                    return PromptOutcome::Cancelled;
                }
                self.username = line.trim().to_string();
                self.stage = PromptStage::Method;
            }
            PromptStage::Method => {
                if line.trim().eq_ignore_ascii_case("key") {
                    self.auth_method = AuthMethod::PrivateKey;
                    self.stage = PromptStage::KeyPath;
                } else {
                    self.auth_method = AuthMethod::Password;
                    self.stage = PromptStage::Password;
                }
            }
            PromptStage::Password => {
                self.secret = line;
                return self.finish_or_ask_host();
            }
            PromptStage::KeyPath => match std::fs::read_to_string(line.trim()) {
                Ok(key) => {
                    self.secret = key;
                    self.stage = PromptStage::Passphrase;
                }
                Err(e) => {
                    // Stay on this stage and ask again
                    print_raw(&format!("Could not read {}: {e}\r\n", line.trim()));
                }
            },
            PromptStage::Passphrase => {
                self.passphrase = (!line.trim().is_empty()).then(|| line.trim().to_string());
                return self.finish_or_ask_host();
            }
            PromptStage::HostOverride => {
                self.host_override = (!line.trim().is_empty()).then(|| line.trim().to_string());
                return PromptOutcome::Submitted;
            }
        }
        self.show_stage();
        PromptOutcome::Pending
    }

    fn finish_or_ask_host(&mut self) -> PromptOutcome {
        if self.allow_manual_ip {
            self.stage = PromptStage::HostOverride;
            self.show_stage();
            PromptOutcome::Pending
        } else {
            PromptOutcome::Submitted
        }
    }

    /// Move the collected answers into the login form.
    fn apply(self, form: &mut LoginForm) {
        form.username = self.username;
        form.auth_method = self.auth_method;
        form.secret = self.secret;
        form.passphrase = self.passphrase;
        form.host_override = self.host_override;
    }
}

fn print_raw(text: &str) {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}
