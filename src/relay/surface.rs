// ABOUTME: Terminal surface abstraction the session controller writes to
// The actual emulator (screen rendering, keyboard mapping) lives outside this crate

/// Screen side of the session.
///
/// The controller only ever pushes bytes at the surface and clears its
/// scrollback when a fresh shell comes up; rendering and keyboard handling are
/// the surface implementation's business.
pub trait TerminalSurface: Send {
    /// Write raw terminal bytes (may contain ANSI sequences, partial UTF-8).
    fn write(&mut self, data: &[u8]);

    /// Drop scrollback and visible content, giving a clean view for a new
    /// shell session.
    fn clear_scrollback(&mut self);
}
