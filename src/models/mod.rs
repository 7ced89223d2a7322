// ABOUTME: Data models for shell sessions and their lifecycle state

pub mod session;

pub use session::{Session, SessionState, SessionTarget};
