// ABOUTME: Library crate for pegashell exposing the relay session core for testing and reuse

pub mod config;
pub mod interactive;
pub mod models;
pub mod relay;
pub mod resolver;
