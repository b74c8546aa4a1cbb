//! Module Exports
//!
//! This file exports the key modules used in the operator-facing server
//! implementation.
//!
//! # Modules
//! - `server`: Manages the WebSocket server, HTTP routes, and sessions.

/// Module for managing the WebSocket server, including routes, sessions, and
/// connection handling.
pub mod server;
