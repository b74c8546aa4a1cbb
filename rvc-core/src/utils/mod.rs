//! Utility re-exports and helper macros for the rover control server.
//!
//! This module re-exports the command translator, timing, stick math, and
//! connection layers:
//!
//! - `connection`: WebSocket server, HTTP endpoints, and session handling
//! - `controllers`: controller-to-drive translation and the command link
//! - `math`: thumbstick extraction from raw controller axis arrays
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod connection;
pub mod controllers;
pub mod math;

pub use connection::server::run as wss;
pub use controllers::translator::CommandTranslator;
pub use embassy_time::*;
pub use math::stick::ThumbstickVector;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
