//! Module Exports
//!
//! This file exports the key modules of the drive control system.
//!
//! - `translator`: converts controller snapshot pairs into drive commands.
//! - `drive`: command-path dispatch and vehicle-status relay.

pub mod drive;
pub mod translator;

use serde::{Deserialize, Serialize};

pub use drive::{DRIVE_CHANNEL, STATUS_BUS};
use translator::ControllerSnapshot;

/// Messages an operator session sends over the WebSocket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "ct", rename_all = "snake_case")] // ct = command type
pub enum SystemCommand {
    /// One controller sampling tick: left and right hand snapshots.
    Input {
        l: ControllerSnapshot,
        r: ControllerSnapshot,
    },
    /// Manual emergency stop, independent of controller sampling.
    Estop,
}
