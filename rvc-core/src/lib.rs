//! Core drive-command translation and operator link for the rover control
//! server on no-std embedded platforms.
//!
//! For a runnable std harness, see the `mock-bridge` application.
#![no_std]

extern crate alloc;

pub mod utils;
