//! Math utilities for the rover control server.
//!
//! This module provides thumbstick extraction from raw controller axis arrays.

pub mod stick;
