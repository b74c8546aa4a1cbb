//! Thumbstick extraction from raw controller axis arrays.
//!
//! Physical controllers disagree on which axis index carries the primary
//! thumbstick, so `extract_thumbstick` evaluates an ordered list of candidate
//! index pairs and returns the first pair showing real input.
//!
//! # Example
//! ```rust
//! use rvc_core::utils::math::stick::extract_thumbstick;
//! let stick = extract_thumbstick(&[0.0, 0.0, -0.8, 0.0]);
//! assert_eq!(stick.x, -0.8);
//! ```
//!
use serde::{Deserialize, Serialize};

/// Magnitude below which an axis reading is considered idle drift rather than
/// input, used only for axis-pair detection (the drive deadzone is separate).
pub const AXIS_NOISE_FLOOR: f32 = 0.05;

/// Candidate thumbstick index pairs for four-axis devices, in priority order.
/// Index pair (2,3) is the common layout for VR hand controllers; (0,1) is
/// the standard gamepad layout.
const PREFERRED_PAIRS: [(usize, usize); 2] = [(2, 3), (0, 1)];

/// One resolved thumbstick position, components in [-1.0, 1.0] rounded to
/// three decimal places. Recomputed fresh for every sampling tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThumbstickVector {
    pub x: f32,
    pub y: f32,
}

/// Read an axis value, treating missing entries as centered.
#[inline]
fn axis(
    axes: &[f32],
    index: usize,
) -> f32 {
    axes.get(index).copied().unwrap_or(0.0)
}

/// Round to three decimal places, matching the wire precision of the
/// operator client.
fn round3(value: f32) -> f32 {
    libm::roundf(value * 1000.0) / 1000.0
}

/// Resolve the active thumbstick pair from a raw axis array.
///
/// Detection cascade:
/// 1. Four or more axes: the first of `PREFERRED_PAIRS` where either value
///    exceeds the noise floor.
/// 2. Two or three axes: indices (0,1) unconditionally.
/// 3. If that yields a centered stick but axes are present, scan consecutive
///    pairs (0,1), (2,3), … and take the first showing input. This recovers
///    devices whose active axes sit at unconventional offsets.
pub fn extract_thumbstick(axes: &[f32]) -> ThumbstickVector {
    let n = axes.len();
    let mut x = 0.0f32;
    let mut y = 0.0f32;

    if n >= 4 {
        for &(ix, iy) in PREFERRED_PAIRS.iter() {
            if axis(axes, ix).abs() > AXIS_NOISE_FLOOR || axis(axes, iy).abs() > AXIS_NOISE_FLOOR {
                x = axis(axes, ix);
                y = axis(axes, iy);
                break;
            }
        }
    } else if n >= 2 {
        x = axis(axes, 0);
        y = axis(axes, 1);
    }

    if x == 0.0 && y == 0.0 && n > 0 {
        let mut i = 0;
        while i < n {
            if axis(axes, i).abs() > AXIS_NOISE_FLOOR || axis(axes, i + 1).abs() > AXIS_NOISE_FLOOR
            {
                x = axis(axes, i);
                y = axis(axes, i + 1);
                break;
            }
            i += 2;
        }
    }

    ThumbstickVector {
        x: round3(x),
        y: round3(y),
    }
}
