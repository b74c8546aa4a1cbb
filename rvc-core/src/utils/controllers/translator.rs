//! Controller-to-drive translation for the rover control server.
//!
//! `translate` converts one sampled snapshot per hand into a discrete
//! `DriveCommand` for the six-motor differential drive. It is total over its
//! input domain: missing axes and buttons read as centered / not pressed, and
//! every call yields a well-formed command.
//!
//! Priority, highest first: emergency stop, rotation (left stick), translation
//! (right stick), stop by default.

use alloc::vec::Vec;

use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::math::stick::extract_thumbstick;

/// Minimum stick magnitude treated as intentional input (strict comparison).
pub const DEADZONE: f32 = 0.2;

/// Button indices checked for emergency stop on either hand, covering the
/// trigger and grip bindings of the common device families.
pub const ESTOP_BUTTONS: [usize; 5] = [0, 1, 2, 6, 7];

/// State of a single controller button.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    #[serde(default)]
    pub pressed: bool,
}

/// One sampled reading of a hand controller's axes and buttons.
///
/// Operator clients send axis and button arrays of varying length and may
/// leave entries `null`; both deserialize to centered / not-pressed values so
/// translation never has to handle malformed input.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    #[serde(default, deserialize_with = "sparse_axes")]
    pub axes: Vec<f32>,
    #[serde(default, deserialize_with = "sparse_buttons")]
    pub buttons: Vec<ButtonState>,
}

impl ControllerSnapshot {
    /// Whether any emergency-stop candidate button is pressed.
    fn estop_pressed(&self) -> bool {
        ESTOP_BUTTONS
            .iter()
            .any(|&i| self.buttons.get(i).is_some_and(|b| b.pressed))
    }
}

fn sparse_axes<'de, D>(deserializer: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<f32>> = Deserialize::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

fn sparse_buttons<'de, D>(deserializer: D) -> Result<Vec<ButtonState>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<ButtonState>> = Deserialize::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|b| b.unwrap_or_default()).collect())
}

/// Discrete drive command labels, serialized in the vehicle's wire casing.
///
/// `EmergencyStop` is physically identical to `Stop` (all motors off) but
/// kept distinguishable so downstream consumers can alert on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriveLabel {
    Stop,
    Forward,
    Backward,
    Left,
    Right,
    RotateLeft,
    RotateRight,
    EmergencyStop,
}

/// Fan-out of the two group intensities into the six motor slots.
///
/// Fixed wiring convention: odd motors (1,3,5) mirror group 1 (left side),
/// even motors (2,4,6) mirror group 2 (right side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorStates {
    pub motor1: i8,
    pub motor2: i8,
    pub motor3: i8,
    pub motor4: i8,
    pub motor5: i8,
    pub motor6: i8,
}

impl MotorStates {
    pub fn fan_out(
        group1: i8,
        group2: i8,
    ) -> Self {
        MotorStates {
            motor1: group1,
            motor2: group2,
            motor3: group1,
            motor4: group2,
            motor5: group1,
            motor6: group2,
        }
    }
}

/// The translator's output for one sampling tick.
///
/// `group1`/`group2` are the signed left/right motor-group intensities in
/// {-1, 0, 1}; `motors` is their six-slot fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveCommand {
    pub label: DriveLabel,
    pub group1: i8,
    pub group2: i8,
    pub motors: MotorStates,
}

impl DriveCommand {
    fn with_groups(
        label: DriveLabel,
        group1: i8,
        group2: i8,
    ) -> Self {
        DriveCommand {
            label,
            group1,
            group2,
            motors: MotorStates::fan_out(group1, group2),
        }
    }

    /// All motors off, normal stop.
    pub fn stop() -> Self {
        Self::with_groups(DriveLabel::Stop, 0, 0)
    }

    /// All motors off, flagged as an emergency event.
    pub fn emergency_stop() -> Self {
        Self::with_groups(DriveLabel::EmergencyStop, 0, 0)
    }
}

/// Translate one snapshot pair into a drive command.
///
/// Pure and total: identical snapshots always yield identical commands, and
/// no input shape can fail. The right stick selects translation, the left
/// stick's x axis overrides it with rotation in place, and any pressed
/// emergency button overrides everything.
pub fn translate(
    left: &ControllerSnapshot,
    right: &ControllerSnapshot,
) -> DriveCommand {
    let right_stick = extract_thumbstick(&right.axes);
    let left_stick = extract_thumbstick(&left.axes);

    let mut command = DriveCommand::stop();

    if right_stick.x.abs() > DEADZONE || right_stick.y.abs() > DEADZONE {
        if right_stick.y.abs() > right_stick.x.abs() {
            // Forward/backward: stick up reads negative on the y axis.
            if right_stick.y < -DEADZONE {
                command = DriveCommand::with_groups(DriveLabel::Forward, 1, 1);
            } else if right_stick.y > DEADZONE {
                command = DriveCommand::with_groups(DriveLabel::Backward, -1, -1);
            }
        } else if right_stick.x < -DEADZONE {
            command = DriveCommand::with_groups(DriveLabel::Left, 1, -1);
        } else if right_stick.x > DEADZONE {
            command = DriveCommand::with_groups(DriveLabel::Right, -1, 1);
        }
    }

    // Rotation replaces translation outright: a differential drive cannot
    // disambiguate blended intent under this control scheme.
    if left_stick.x.abs() > DEADZONE {
        if left_stick.x < -DEADZONE {
            command = DriveCommand::with_groups(DriveLabel::RotateLeft, -1, 1);
        } else {
            command = DriveCommand::with_groups(DriveLabel::RotateRight, 1, -1);
        }
    }

    if left.estop_pressed() || right.estop_pressed() {
        command = DriveCommand::emergency_stop();
    }

    command
}

/// Per-session translation state.
///
/// Holds only the last emitted label, used to log command transitions once
/// instead of on every tick. Created at session start, updated once per tick,
/// discarded at session end.
#[derive(Debug, Default)]
pub struct CommandTranslator {
    last_label: Option<DriveLabel>,
}

impl CommandTranslator {
    pub fn new() -> Self {
        CommandTranslator { last_label: None }
    }

    /// Translate one complete snapshot pair, logging on label change.
    pub fn process(
        &mut self,
        left: &ControllerSnapshot,
        right: &ControllerSnapshot,
    ) -> DriveCommand {
        let command = translate(left, right);
        self.note(command.label);
        command
    }

    /// Produce an emergency stop without sampling any axes, for manual or
    /// API-triggered stops.
    pub fn emergency_stop(&mut self) -> DriveCommand {
        let command = DriveCommand::emergency_stop();
        self.note(command.label);
        command
    }

    /// The label of the most recently emitted command, if any.
    pub fn last_label(&self) -> Option<DriveLabel> {
        self.last_label
    }

    fn note(
        &mut self,
        label: DriveLabel,
    ) {
        if self.last_label != Some(label) {
            tracing::info!(previous = ?self.last_label, current = ?label, "drive command changed");
            self.last_label = Some(label);
        }
    }
}
