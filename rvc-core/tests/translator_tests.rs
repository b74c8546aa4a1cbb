use critical_section as _;
use rvc_core::utils::controllers::translator::{
    translate, ButtonState, CommandTranslator, ControllerSnapshot, DriveCommand, DriveLabel,
    ESTOP_BUTTONS,
};
use rvc_core::utils::controllers::SystemCommand;
use rvc_core::utils::math::stick::extract_thumbstick;

/// Build a snapshot from raw axis values, with no buttons.
pub fn snapshot(axes: &[f32]) -> ControllerSnapshot {
    ControllerSnapshot {
        axes: axes.to_vec(),
        buttons: Vec::new(),
    }
}

/// Build a snapshot whose button at `index` is pressed.
pub fn snapshot_with_button(
    axes: &[f32],
    index: usize,
) -> ControllerSnapshot {
    let mut buttons = vec![ButtonState::default(); index + 1];
    buttons[index] = ButtonState { pressed: true };
    ControllerSnapshot {
        axes: axes.to_vec(),
        buttons,
    }
}

fn assert_groups(
    command: &DriveCommand,
    label: DriveLabel,
    group1: i8,
    group2: i8,
) {
    assert_eq!(command.label, label);
    assert_eq!(command.group1, group1);
    assert_eq!(command.group2, group2);
}

#[test]
fn forward_on_dominant_y_upper_pair() {
    // Four-axis device carrying its thumbstick on indices (2,3).
    let command = translate(&snapshot(&[]), &snapshot(&[0.0, 0.0, 0.0, -0.8]));
    assert_groups(&command, DriveLabel::Forward, 1, 1);
}

#[test]
fn right_on_dominant_x_two_axis_device() {
    let command = translate(&snapshot(&[]), &snapshot(&[0.5, 0.0]));
    assert_groups(&command, DriveLabel::Right, -1, 1);
}

#[test]
fn backward_and_left() {
    let command = translate(&snapshot(&[]), &snapshot(&[0.0, 0.0, 0.0, 0.9]));
    assert_groups(&command, DriveLabel::Backward, -1, -1);
    let command = translate(&snapshot(&[]), &snapshot(&[-0.7, 0.1]));
    assert_groups(&command, DriveLabel::Left, 1, -1);
}

#[test]
fn rotation_overrides_stop_default() {
    let command = translate(&snapshot(&[-0.9, 0.0, 0.0, 0.0]), &snapshot(&[]));
    assert_groups(&command, DriveLabel::RotateLeft, -1, 1);
}

#[test]
fn rotation_overrides_translation() {
    // Qualifying translation on the right stick loses to left-stick rotation.
    let left = snapshot(&[0.0, 0.0, 0.8, 0.0]);
    let right = snapshot(&[0.0, 0.0, 0.0, -0.9]);
    let command = translate(&left, &right);
    assert_groups(&command, DriveLabel::RotateRight, 1, -1);

    let left = snapshot(&[-0.6, 0.0]);
    let command = translate(&left, &right);
    assert_groups(&command, DriveLabel::RotateLeft, -1, 1);
}

#[test]
fn emergency_overrides_everything() {
    let right = snapshot(&[0.0, 0.0, 0.0, -0.9]);
    for &index in ESTOP_BUTTONS.iter() {
        let left = snapshot_with_button(&[-0.9, 0.0], index);
        let command = translate(&left, &right);
        assert_groups(&command, DriveLabel::EmergencyStop, 0, 0);

        // Same button on the other hand.
        let right_pressed = snapshot_with_button(&[0.0, 0.0, 0.0, -0.9], index);
        let command = translate(&snapshot(&[]), &right_pressed);
        assert_groups(&command, DriveLabel::EmergencyStop, 0, 0);
    }
}

#[test]
fn non_candidate_buttons_are_ignored() {
    let left = snapshot_with_button(&[], 3);
    let command = translate(&left, &snapshot(&[0.5, 0.0]));
    assert_groups(&command, DriveLabel::Right, -1, 1);
}

#[test]
fn deadzone_boundary_is_strict() {
    let command = translate(&snapshot(&[]), &snapshot(&[0.2, 0.0]));
    assert_groups(&command, DriveLabel::Stop, 0, 0);

    let command = translate(&snapshot(&[]), &snapshot(&[0.201, 0.0]));
    assert_groups(&command, DriveLabel::Right, -1, 1);

    // Rotation uses the same strict boundary.
    let command = translate(&snapshot(&[0.2, 0.0]), &snapshot(&[]));
    assert_groups(&command, DriveLabel::Stop, 0, 0);
    let command = translate(&snapshot(&[0.201, 0.0]), &snapshot(&[]));
    assert_groups(&command, DriveLabel::RotateRight, 1, -1);
}

#[test]
fn below_deadzone_input_stops() {
    let command = translate(&snapshot(&[]), &snapshot(&[0.1, 0.1]));
    assert_groups(&command, DriveLabel::Stop, 0, 0);
}

#[test]
fn empty_input_degrades_to_stop() {
    let command = translate(&snapshot(&[]), &snapshot(&[]));
    assert_groups(&command, DriveLabel::Stop, 0, 0);
}

#[test]
fn total_over_axis_and_button_lengths() {
    for axis_len in 0..=6 {
        for button_len in 0..=8 {
            let axes: Vec<f32> = (0..axis_len).map(|i| (i as f32) * 0.1).collect();
            let buttons = vec![ButtonState::default(); button_len];
            let left = ControllerSnapshot {
                axes: axes.clone(),
                buttons: buttons.clone(),
            };
            let right = ControllerSnapshot { axes, buttons };
            let command = translate(&left, &right);
            assert_eq!(command.motors.motor1, command.group1);
            assert_eq!(command.motors.motor2, command.group2);
        }
    }
}

#[test]
fn fan_out_invariant() {
    let cases = [
        (snapshot(&[]), snapshot(&[0.0, -0.9])),
        (snapshot(&[0.9, 0.0]), snapshot(&[])),
        (snapshot_with_button(&[], 0), snapshot(&[])),
        (snapshot(&[]), snapshot(&[0.6, 0.1])),
    ];
    for (left, right) in cases.iter() {
        let command = translate(left, right);
        assert_eq!(command.motors.motor1, command.group1);
        assert_eq!(command.motors.motor3, command.group1);
        assert_eq!(command.motors.motor5, command.group1);
        assert_eq!(command.motors.motor2, command.group2);
        assert_eq!(command.motors.motor4, command.group2);
        assert_eq!(command.motors.motor6, command.group2);
    }
}

#[test]
fn translate_is_idempotent() {
    let left = snapshot(&[-0.4, 0.0, 0.3, 0.0]);
    let right = snapshot(&[0.0, 0.0, 0.7, 0.7]);
    assert_eq!(translate(&left, &right), translate(&left, &right));
}

#[test]
fn stop_label_iff_groups_zero() {
    let sticks: [&[f32]; 5] = [&[], &[0.1, 0.1], &[0.9, 0.0], &[0.0, 0.9], &[0.0, 0.0, -0.8, 0.3]];
    for left in sticks.iter() {
        for right in sticks.iter() {
            let command = translate(&snapshot(left), &snapshot(right));
            let zeroed = command.group1 == 0 && command.group2 == 0;
            match command.label {
                DriveLabel::Stop | DriveLabel::EmergencyStop => assert!(zeroed),
                _ => assert!(!zeroed),
            }
        }
    }
}

#[test]
fn axis_offset_recovery_drives_translation() {
    // Active pair at an unconventional offset still produces a command.
    let right = snapshot(&[0.0, 0.0, 0.0, 0.0, 0.0, -0.8]);
    let stick = extract_thumbstick(&right.axes);
    assert_eq!(stick.y, -0.8);
    let command = translate(&snapshot(&[]), &right);
    assert_groups(&command, DriveLabel::Forward, 1, 1);
}

#[test]
fn translator_tracks_label_changes() {
    let mut translator = CommandTranslator::new();
    assert_eq!(translator.last_label(), None);

    translator.process(&snapshot(&[]), &snapshot(&[0.5, 0.0]));
    assert_eq!(translator.last_label(), Some(DriveLabel::Right));

    translator.process(&snapshot(&[]), &snapshot(&[]));
    assert_eq!(translator.last_label(), Some(DriveLabel::Stop));

    translator.emergency_stop();
    assert_eq!(translator.last_label(), Some(DriveLabel::EmergencyStop));

    // Emergency stop is not latched: the next tick resumes translation.
    let command = translator.process(&snapshot(&[]), &snapshot(&[0.0, 0.0, 0.0, -0.9]));
    assert_eq!(command.label, DriveLabel::Forward);
}

#[test]
fn input_tick_decodes_with_sparse_entries() {
    let raw = r#"{"ct":"input","l":{"axes":[null,0.5],"buttons":[null,{"pressed":true}]},"r":{}}"#;
    let command: SystemCommand = serde_json::from_str(raw).unwrap();
    match command {
        SystemCommand::Input { l, r } => {
            assert_eq!(l.axes, vec![0.0, 0.5]);
            assert!(!l.buttons[0].pressed);
            assert!(l.buttons[1].pressed);
            assert!(r.axes.is_empty());
            assert!(r.buttons.is_empty());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn estop_message_decodes() {
    let command: SystemCommand = serde_json::from_str(r#"{"ct":"estop"}"#).unwrap();
    assert!(matches!(command, SystemCommand::Estop));
}

#[test]
fn sparse_button_tick_triggers_emergency() {
    // Scenario from the operator client: second button pressed, axes live.
    let raw = r#"{"ct":"input","l":{"buttons":[{"pressed":false},{"pressed":true}]},"r":{"axes":[0.9,0.0]}}"#;
    let command: SystemCommand = serde_json::from_str(raw).unwrap();
    let SystemCommand::Input { l, r } = command else {
        panic!("expected input tick");
    };
    let command = translate(&l, &r);
    assert_groups(&command, DriveLabel::EmergencyStop, 0, 0);
}
