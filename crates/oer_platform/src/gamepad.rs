//! Gamepad polling through gilrs, reported as joystick input events.

use gilrs::{Axis, Button, EventType, Gilrs};
use oer_core::input::{InputEvent, JoystickAxisEvent, JoystickButtonEvent, JOYSTICK_AXES};

pub struct GamepadPoller {
    gilrs: Gilrs,
    axes: [i16; JOYSTICK_AXES],
}

impl GamepadPoller {
    pub fn new() -> Result<Self, String> {
        let gilrs = Gilrs::new().map_err(|e| format!("Gamepad support unavailable: {e}"))?;
        for (_, pad) in gilrs.gamepads() {
            log::info!("Gamepad found: {}", pad.name());
        }
        Ok(Self {
            gilrs,
            axes: [0; JOYSTICK_AXES],
        })
    }

    /// Drains pending gamepad events. Every axis change reports the full
    /// axis state.
    pub fn poll(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        while let Some(gilrs::Event { event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::AxisChanged(axis, value, _) => {
                    events.extend(axis_event(&mut self.axes, axis, value));
                }
                EventType::ButtonPressed(button, _) => events.extend(button_event(button, true)),
                EventType::ButtonReleased(button, _) => events.extend(button_event(button, false)),
                EventType::Connected => log::info!("Gamepad connected"),
                EventType::Disconnected => {
                    log::info!("Gamepad disconnected");
                    self.axes = [0; JOYSTICK_AXES];
                    events.push(InputEvent::JoystickAxis(JoystickAxisEvent { axes: self.axes }));
                }
                _ => {}
            }
        }
        events
    }
}

/// Slot of a stick axis: left stick is 0/1, right stick 2/3.
pub fn axis_index(axis: Axis) -> Option<usize> {
    match axis {
        Axis::LeftStickX => Some(0),
        Axis::LeftStickY => Some(1),
        Axis::RightStickX => Some(2),
        Axis::RightStickY => Some(3),
        _ => None,
    }
}

/// Raw axis position. Vertical axes are flipped so pushing a stick up reads
/// negative.
pub fn axis_value(axis: Axis, value: f32) -> i16 {
    let value = match axis {
        Axis::LeftStickY | Axis::RightStickY => -value,
        _ => value,
    };
    (value.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

pub fn axis_event(axes: &mut [i16; JOYSTICK_AXES], axis: Axis, value: f32) -> Option<InputEvent> {
    let index = axis_index(axis)?;
    axes[index] = axis_value(axis, value);
    Some(InputEvent::JoystickAxis(JoystickAxisEvent { axes: *axes }))
}

/// Button number in the usual pad layout: face buttons 0-3, shoulders 4/5,
/// select 6, triggers 7/8, start 9, mode 10, thumbs 11/12, d-pad 13-16.
pub fn button_number(button: Button) -> Option<u8> {
    let number = match button {
        Button::South => 0,
        Button::East => 1,
        Button::West => 2,
        Button::North => 3,
        Button::LeftTrigger => 4,
        Button::RightTrigger => 5,
        Button::Select => 6,
        Button::LeftTrigger2 => 7,
        Button::RightTrigger2 => 8,
        Button::Start => 9,
        Button::Mode => 10,
        Button::LeftThumb => 11,
        Button::RightThumb => 12,
        Button::DPadUp => 13,
        Button::DPadDown => 14,
        Button::DPadLeft => 15,
        Button::DPadRight => 16,
        _ => return None,
    };
    Some(number)
}

pub fn button_event(button: Button, pressed: bool) -> Option<InputEvent> {
    let button = button_number(button)?;
    Some(InputEvent::JoystickButton(JoystickButtonEvent { button, pressed }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stick_up_reads_negative_on_axis_one() {
        let mut axes = [0; JOYSTICK_AXES];
        let event = axis_event(&mut axes, Axis::LeftStickY, 1.0);
        assert_eq!(
            event,
            Some(InputEvent::JoystickAxis(JoystickAxisEvent {
                axes: [0, -i16::MAX, 0, 0]
            }))
        );
        assert_eq!(axis_value(Axis::LeftStickX, -1.0), -i16::MAX);
        assert_eq!(axis_value(Axis::LeftStickX, 3.0), i16::MAX);
    }

    #[test]
    fn axis_state_accumulates_across_events() {
        let mut axes = [0; JOYSTICK_AXES];
        axis_event(&mut axes, Axis::LeftStickX, 0.5);
        let event = axis_event(&mut axes, Axis::RightStickX, -0.5);
        match event {
            Some(InputEvent::JoystickAxis(JoystickAxisEvent { axes })) => {
                assert_eq!(axes[0], 16384);
                assert_eq!(axes[1], 0);
                assert_eq!(axes[2], -16384);
            }
            other => panic!("expected axis event, got {other:?}"),
        }
    }

    #[test]
    fn unmapped_axis_changes_nothing() {
        let mut axes = [7; JOYSTICK_AXES];
        assert_eq!(axis_event(&mut axes, Axis::LeftZ, 1.0), None);
        assert_eq!(axis_event(&mut axes, Axis::DPadX, -1.0), None);
        assert_eq!(axes, [7; JOYSTICK_AXES]);
    }

    #[test]
    fn vehicle_buttons_have_stable_numbers() {
        assert_eq!(button_number(Button::West), Some(2));
        assert_eq!(button_number(Button::LeftTrigger), Some(4));
        assert_eq!(button_number(Button::Mode), Some(10));
        assert_eq!(button_number(Button::LeftTrigger2), Some(7));
        assert_eq!(button_number(Button::RightTrigger2), Some(8));
        assert_eq!(button_number(Button::C), None);
        assert_eq!(
            button_event(Button::South, false),
            Some(InputEvent::JoystickButton(JoystickButtonEvent {
                button: 0,
                pressed: false
            }))
        );
    }
}
