//! Translation of winit events into engine input events.

use oer_core::input::{InputEvent, Key, KeyEvent, MouseBtn};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

pub fn map_key(key_code: KeyCode) -> Option<Key> {
    match key_code {
        KeyCode::ArrowLeft => Some(Key::Left),
        KeyCode::ArrowRight => Some(Key::Right),
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::Space => Some(Key::Space),
        KeyCode::Equal | KeyCode::NumpadAdd => Some(Key::Plus),
        KeyCode::Minus | KeyCode::NumpadSubtract => Some(Key::Minus),
        KeyCode::PageUp => Some(Key::PageUp),
        KeyCode::PageDown => Some(Key::PageDown),
        KeyCode::KeyW => Some(Key::W),
        KeyCode::KeyA => Some(Key::A),
        KeyCode::KeyS => Some(Key::S),
        KeyCode::KeyD => Some(Key::D),
        KeyCode::KeyC => Some(Key::C),
        KeyCode::KeyR => Some(Key::R),
        _ => None,
    }
}

pub fn map_mouse_button(button: MouseButton) -> Option<MouseBtn> {
    match button {
        MouseButton::Left => Some(MouseBtn::Left),
        MouseButton::Right => Some(MouseBtn::Right),
        MouseButton::Middle => Some(MouseBtn::Middle),
        _ => None,
    }
}

/// Input carried by a window event, if any. Key auto-repeat is dropped so
/// listeners see one down and one up per physical press.
pub fn translate_window_event(event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::KeyboardInput { event, .. } if !event.repeat => {
            let PhysicalKey::Code(code) = event.physical_key else {
                return None;
            };
            map_key(code).map(|key| {
                InputEvent::Key(KeyEvent {
                    key,
                    pressed: event.state == ElementState::Pressed,
                })
            })
        }
        WindowEvent::MouseInput { state, button, .. } => {
            map_mouse_button(*button).map(|button| InputEvent::MouseButton {
                button,
                pressed: *state == ElementState::Pressed,
            })
        }
        _ => None,
    }
}

pub fn translate_mouse_motion(delta: (f64, f64)) -> InputEvent {
    InputEvent::MouseMoved {
        dx: delta.0,
        dy: delta.1,
    }
}
