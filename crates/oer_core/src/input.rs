//! Input events, listeners and the queued input device.
//!
//! The platform layer pushes [`InputEvent`]s as they arrive. The device's
//! process step drains the queue in FIFO order: it first updates the shared
//! [`DeviceState`] (level-triggered held keys and buttons, mouse motion), then
//! forwards the event to listeners in attach order.
//!
//! [`DeviceState`] lives behind its own handle so a listener may read it
//! while the device is dispatching.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use crate::engine::{Module, ProcessArg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Escape,
    Space,
    Plus,
    Minus,
    PageUp,
    PageDown,
    W,
    A,
    S,
    D,
    C,
    R,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseBtn {
    Left,
    Right,
    Middle,
}

pub const JOYSTICK_AXES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub pressed: bool,
}

/// Raw joystick axis positions in `[-32768, 32767]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoystickAxisEvent {
    pub axes: [i16; JOYSTICK_AXES],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickButtonEvent {
    pub button: u8,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    MouseMoved { dx: f64, dy: f64 },
    MouseButton { button: MouseBtn, pressed: bool },
    JoystickAxis(JoystickAxisEvent),
    JoystickButton(JoystickButtonEvent),
}

pub trait InputListener {
    fn on_key(&mut self, _event: &KeyEvent) {}
    fn on_joystick_axis(&mut self, _event: &JoystickAxisEvent) {}
    fn on_joystick_button(&mut self, _event: &JoystickButtonEvent) {}
}

pub type ListenerRef = Rc<RefCell<dyn InputListener>>;

/// Level-triggered device state, updated as queued events are drained.
#[derive(Debug, Default)]
pub struct DeviceState {
    held: HashSet<Key>,
    mouse_held: HashSet<MouseBtn>,
    pub mouse_delta: (f64, f64),
    pub axes: [i16; JOYSTICK_AXES],
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::Key(KeyEvent { key, pressed }) => {
                if pressed {
                    self.held.insert(key);
                } else {
                    self.held.remove(&key);
                }
            }
            InputEvent::MouseMoved { dx, dy } => {
                self.mouse_delta.0 += dx;
                self.mouse_delta.1 += dy;
            }
            InputEvent::MouseButton { button, pressed } => {
                if pressed {
                    self.mouse_held.insert(button);
                } else {
                    self.mouse_held.remove(&button);
                }
            }
            InputEvent::JoystickAxis(axis) => self.axes = axis.axes,
            InputEvent::JoystickButton(_) => {}
        }
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn is_mouse_held(&self, button: MouseBtn) -> bool {
        self.mouse_held.contains(&button)
    }

    /// Clears per-frame accumulators. Held state persists.
    pub fn end_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
    }
}

/// Combined keyboard, mouse and joystick device.
#[derive(Default)]
pub struct InputDevice {
    queue: VecDeque<InputEvent>,
    state: Rc<RefCell<DeviceState>>,
    key_listeners: Vec<ListenerRef>,
    joystick_listeners: Vec<ListenerRef>,
}

impl InputDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Rc<RefCell<DeviceState>> {
        self.state.clone()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.queue.push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn attach_key_listener(&mut self, listener: ListenerRef) {
        self.key_listeners.push(listener);
    }

    pub fn attach_joystick_listener(&mut self, listener: ListenerRef) {
        self.joystick_listeners.push(listener);
    }

    pub fn key_listener_count(&self) -> usize {
        self.key_listeners.len()
    }

    /// Drains the queue in arrival order. Returns the number of events handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.queue.pop_front() {
            self.state.borrow_mut().apply(&event);
            match &event {
                InputEvent::Key(key) => {
                    for listener in &self.key_listeners {
                        listener.borrow_mut().on_key(key);
                    }
                }
                InputEvent::JoystickAxis(axis) => {
                    for listener in &self.joystick_listeners {
                        listener.borrow_mut().on_joystick_axis(axis);
                    }
                }
                InputEvent::JoystickButton(button) => {
                    for listener in &self.joystick_listeners {
                        listener.borrow_mut().on_joystick_button(button);
                    }
                }
                InputEvent::MouseMoved { .. } | InputEvent::MouseButton { .. } => {}
            }
            handled += 1;
        }
        handled
    }
}

impl Module for InputDevice {
    fn process(&mut self, _arg: &ProcessArg) {
        self.state.borrow_mut().end_frame();
        self.dispatch_pending();
    }

    fn deinitialize(&mut self) {
        if !self.queue.is_empty() {
            log::debug!("Dropping {} unhandled input events", self.queue.len());
            self.queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    impl InputListener for Recorder {
        fn on_key(&mut self, event: &KeyEvent) {
            self.seen.push(format!("{:?}:{}", event.key, event.pressed));
        }

        fn on_joystick_button(&mut self, event: &JoystickButtonEvent) {
            self.seen.push(format!("button{}", event.button));
        }
    }

    fn key(key: Key, pressed: bool) -> InputEvent {
        InputEvent::Key(KeyEvent { key, pressed })
    }

    #[test]
    fn events_are_delivered_in_arrival_order() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut device = InputDevice::new();
        device.attach_key_listener(recorder.clone());
        device.attach_joystick_listener(recorder.clone());

        device.push(key(Key::Up, true));
        device.push(InputEvent::JoystickButton(JoystickButtonEvent {
            button: 4,
            pressed: true,
        }));
        device.push(key(Key::Up, false));

        assert_eq!(device.dispatch_pending(), 3);
        assert_eq!(
            recorder.borrow().seen,
            vec!["Up:true", "button4", "Up:false"]
        );
        assert_eq!(device.pending(), 0);
    }

    #[test]
    fn listeners_see_attach_order() {
        struct Tagged(&'static str, Rc<RefCell<Vec<&'static str>>>);
        impl InputListener for Tagged {
            fn on_key(&mut self, _event: &KeyEvent) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut device = InputDevice::new();
        device.attach_key_listener(Rc::new(RefCell::new(Tagged("quit", log.clone()))));
        device.attach_key_listener(Rc::new(RefCell::new(Tagged("move", log.clone()))));
        device.attach_key_listener(Rc::new(RefCell::new(Tagged("vehicle", log.clone()))));
        device.push(key(Key::R, true));
        device.dispatch_pending();

        assert_eq!(*log.borrow(), vec!["quit", "move", "vehicle"]);
    }

    #[test]
    fn state_tracks_held_keys_and_mouse() {
        let mut device = InputDevice::new();
        let state = device.state();
        device.push(key(Key::W, true));
        device.push(InputEvent::MouseMoved { dx: 3.0, dy: -1.0 });
        device.push(InputEvent::MouseButton {
            button: MouseBtn::Left,
            pressed: true,
        });
        device.dispatch_pending();

        assert!(state.borrow().is_held(Key::W));
        assert!(state.borrow().is_mouse_held(MouseBtn::Left));
        assert_eq!(state.borrow().mouse_delta, (3.0, -1.0));

        device.push(key(Key::W, false));
        device.process(&ProcessArg {
            elapsed: std::time::Duration::ZERO,
            frame: 1,
        });
        assert!(!state.borrow().is_held(Key::W));
        assert_eq!(state.borrow().mouse_delta, (0.0, 0.0));
    }

    #[test]
    fn listener_may_read_state_during_dispatch() {
        struct Reader(Rc<RefCell<DeviceState>>, bool);
        impl InputListener for Reader {
            fn on_key(&mut self, event: &KeyEvent) {
                self.1 = self.0.borrow().is_held(event.key);
            }
        }

        let mut device = InputDevice::new();
        let reader = Rc::new(RefCell::new(Reader(device.state(), false)));
        device.attach_key_listener(reader.clone());
        device.push(key(Key::A, true));
        device.dispatch_pending();
        assert!(reader.borrow().1);
    }

    #[test]
    fn axis_event_updates_state() {
        let mut device = InputDevice::new();
        device.push(InputEvent::JoystickAxis(JoystickAxisEvent {
            axes: [100, -200, 0, 0],
        }));
        device.dispatch_pending();
        assert_eq!(device.state().borrow().axes, [100, -200, 0, 0]);
    }
}
