pub mod gamepad;
pub mod keymap;
pub mod window;

pub use window::{Frame, FrameConfig};
