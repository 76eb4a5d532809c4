use std::cell::RefCell;
use std::rc::Rc;

use oer_platform::Frame;

use crate::camera::Frustum;

/// Rectangle of the frame a view draws into, with the volume it sees.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    viewing_volume: Option<Rc<RefCell<Frustum>>>,
}

impl Viewport {
    /// Viewport covering the whole frame.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            x: 0,
            y: 0,
            width: frame.width(),
            height: frame.height(),
            viewing_volume: None,
        }
    }

    pub fn set_viewing_volume(&mut self, frustum: Rc<RefCell<Frustum>>) {
        self.viewing_volume = Some(frustum);
    }

    pub fn viewing_volume(&self) -> Option<&Rc<RefCell<Frustum>>> {
        self.viewing_volume.as_ref()
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
