use std::sync::Arc;

use oer_core::engine::{Module, ProcessArg};
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Requested color depth in bits.
    pub depth: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            title: "OERacer".to_string(),
            width: 800,
            height: 600,
            depth: 32,
        }
    }
}

impl FrameConfig {
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

pub fn create_window(event_loop: &ActiveEventLoop, config: &FrameConfig) -> Result<Arc<Window>, String> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

    let window = event_loop
        .create_window(attrs)
        .map_err(|e| format!("Failed to create window: {e}"))?;
    Ok(Arc::new(window))
}

/// Output surface. The window itself only exists once the event loop has
/// resumed; before that the frame is headless and only carries its size.
pub struct Frame {
    config: FrameConfig,
    window: Option<Arc<Window>>,
    presented: u64,
}

impl Frame {
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            window: None,
            presented: 0,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn attach_window(&mut self, window: Arc<Window>) {
        self.window = Some(window);
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            log::info!("Resized to {}x{}", width, height);
        }
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Module for Frame {
    fn initialize(&mut self) {
        log::info!(
            "Frame {}x{}x{}",
            self.config.width,
            self.config.height,
            self.config.depth
        );
    }

    fn process(&mut self, _arg: &ProcessArg) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
        self.presented += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_frame_is_800_by_600_by_32() {
        let config = FrameConfig::default();
        assert_eq!((config.width, config.height, config.depth), (800, 600, 32));
        assert!((config.aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn headless_frame_counts_presents_and_ignores_empty_resize() {
        let mut frame = Frame::new(FrameConfig::default());
        frame.process(&ProcessArg {
            elapsed: Duration::ZERO,
            frame: 0,
        });
        frame.resize(0, 300);
        assert_eq!(frame.presented(), 1);
        assert_eq!(frame.width(), 800);
        frame.resize(1024, 768);
        assert_eq!((frame.width(), frame.height()), (1024, 768));
    }
}
