mod bootstrap;
mod controller;
mod handlers;
mod model_list;
mod physics;
mod settings;

use std::cell::RefCell;
use std::error::Error;
use std::path::Path;
use std::rc::Rc;

use oer_core::engine::{Engine, EngineHandle};
use oer_core::input::InputDevice;
use oer_platform::gamepad::GamepadPoller;
use oer_platform::keymap::{translate_mouse_motion, translate_window_event};
use oer_platform::window::create_window;
use oer_platform::Frame;
use oer_render::Viewport;
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use bootstrap::{BootstrapConfig, Bootstrapper};
use settings::SETTINGS_FILE;

const USAGE: &[&str] = &[
    "========= Running The OERacer Project =========",
    "A small driving demo on a fixed time step rigid box.",
    "",
    "Vehicle controls:",
    "  drive forwards:  up-arrow",
    "  drive backwards: down-arrow",
    "  turn left:       left-arrow",
    "  turn right:      right-arrow",
    "  reset:           r",
    "  pause physics:   space",
    "  gravity:         page-up / page-down",
    "  time step:       hold + / -",
    "",
    "Gamepad controls:",
    "  drive and turn:  left stick",
    "  jump:            west face button",
    "  reset:           left shoulder or mode",
    "  gravity:         left / right trigger",
    "",
    "Camera controls:",
    "  move forwards:   w",
    "  move backwards:  s",
    "  move left:       a",
    "  move right:      d",
    "  rotate:          drag with right mouse button",
    "",
];

struct App {
    engine: Engine,
    frame: Rc<RefCell<Frame>>,
    viewport: Rc<RefCell<Viewport>>,
    input: Rc<RefCell<InputDevice>>,
    gamepad: Option<GamepadPoller>,
    // Keeps every scene handle alive for the lifetime of the loop.
    _config: BootstrapConfig,
}

impl App {
    fn new(mut config: BootstrapConfig, gamepad: Option<GamepadPoller>) -> Result<Self, String> {
        let frame = config.frame.clone().ok_or("display was not set up")?;
        let viewport = config.viewport.clone().ok_or("display was not set up")?;
        let input = config.input.clone().ok_or("devices were not set up")?;
        let subscriptions = std::mem::take(&mut config.subscriptions);
        let engine = Engine::new(config.engine.clone(), subscriptions);
        Ok(Self {
            engine,
            frame,
            viewport,
            input,
            gamepad,
            _config: config,
        })
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.engine.deinitialize();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.frame.borrow().window().is_some() {
            return;
        }
        let config = self.frame.borrow().config().clone();
        match create_window(event_loop, &config) {
            Ok(window) => {
                log::info!("Window created: {}x{}", config.width, config.height);
                self.frame.borrow_mut().attach_window(window);
                self.engine.initialize();
            }
            Err(err) => {
                log::error!("{err}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gamepad) = &mut self.gamepad {
            let mut input = self.input.borrow_mut();
            for event in gamepad.poll() {
                input.push(event);
            }
        }
        if let Some(window) = self.frame.borrow().window() {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(input) = translate_window_event(&event) {
            self.input.borrow_mut().push(input);
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting.");
                self.engine.handle().stop();
            }
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    self.frame.borrow_mut().resize(size.width, size.height);
                    let mut viewport = self.viewport.borrow_mut();
                    viewport.width = size.width;
                    viewport.height = size.height;
                    log::info!("Resized to {}x{}", size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if !self.engine.tick() {
                    self.shutdown(event_loop);
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.borrow_mut().push(translate_mouse_motion(delta));
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    for line in USAGE {
        log::info!("{line}");
    }

    let settings = settings::load_or_default(Path::new(SETTINGS_FILE));
    let mut bootstrapper = Bootstrapper::new(settings, EngineHandle::new());
    if let Err(err) = bootstrapper.run() {
        log::error!("{err}");
        return Err(err.into());
    }

    let gamepad = match GamepadPoller::new() {
        Ok(gamepad) => Some(gamepad),
        Err(err) => {
            log::warn!("{err}. Continuing without a gamepad.");
            None
        }
    };
    let mut app = App::new(bootstrapper.into_config(), gamepad)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut app)?;
    Ok(())
}
