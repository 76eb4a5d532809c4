//! Cooperative single-threaded engine loop.
//!
//! Modules are delivered initialize / process / deinitialize in the order
//! they were attached to the [`Subscriptions`] list handed to the engine.
//! Stopping goes through an [`EngineHandle`] that any module may hold.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::time::Timer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessArg {
    /// Wall time since the previous process event.
    pub elapsed: Duration,
    pub frame: u64,
}

pub trait Module {
    fn initialize(&mut self) {}
    fn process(&mut self, _arg: &ProcessArg) {}
    fn deinitialize(&mut self) {}
}

pub type ModuleRef = Rc<RefCell<dyn Module>>;

/// Per-event listener lists. Attach order is delivery order.
#[derive(Default)]
pub struct Subscriptions {
    initialize: Vec<ModuleRef>,
    process: Vec<ModuleRef>,
    deinitialize: Vec<ModuleRef>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_initialize(&mut self, module: ModuleRef) {
        self.initialize.push(module);
    }

    pub fn attach_process(&mut self, module: ModuleRef) {
        self.process.push(module);
    }

    pub fn attach_deinitialize(&mut self, module: ModuleRef) {
        self.deinitialize.push(module);
    }

    /// Attaches the module to all three events.
    pub fn attach(&mut self, module: ModuleRef) {
        self.initialize.push(module.clone());
        self.process.push(module.clone());
        self.deinitialize.push(module);
    }

    pub fn process_len(&self) -> usize {
        self.process.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initialize.is_empty() && self.process.is_empty() && self.deinitialize.is_empty()
    }
}

/// Shared stop switch for the engine loop.
#[derive(Debug, Clone, Default)]
pub struct EngineHandle {
    stop_requested: Rc<Cell<bool>>,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stop_requested.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_requested.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Running,
    Stopped,
}

pub struct Engine {
    handle: EngineHandle,
    subscriptions: Subscriptions,
    timer: Timer,
    frame: u64,
    state: EngineState,
}

impl Engine {
    pub fn new(handle: EngineHandle, subscriptions: Subscriptions) -> Self {
        Self {
            handle,
            subscriptions,
            timer: Timer::new(),
            frame: 0,
            state: EngineState::Created,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn initialize(&mut self) {
        if self.state != EngineState::Created {
            return;
        }
        log::debug!(
            "Initializing {} modules",
            self.subscriptions.initialize.len()
        );
        for module in &self.subscriptions.initialize {
            module.borrow_mut().initialize();
        }
        self.timer.start();
        self.state = EngineState::Running;
    }

    /// Runs one loop iteration with wall-clock elapsed time.
    /// Returns false once a stop has been requested.
    pub fn tick(&mut self) -> bool {
        let elapsed = self.timer.elapsed_and_reset();
        self.tick_with(elapsed)
    }

    /// Runs one loop iteration with an explicit elapsed time.
    pub fn tick_with(&mut self, elapsed: Duration) -> bool {
        if self.state != EngineState::Running || self.handle.is_stopped() {
            return false;
        }
        let arg = ProcessArg {
            elapsed,
            frame: self.frame,
        };
        for module in &self.subscriptions.process {
            module.borrow_mut().process(&arg);
        }
        self.frame += 1;
        true
    }

    pub fn deinitialize(&mut self) {
        if self.state != EngineState::Running {
            return;
        }
        for module in &self.subscriptions.deinitialize {
            module.borrow_mut().deinitialize();
        }
        self.state = EngineState::Stopped;
        log::info!("Engine stopped after {} frames", self.frame);
    }

    /// Initialize, loop until stopped, deinitialize.
    pub fn start(&mut self) {
        self.initialize();
        while self.tick() {}
        self.deinitialize();
    }
}
