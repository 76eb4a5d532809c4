pub mod engine;
pub mod geometry;
pub mod input;
pub mod partition;
pub mod resources;
pub mod scene;
pub mod serialization;
pub mod time;
pub mod vertex;

pub use engine::{Engine, EngineHandle, Module, ModuleRef, ProcessArg, Subscriptions};
pub use geometry::{Aabb, Face, Plane};
pub use scene::{NodeKind, SceneNode, SceneRef, Transform};
