pub mod camera;
pub mod renderer;
pub mod view;
pub mod viewport;

pub use camera::{FollowCamera, Frustum, ViewingVolume};
pub use renderer::{DisplayListBuilder, RenderTask, Renderer, TextureLoader};
pub use view::{AccelerationClipper, Clipper, DrawCommand, DrawList, Rasterizer, RenderingView, SceneRasterizer};
pub use viewport::Viewport;
