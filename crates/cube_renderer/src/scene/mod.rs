//! Scene side of the sample: uniform blocks, cube geometry, the animation
//! update and the keyboard/mouse toggles that drive it.

pub mod geometry;
pub mod input;
pub mod state;
pub mod uniforms;

pub use geometry::{cube_indexed, cube_vertices, Vertex};
pub use input::{MouseButtons, MouseTracker, SceneAction};
pub use state::SceneState;
pub use uniforms::{LightBlock, MatrixBlock, MiscBlock};
