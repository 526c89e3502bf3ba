//! # Cube Renderer
//!
//! A double-buffered Vulkan renderer for a lit, textured, spinning cube, with
//! every step spelled out: adapter and queue selection, first-fit memory bank
//! matching, host-visible buffers, a staged texture upload with explicit
//! layout barriers, a two-image swapchain and a per-frame
//! acquire/record/submit/wait/present loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cube_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::default();
//!     let window = Window::new(&config.application_name, config.width, config.height)?;
//!     let mut scene = SceneState::new(SceneConfig::default(), config.aspect_ratio());
//!     let mut context = RenderContext::new(config, &window, &scene)?;
//!
//!     let clock = FrameClock::new();
//!     while !window.should_close() {
//!         scene.update(clock.elapsed_seconds());
//!         context.render_frame(&scene)?;
//!     }
//!     context.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, FrameMode, RendererConfig, SceneConfig},
        foundation::time::FrameClock,
        render::{RenderContext, VulkanError, VulkanResult, Window, WindowError},
        scene::{MouseButtons, MouseTracker, SceneAction, SceneState},
    };
}
