//! Vulkan backend implementation
//!
//! Organized leaf-first: memory matching, initialization, resources,
//! presentation, rendering state, then the frame loop and the context that
//! ties them together.

/// Error types and the result-code table
pub mod error;

/// Memory bank matching and device allocations
pub mod memory;

/// Instance, adapter, surface and device setup
pub mod initialization;

/// Buffers, images, textures and descriptors
pub mod resources;

/// Swapchain, depth attachment and framebuffers
pub mod presentation;

/// Shaders, render pass and pipeline
pub mod rendering;

/// Command pools and synchronization primitives
pub mod state;

/// Per-frame acquire/record/submit/present
pub mod frame;

/// Render context and typed init stages
pub mod context;

pub use context::{DeviceStage, InstanceStage, PresentationStage, RenderContext, ResourceStage};
pub use error::{describe_result, report, report_err, ResultKind, VulkanError, VulkanResult};
pub use frame::{DrawCall, FrameOutcome, FrameRenderer, FrameState, FrameStateMachine};
pub use initialization::{AdapterInfo, DeviceContext, QueueFamilySelection};
pub use memory::{MemoryAllocator, MemoryBankFlags};
pub use presentation::PresentationSurface;
pub use rendering::PipelineBuilder;
