//! Command recording and synchronization state

pub mod commands;
pub mod sync;

pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use sync::{Fence, FrameSync, Semaphore};
