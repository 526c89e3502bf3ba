//! Per-frame acquire, record, submit, wait and present.
//!
//! Two pacing modes share one recorder and one state machine:
//!
//! - [`FrameMode::Blocking`]: a transient semaphore and fence per frame. The
//!   submission waits on the acquire at BOTTOM_OF_PIPE and the host blocks on
//!   the fence before presenting, so the GPU never overlaps two frames and a
//!   single set of uniform buffers is enough.
//! - [`FrameMode::Pipelined`]: two slots, each with its own acquire semaphore
//!   and a fence created signaled. The host waits on the slot's fence before
//!   that slot's uniforms are rewritten. Each swapchain image has its own
//!   render-finished semaphore, which present waits on.
//!
//! An image that was acquired but never submitted is handed straight back to
//! the presentation engine, so a failed frame cannot starve the next acquire.

use ash::{vk, Device};

use crate::config::FrameMode;
use crate::foundation::logging::frame_level;
use crate::render::backends::vulkan::presentation::{PresentationSurface, IMAGE_COUNT};
use crate::render::backends::vulkan::rendering::GraphicsPipeline;
use crate::render::backends::vulkan::resources::{GpuBuffer, SET_COUNT};
use crate::render::backends::vulkan::state::{CommandPool, CommandRecorder, Fence, FrameSync, Semaphore};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Where a frame is in the acquire → present cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames
    Idle,
    /// Waiting for a swapchain image
    Acquiring,
    /// Recording the command buffer
    Recording,
    /// Submitted to the queue
    Submitted,
    /// Handed to the presentation engine
    Presenting,
}

impl FrameState {
    /// The only state this one may advance to
    pub fn successor(self) -> Self {
        match self {
            Self::Idle => Self::Acquiring,
            Self::Acquiring => Self::Recording,
            Self::Recording => Self::Submitted,
            Self::Submitted => Self::Presenting,
            Self::Presenting => Self::Idle,
        }
    }
}

/// Checked [`FrameState`] transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameStateMachine {
    state: FrameState,
    completed: u64,
}

impl Default for FrameStateMachine {
    fn default() -> Self {
        Self {
            state: FrameState::Idle,
            completed: 0,
        }
    }
}

impl FrameStateMachine {
    /// Current state
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Frames that made it back to `Idle`
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Move to `to`; anything but the successor of the current state is an error
    pub fn advance(&mut self, to: FrameState) -> VulkanResult<()> {
        if self.state.successor() != to {
            return Err(VulkanError::InvalidOperation {
                reason: format!("frame state {:?} cannot move to {:?}", self.state, to),
            });
        }
        if to == FrameState::Idle {
            self.completed += 1;
        }
        self.state = to;
        Ok(())
    }

    /// An image has been acquired and no submission has consumed the acquire
    /// semaphore yet; a frame failing now must release the image itself
    pub fn holds_unsubmitted_image(&self) -> bool {
        self.state == FrameState::Recording
    }

    /// Drop a frame that failed part way; returns the state it was abandoned in
    pub fn abandon(&mut self) -> FrameState {
        std::mem::replace(&mut self.state, FrameState::Idle)
    }
}

/// The single draw a frame issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    /// `draw(vertex_count, 1, 0, 0)` from the non-indexed vertex buffer
    Vertices {
        /// Vertices to draw
        vertex_count: u32,
    },
    /// `draw_indexed(index_count, 1, 0, 0, 0)` from the indexed vertex buffer and a u32 index buffer
    Indexed {
        /// Indices to draw
        index_count: u32,
    },
}

impl DrawCall {
    /// Pick the draw for the index-buffer toggle
    pub fn for_toggle(use_index_buffer: bool, vertex_count: u32, index_count: u32) -> Self {
        if use_index_buffer {
            Self::Indexed { index_count }
        } else {
            Self::Vertices { vertex_count }
        }
    }
}

/// The cube's vertex and index buffers
pub struct GeometryBuffers {
    /// 36 vertices drawn without indices
    pub vertices: GpuBuffer,
    /// 24 unique vertices addressed by `indices`
    pub indexed_vertices: GpuBuffer,
    /// 36 `u32` indices
    pub indices: GpuBuffer,
    /// Vertex count of `vertices`
    pub vertex_count: u32,
    /// Index count of `indices`
    pub index_count: u32,
}

impl GeometryBuffers {
    /// Draw call for the toggle state
    pub fn draw_call(&self, use_index_buffer: bool) -> DrawCall {
        DrawCall::for_toggle(use_index_buffer, self.vertex_count, self.index_count)
    }
}

/// Everything a frame binds, borrowed from the render context
pub struct FrameTargets<'a> {
    /// Swapchain, render pass and framebuffers
    pub presentation: &'a PresentationSurface,
    /// Pipeline and its layout
    pub pipeline: &'a GraphicsPipeline,
    /// Geometry
    pub geometry: &'a GeometryBuffers,
    /// Queue for submit and present
    pub queue: vk::Queue,
    /// Clear color for attachment 0
    pub clear_color: [f32; 4],
}

/// What a finished frame reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Swapchain image that was rendered
    pub image_index: usize,
    /// Frame-in-flight slot used
    pub slot: usize,
    /// Acquire or present reported a suboptimal swapchain
    pub suboptimal: bool,
}

/// Clear values for the color and depth/stencil attachments
pub fn clear_values(color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        },
    ]
}

/// Drives frames against the presentation surface
pub struct FrameRenderer {
    device: Device,
    mode: FrameMode,
    slots: Vec<FrameSync>,
    render_finished: Vec<Semaphore>,
    command_buffers: [vk::CommandBuffer; IMAGE_COUNT],
    command_pool: CommandPool,
    next_slot: usize,
    state: FrameStateMachine,
}

impl FrameRenderer {
    /// Allocate the two graphics command buffers and, when pipelined, the per-slot sync objects
    pub fn new(device: &Device, command_pool: CommandPool, mode: FrameMode) -> VulkanResult<Self> {
        let command_buffers = command_pool.allocate_array::<IMAGE_COUNT>()?;
        let (slots, render_finished) = match mode {
            FrameMode::Blocking => (Vec::new(), Vec::new()),
            FrameMode::Pipelined => (
                (0..mode.frames_in_flight())
                    .map(|_| FrameSync::new(device))
                    .collect::<VulkanResult<_>>()?,
                (0..IMAGE_COUNT)
                    .map(|_| Semaphore::new(device.clone()))
                    .collect::<VulkanResult<_>>()?,
            ),
        };
        log::info!(
            "[FRAME] {:?} frame mode, {} frame slot(s)",
            mode,
            mode.frames_in_flight()
        );

        Ok(Self {
            device: device.clone(),
            mode,
            slots,
            render_finished,
            command_buffers,
            command_pool,
            next_slot: 0,
            state: FrameStateMachine::default(),
        })
    }

    /// Pacing mode
    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// State machine, for inspection
    pub fn state(&self) -> &FrameStateMachine {
        &self.state
    }

    /// Run one frame.
    ///
    /// `write_uniforms` receives the frame slot and must fill that slot's
    /// uniform buffers and return its descriptor sets. It runs once the slot
    /// is no longer in use by the GPU.
    pub fn render_frame(
        &mut self,
        targets: &FrameTargets<'_>,
        draw: DrawCall,
        verbose: bool,
        write_uniforms: impl FnOnce(usize) -> VulkanResult<[vk::DescriptorSet; SET_COUNT]>,
    ) -> VulkanResult<FrameOutcome> {
        let frame_number = self.state.completed() + 1;
        let level = frame_level(frame_number, verbose);

        let outcome = match self.mode {
            FrameMode::Blocking => self.blocking_frame(targets, draw, write_uniforms),
            FrameMode::Pipelined => self.pipelined_frame(targets, draw, write_uniforms),
        };

        match &outcome {
            Ok(frame) => log::log!(
                level,
                "[FRAME] Frame {} rendered to image {} (slot {}{})",
                frame_number,
                frame.image_index,
                frame.slot,
                if frame.suboptimal { ", suboptimal" } else { "" }
            ),
            Err(e) => {
                let abandoned = self.state.abandon();
                log::warn!("[FRAME] Frame {} abandoned while {:?}: {}", frame_number, abandoned, e);
            }
        }
        outcome
    }

    fn blocking_frame(
        &mut self,
        targets: &FrameTargets<'_>,
        draw: DrawCall,
        write_uniforms: impl FnOnce(usize) -> VulkanResult<[vk::DescriptorSet; SET_COUNT]>,
    ) -> VulkanResult<FrameOutcome> {
        let sets = write_uniforms(0)?;
        let swapchain = targets.presentation.swapchain();

        self.state.advance(FrameState::Acquiring)?;
        let image_ready = Semaphore::new(self.device.clone())?;
        let fence = Fence::new(self.device.clone(), false)?;
        let (image_index, acquire_suboptimal) = swapchain.acquire_next_image(image_ready.handle())?;

        self.state.advance(FrameState::Recording)?;
        let command_buffer = self.command_buffers[image_index];
        let submitted = self.record(command_buffer, image_index, targets, draw, &sets).and_then(|()| {
            self.submit(
                targets.queue,
                command_buffer,
                image_ready.handle(),
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                None,
                fence.handle(),
            )
        });
        if let Err(e) = submitted {
            self.release_image(targets, image_index, image_ready.handle());
            return Err(e);
        }

        self.state.advance(FrameState::Submitted)?;
        fence.wait_forever()?;

        self.state.advance(FrameState::Presenting)?;
        let present_suboptimal = swapchain.present(targets.queue, image_index, &[])?;
        self.state.advance(FrameState::Idle)?;

        // image_ready and fence are destroyed here
        Ok(FrameOutcome {
            image_index,
            slot: 0,
            suboptimal: acquire_suboptimal || present_suboptimal,
        })
    }

    fn pipelined_frame(
        &mut self,
        targets: &FrameTargets<'_>,
        draw: DrawCall,
        write_uniforms: impl FnOnce(usize) -> VulkanResult<[vk::DescriptorSet; SET_COUNT]>,
    ) -> VulkanResult<FrameOutcome> {
        let slot = self.next_slot;
        let swapchain = targets.presentation.swapchain();
        let (image_available, in_flight) = {
            let sync = self.slots.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("frame slot {slot} has no sync objects"),
            })?;
            // the slot's previous submission must retire before its uniforms change
            sync.in_flight.wait_forever()?;
            (sync.image_available.handle(), sync.in_flight.handle())
        };
        let sets = write_uniforms(slot)?;

        self.state.advance(FrameState::Acquiring)?;
        let (image_index, acquire_suboptimal) = swapchain.acquire_next_image(image_available)?;

        self.state.advance(FrameState::Recording)?;
        // indexed by slot: the slot fence guarantees this buffer is idle
        let command_buffer = self.command_buffers[slot];
        let render_finished = self.render_finished[image_index].handle();
        let mut submitted = self.record(command_buffer, image_index, targets, draw, &sets);
        if submitted.is_ok() {
            submitted = self.slots[slot].in_flight.reset().and_then(|()| {
                self.submit(
                    targets.queue,
                    command_buffer,
                    image_available,
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    Some(render_finished),
                    in_flight,
                )
            });
            if submitted.is_err() {
                // nothing will signal the reset fence; replace it so the next wait on this slot returns
                match Fence::new(self.device.clone(), true) {
                    Ok(fence) => self.slots[slot].in_flight = fence,
                    Err(e) => log::error!("[FRAME] Could not replace fence of slot {}: {}", slot, e),
                }
            }
        }
        if let Err(e) = submitted {
            self.release_image(targets, image_index, image_available);
            return Err(e);
        }

        self.state.advance(FrameState::Submitted)?;
        self.state.advance(FrameState::Presenting)?;
        let present_suboptimal = swapchain.present(targets.queue, image_index, &[render_finished])?;
        self.state.advance(FrameState::Idle)?;

        self.next_slot = (slot + 1) % self.slots.len();
        Ok(FrameOutcome {
            image_index,
            slot,
            suboptimal: acquire_suboptimal || present_suboptimal,
        })
    }

    /// Give an acquired image back when its frame failed before submission.
    ///
    /// An empty batch consumes the acquire semaphore, then the image is
    /// presented with whatever it holds. Failures here are only logged; the
    /// frame's own error is what the caller sees.
    fn release_image(&self, targets: &FrameTargets<'_>, image_index: usize, acquired: vk::Semaphore) {
        if !self.state.holds_unsubmitted_image() {
            return;
        }
        let released = Fence::new(self.device.clone(), false).and_then(|fence| {
            let wait_semaphores = [acquired];
            let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
            let submit_info = vk::SubmitInfo::builder()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages);
            unsafe {
                self.device
                    .queue_submit(targets.queue, &[submit_info.build()], fence.handle())
                    .map_err(VulkanError::from)?;
            }
            fence.wait_forever()?;
            targets.presentation.swapchain().present(targets.queue, image_index, &[])
        });
        match released {
            Ok(_) => log::debug!("[FRAME] Released unsubmitted image {}", image_index),
            Err(e) => log::error!("[FRAME] Could not release image {}: {}", image_index, e),
        }
    }

    fn record(
        &self,
        command_buffer: vk::CommandBuffer,
        image_index: usize,
        targets: &FrameTargets<'_>,
        draw: DrawCall,
        sets: &[vk::DescriptorSet; SET_COUNT],
    ) -> VulkanResult<()> {
        let framebuffer = targets
            .presentation
            .framebuffer(image_index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for image {image_index}"),
            })?;
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: targets.presentation.extent(),
        };
        let clears = clear_values(targets.clear_color);

        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::from)?;
        }

        let mut recorder = CommandRecorder::new(command_buffer, self.device.clone());
        recorder.begin()?;
        {
            let mut pass = recorder.begin_render_pass(
                targets.presentation.render_pass().handle(),
                framebuffer,
                render_area,
                &clears,
            )?;
            pass.bind_pipeline(targets.pipeline.handle());
            pass.bind_descriptor_sets(targets.pipeline.layout(), sets);

            let geometry = targets.geometry;
            match draw {
                DrawCall::Indexed { index_count } => {
                    pass.bind_vertex_buffers(0, &[geometry.indexed_vertices.handle()], &[0]);
                    pass.bind_index_buffer(geometry.indices.handle(), 0, vk::IndexType::UINT32);
                    pass.draw_indexed(index_count, 1, 0, 0, 0);
                }
                DrawCall::Vertices { vertex_count } => {
                    pass.bind_vertex_buffers(0, &[geometry.vertices.handle()], &[0]);
                    pass.draw(vertex_count, 1, 0, 0);
                }
            }
        }
        recorder.end()?;
        Ok(())
    }

    fn submit(
        &self,
        queue: vk::Queue,
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags,
        signal: Option<vk::Semaphore>,
        fence: vk::Fence,
    ) -> VulkanResult<()> {
        let wait_semaphores = [wait];
        let wait_stages = [wait_stage];
        let command_buffers = [command_buffer];
        let signal_semaphores: Vec<vk::Semaphore> = signal.into_iter().collect();

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .queue_submit(queue, &[submit_info.build()], fence)
                .map_err(VulkanError::from)
        }
    }
}

impl Drop for FrameRenderer {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }
        self.command_pool.free(&self.command_buffers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_cycle() {
        let mut machine = FrameStateMachine::default();
        for state in [
            FrameState::Acquiring,
            FrameState::Recording,
            FrameState::Submitted,
            FrameState::Presenting,
            FrameState::Idle,
        ] {
            machine.advance(state).unwrap();
            assert_eq!(machine.state(), state);
        }
        assert_eq!(machine.completed(), 1);
    }

    #[test]
    fn test_skipping_a_state_is_rejected() {
        let mut machine = FrameStateMachine::default();
        assert!(machine.advance(FrameState::Recording).is_err());
        machine.advance(FrameState::Acquiring).unwrap();
        assert!(machine.advance(FrameState::Submitted).is_err());
        assert!(machine.advance(FrameState::Idle).is_err());
        assert_eq!(machine.state(), FrameState::Acquiring);
    }

    #[test]
    fn test_abandon_returns_to_idle_without_counting() {
        let mut machine = FrameStateMachine::default();
        machine.advance(FrameState::Acquiring).unwrap();
        machine.advance(FrameState::Recording).unwrap();
        assert_eq!(machine.abandon(), FrameState::Recording);
        assert_eq!(machine.state(), FrameState::Idle);
        assert_eq!(machine.completed(), 0);
        machine.advance(FrameState::Acquiring).unwrap();
    }

    #[test]
    fn test_only_recording_frames_hold_an_unsubmitted_image() {
        let mut machine = FrameStateMachine::default();
        assert!(!machine.holds_unsubmitted_image());
        machine.advance(FrameState::Acquiring).unwrap();
        // acquire has not returned an image yet
        assert!(!machine.holds_unsubmitted_image());
        machine.advance(FrameState::Recording).unwrap();
        assert!(machine.holds_unsubmitted_image());
        machine.advance(FrameState::Submitted).unwrap();
        assert!(!machine.holds_unsubmitted_image());
        machine.advance(FrameState::Presenting).unwrap();
        assert!(!machine.holds_unsubmitted_image());
    }

    #[test]
    fn test_failed_recording_is_released_then_abandoned() {
        let mut machine = FrameStateMachine::default();
        machine.advance(FrameState::Acquiring).unwrap();
        machine.advance(FrameState::Recording).unwrap();

        // error path: release while the state still says Recording, then abandon
        assert!(machine.holds_unsubmitted_image());
        assert_eq!(machine.abandon(), FrameState::Recording);
        assert!(!machine.holds_unsubmitted_image());
        assert_eq!(machine.completed(), 0);

        // the next frame starts from a clean cycle
        for state in [
            FrameState::Acquiring,
            FrameState::Recording,
            FrameState::Submitted,
            FrameState::Presenting,
            FrameState::Idle,
        ] {
            machine.advance(state).unwrap();
        }
        assert_eq!(machine.completed(), 1);
    }

    #[test]
    fn test_index_toggle_selects_draw() {
        assert_eq!(DrawCall::for_toggle(false, 36, 36), DrawCall::Vertices { vertex_count: 36 });
        assert_eq!(DrawCall::for_toggle(true, 36, 36), DrawCall::Indexed { index_count: 36 });
        assert_eq!(DrawCall::for_toggle(true, 8, 12), DrawCall::Indexed { index_count: 12 });
    }

    #[test]
    fn test_clear_values() {
        let clears = clear_values([0.0, 0.0, 0.0, 1.0]);
        unsafe {
            assert_eq!(clears[0].color.float32, [0.0, 0.0, 0.0, 1.0]);
            assert_eq!(clears[1].depth_stencil.depth, 1.0);
            assert_eq!(clears[1].depth_stencil.stencil, 0);
        }
    }
}
