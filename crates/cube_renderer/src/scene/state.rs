//! Scene state: runtime toggles, interaction values and the uniform blocks
//! they feed.

use crate::config::SceneConfig;
use crate::foundation::math::{self, Vec3};

use super::input::{MouseButtons, MouseDelta, SceneAction};
use super::uniforms::{LightBlock, MatrixBlock, MiscBlock};

/// Everything the per-frame update reads and writes
#[derive(Debug, Clone)]
pub struct SceneState {
    config: SceneConfig,
    aspect: f32,
    /// Display mode, 0 or 1
    pub mode: i32,
    /// Draw through the index buffer
    pub use_index_buffer: bool,
    /// Lighting on
    pub use_lighting: bool,
    /// Automatic rotation instead of mouse interaction
    pub use_rotate: bool,
    /// Rotation frozen
    pub paused: bool,
    /// Per-frame logging at debug level
    pub verbose: bool,
    /// Exit requested
    pub need_to_exit: bool,
    /// Mouse rotation about X, radians
    pub xrot: f32,
    /// Mouse rotation about Y, radians
    pub yrot: f32,
    /// Model scale
    pub scale: f32,
    /// Set 0 contents
    pub matrices: MatrixBlock,
    /// Set 1 contents
    pub light: LightBlock,
    /// Set 2 contents
    pub misc: MiscBlock,
}

impl SceneState {
    /// Fresh state for a render target of the given aspect ratio
    pub fn new(config: SceneConfig, aspect: f32) -> Self {
        let light = LightBlock::new(&config.light, Self::eye(&config));
        let mut state = Self {
            config,
            aspect,
            mode: 0,
            use_index_buffer: false,
            use_lighting: false,
            use_rotate: true,
            paused: false,
            verbose: true,
            need_to_exit: false,
            xrot: 0.0,
            yrot: 0.0,
            scale: 1.0,
            matrices: MatrixBlock::default(),
            light,
            misc: MiscBlock::default(),
        };
        state.reset();
        state
    }

    fn eye(config: &SceneConfig) -> Vec3 {
        Vec3::new(0.0, 0.0, config.eye_distance)
    }

    /// Restore every toggle and matrix to its startup value
    pub fn reset(&mut self) {
        self.mode = 0;
        self.use_index_buffer = false;
        self.use_lighting = false;
        self.use_rotate = true;
        self.paused = false;
        self.verbose = true;
        self.need_to_exit = false;
        self.xrot = 0.0;
        self.yrot = 0.0;
        self.scale = 1.0;

        let eye = Self::eye(&self.config);
        let model = math::Mat4::identity();
        let view = math::look_at(eye, Vec3::zeros(), Vec3::y());
        self.matrices = MatrixBlock::new(&model, &view, &self.projection(), &math::normal_matrix(&model));
        self.light = LightBlock::new(&self.config.light, eye);
        self.misc = MiscBlock {
            time: 0.0,
            mode: self.mode,
            lighting: i32::from(self.use_lighting),
            _pad: 0,
        };
    }

    fn projection(&self) -> math::Mat4 {
        math::vulkan_perspective(
            self.config.fov_degrees.to_radians(),
            self.aspect,
            self.config.near_plane,
            self.config.far_plane,
        )
    }

    /// Recompute the matrix and misc blocks for `time` seconds since start.
    ///
    /// While rotating and paused the model matrix keeps its last value.
    pub fn update(&mut self, time: f64) {
        let model = if self.use_rotate {
            if self.paused {
                nalgebra::Matrix4::from(self.matrices.model)
            } else {
                let turns = time / f64::from(self.config.seconds_per_cycle);
                let angle = (360.0 * turns).to_radians() as f32;
                math::rotation_y(angle) * math::uniform_scale(self.scale)
            }
        } else {
            self.scale = self.scale.max(self.config.min_scale);
            math::uniform_scale(self.scale) * math::rotation_y(self.yrot) * math::rotation_x(self.xrot)
        };

        let view = nalgebra::Matrix4::from(self.matrices.view);
        self.matrices = MatrixBlock::new(&model, &view, &self.projection(), &math::normal_matrix(&model));

        self.misc = MiscBlock {
            time: time as f32,
            mode: self.mode,
            lighting: i32::from(self.use_lighting),
            _pad: 0,
        };
    }

    /// Apply a keyboard command
    pub fn apply(&mut self, action: SceneAction) {
        match action {
            SceneAction::ToggleIndexBuffer => self.use_index_buffer = !self.use_index_buffer,
            SceneAction::ToggleLighting => self.use_lighting = !self.use_lighting,
            SceneAction::CycleMode => self.mode = (self.mode + 1) % 2,
            SceneAction::TogglePause => self.paused = !self.paused,
            SceneAction::ToggleRotate => self.use_rotate = !self.use_rotate,
            SceneAction::ToggleVerbose => self.verbose = !self.verbose,
            SceneAction::Exit => self.need_to_exit = true,
        }
        log::debug!("{:?}: {}", action, self.describe_toggles());
    }

    /// Apply mouse motion: left rotates, middle scales
    pub fn apply_mouse(&mut self, delta: MouseDelta) {
        if delta.buttons.contains(MouseButtons::LEFT) {
            self.xrot += self.config.angle_factor * delta.dy as f32;
            self.yrot += self.config.angle_factor * delta.dx as f32;
        }
        if delta.buttons.contains(MouseButtons::MIDDLE) {
            self.scale += self.config.scale_factor * (delta.dx - delta.dy) as f32;
            self.scale = self.scale.max(self.config.min_scale);
        }
    }

    /// One-line summary for logs
    pub fn describe_toggles(&self) -> String {
        format!(
            "mode={} index={} lighting={} rotate={} paused={} verbose={}",
            self.mode, self.use_index_buffer, self.use_lighting, self.use_rotate, self.paused, self.verbose
        )
    }

    /// Scene constants in use
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use approx::assert_relative_eq;

    fn scene() -> SceneState {
        SceneState::new(SceneConfig::default(), 1.0)
    }

    fn model(state: &SceneState) -> Mat4 {
        Mat4::from(state.matrices.model)
    }

    #[test]
    fn test_reset_defaults() {
        let s = scene();
        assert_eq!(s.mode, 0);
        assert!(!s.use_index_buffer);
        assert!(!s.use_lighting);
        assert!(s.use_rotate);
        assert!(!s.paused);
        assert!(s.verbose);
        assert_eq!(s.scale, 1.0);
        assert_eq!(s.misc, MiscBlock::default());
        assert_eq!(s.light.eye_pos, [0.0, 0.0, 3.0, 1.0]);
        assert!(s.matrices.projection[1][1] < 0.0);
    }

    #[test]
    fn test_rotation_after_quarter_cycle() {
        let mut s = scene();
        s.update(0.75);
        assert_relative_eq!(model(&s), math::rotation_y(std::f32::consts::FRAC_PI_2), epsilon = 1e-5);
        assert_eq!(s.misc.time, 0.75);
    }

    #[test]
    fn test_paused_keeps_model() {
        let mut s = scene();
        s.update(0.5);
        let before = s.matrices.model;
        s.apply(SceneAction::TogglePause);
        s.update(2.0);
        assert_eq!(s.matrices.model, before);
        assert_eq!(s.misc.time, 2.0);
    }

    #[test]
    fn test_mouse_mode_composes_scale_rotations() {
        let mut s = scene();
        s.apply(SceneAction::ToggleRotate);
        s.xrot = 0.3;
        s.yrot = -0.4;
        s.scale = 2.0;
        s.update(10.0);
        let expected = math::uniform_scale(2.0) * math::rotation_y(-0.4) * math::rotation_x(0.3);
        assert_relative_eq!(model(&s), expected, epsilon = 1e-6);
        assert_relative_eq!(
            Mat4::from(s.matrices.normal),
            math::normal_matrix(&expected),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_scale_is_clamped_when_not_rotating() {
        let mut s = scene();
        s.apply(SceneAction::ToggleRotate);
        s.scale = 0.001;
        s.update(0.0);
        assert_eq!(s.scale, 0.05);
    }

    #[test]
    fn test_toggles() {
        let mut s = scene();
        s.apply(SceneAction::CycleMode);
        assert_eq!(s.mode, 1);
        s.apply(SceneAction::CycleMode);
        assert_eq!(s.mode, 0);

        s.apply(SceneAction::ToggleLighting);
        s.apply(SceneAction::ToggleIndexBuffer);
        s.apply(SceneAction::ToggleVerbose);
        s.update(0.0);
        assert_eq!(s.misc.lighting, 1);
        assert!(s.use_index_buffer);
        assert!(!s.verbose);

        s.apply(SceneAction::Exit);
        assert!(s.need_to_exit);
        s.reset();
        assert!(!s.need_to_exit);
        assert!(!s.use_index_buffer);
    }

    #[test]
    fn test_mouse_left_rotates_middle_scales() {
        let mut s = scene();
        s.apply_mouse(MouseDelta {
            dx: 10,
            dy: 20,
            buttons: MouseButtons::LEFT,
        });
        assert_relative_eq!(s.xrot, 20f32.to_radians(), epsilon = 1e-6);
        assert_relative_eq!(s.yrot, 10f32.to_radians(), epsilon = 1e-6);

        s.apply_mouse(MouseDelta {
            dx: -500,
            dy: 500,
            buttons: MouseButtons::MIDDLE,
        });
        assert_eq!(s.scale, 0.05);

        s.apply_mouse(MouseDelta {
            dx: 100,
            dy: 0,
            buttons: MouseButtons::MIDDLE,
        });
        assert_relative_eq!(s.scale, 0.55, epsilon = 1e-6);
    }

    #[test]
    fn test_right_button_does_nothing() {
        let mut s = scene();
        s.apply_mouse(MouseDelta {
            dx: 10,
            dy: 10,
            buttons: MouseButtons::RIGHT,
        });
        assert_eq!((s.xrot, s.yrot, s.scale), (0.0, 0.0, 1.0));
    }
}
