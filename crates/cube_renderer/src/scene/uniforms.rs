//! Host mirrors of the three uniform blocks.
//!
//! Each struct is laid out to match the `std140` block of the same name in
//! `sample.vert`/`sample.frag`: 4x4 matrices as column-major `[[f32; 4]; 4]`,
//! vectors as `[f32; 4]`, scalars packed at the front. The bytes are copied
//! into host-visible buffers unchanged.

use bytemuck::{Pod, Zeroable};

use crate::config::LightSettings;
use crate::foundation::math::{Mat4, Vec3};

/// Set 0: transformation matrices
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MatrixBlock {
    /// Model matrix
    pub model: [[f32; 4]; 4],
    /// View matrix
    pub view: [[f32; 4]; 4],
    /// Projection matrix (Y already flipped)
    pub projection: [[f32; 4]; 4],
    /// Inverse-transpose of the model's upper 3x3, widened to 4x4
    pub normal: [[f32; 4]; 4],
}

impl MatrixBlock {
    /// Pack nalgebra matrices
    pub fn new(model: &Mat4, view: &Mat4, projection: &Mat4, normal: &Mat4) -> Self {
        Self {
            model: (*model).into(),
            view: (*view).into(),
            projection: (*projection).into(),
            normal: (*normal).into(),
        }
    }
}

impl Default for MatrixBlock {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = Mat4::identity().into();
        Self {
            model: identity,
            view: identity,
            projection: identity,
            normal: identity,
        }
    }
}

/// Set 1: light and material constants
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBlock {
    /// Ambient coefficient
    pub ka: f32,
    /// Diffuse coefficient
    pub kd: f32,
    /// Specular coefficient
    pub ks: f32,
    /// Specular exponent
    pub shininess: f32,
    /// Light position, w = 1
    pub light_pos: [f32; 4],
    /// Specular color, w = 1
    pub light_specular_color: [f32; 4],
    /// Eye position, w = 1
    pub eye_pos: [f32; 4],
}

impl LightBlock {
    /// Build from settings and the eye position
    pub fn new(settings: &LightSettings, eye: Vec3) -> Self {
        let [lx, ly, lz] = settings.position;
        let [sr, sg, sb] = settings.specular_color;
        Self {
            ka: settings.ka,
            kd: settings.kd,
            ks: settings.ks,
            shininess: settings.shininess,
            light_pos: [lx, ly, lz, 1.0],
            light_specular_color: [sr, sg, sb, 1.0],
            eye_pos: [eye.x, eye.y, eye.z, 1.0],
        }
    }
}

/// Set 2: per-frame scalars
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct MiscBlock {
    /// Elapsed seconds
    pub time: f32,
    /// Display mode: 0 vertex colors, 1 texture
    pub mode: i32,
    /// 1 when lighting is on
    pub lighting: i32,
    /// Rounds the block up to 16 bytes
    pub _pad: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_matrix_block_layout() {
        assert_eq!(size_of::<MatrixBlock>(), 256);
        assert_eq!(offset_of!(MatrixBlock, view), 64);
        assert_eq!(offset_of!(MatrixBlock, projection), 128);
        assert_eq!(offset_of!(MatrixBlock, normal), 192);
    }

    #[test]
    fn test_light_block_layout() {
        assert_eq!(size_of::<LightBlock>(), 64);
        assert_eq!(offset_of!(LightBlock, shininess), 12);
        assert_eq!(offset_of!(LightBlock, light_pos), 16);
        assert_eq!(offset_of!(LightBlock, light_specular_color), 32);
        assert_eq!(offset_of!(LightBlock, eye_pos), 48);
    }

    #[test]
    fn test_misc_block_layout() {
        assert_eq!(size_of::<MiscBlock>(), 16);
        assert_eq!(offset_of!(MiscBlock, mode), 4);
        assert_eq!(offset_of!(MiscBlock, lighting), 8);
    }

    #[test]
    fn test_matrices_are_column_major() {
        let mut m = Mat4::identity();
        m[(0, 3)] = 5.0; // x translation lives in column 3
        let block = MatrixBlock::new(&m, &m, &m, &m);
        assert_eq!(block.model[3][0], 5.0);
        assert_eq!(block.model[0][3], 0.0);
    }

    #[test]
    fn test_light_block_from_settings() {
        let block = LightBlock::new(&LightSettings::default(), Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(block.light_pos, [-50.0, -50.0, 10.0, 1.0]);
        assert_eq!(block.eye_pos, [0.0, 0.0, 3.0, 1.0]);
        assert_eq!(block.light_specular_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(block.shininess, 100.0);
    }

    #[test]
    fn test_bytes_mirror_fields() {
        let misc = MiscBlock {
            time: 1.5,
            mode: 1,
            lighting: 1,
            _pad: 0,
        };
        let bytes = bytemuck::bytes_of(&misc);
        assert_eq!(&bytes[0..4], &1.5f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &1i32.to_ne_bytes());
    }
}
