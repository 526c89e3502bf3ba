//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the few transforms the scene update needs.

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Right-handed perspective projection with the Y axis flipped for Vulkan clip space.
///
/// The flip reverses triangle winding, which is why the pipeline disables culling.
pub fn vulkan_perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut projection = nalgebra::Perspective3::new(aspect, fov_y_radians, near, far).to_homogeneous();
    projection[(1, 1)] *= -1.0;
    projection
}

/// Right-handed view matrix looking from `eye` at `target`
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
}

/// Inverse-transpose of the upper 3x3 of `model`, widened back to a 4x4.
///
/// Falls back to identity for a singular model matrix.
pub fn normal_matrix(model: &Mat4) -> Mat4 {
    let upper: Mat3 = model.fixed_view::<3, 3>(0, 0).into_owned();
    let inverse_transpose = upper.try_inverse().map_or_else(Mat3::identity, |m| m.transpose());
    inverse_transpose.to_homogeneous()
}

/// Rotation of `angle_radians` about the +Y axis
pub fn rotation_y(angle_radians: f32) -> Mat4 {
    Mat4::from_axis_angle(&Vec3::y_axis(), angle_radians)
}

/// Rotation of `angle_radians` about the +X axis
pub fn rotation_x(angle_radians: f32) -> Mat4 {
    Mat4::from_axis_angle(&Vec3::x_axis(), angle_radians)
}

/// Uniform scale
pub fn uniform_scale(scale: f32) -> Mat4 {
    Mat4::new_scaling(scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_projection_y_is_flipped() {
        let p = vulkan_perspective(60f32.to_radians(), 1.0, 0.1, 1000.0);
        let unflipped = nalgebra::Perspective3::new(1.0, 60f32.to_radians(), 0.1, 1000.0).to_homogeneous();
        assert_relative_eq!(p[(1, 1)], -unflipped[(1, 1)]);
        assert_relative_eq!(p[(0, 0)], unflipped[(0, 0)]);
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale() {
        let n = normal_matrix(&uniform_scale(2.0));
        assert_relative_eq!(n[(0, 0)], 0.5);
        assert_relative_eq!(n[(1, 1)], 0.5);
        assert_relative_eq!(n[(2, 2)], 0.5);
        assert_relative_eq!(n[(3, 3)], 1.0);
    }

    #[test]
    fn test_normal_matrix_of_rotation_is_rotation() {
        let r = rotation_y(0.7);
        let n = normal_matrix(&r);
        assert_relative_eq!(n, r, epsilon = 1e-6);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let view = look_at(Vec3::new(0.0, 0.0, 3.0), Vec3::zeros(), Vec3::y());
        let eye = view.transform_point(&Point3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(eye.coords, Vec3::zeros(), epsilon = 1e-6);
    }
}
