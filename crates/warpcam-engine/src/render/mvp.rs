use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Maps the unit quad (origin top-left, +Y down) onto clip space.
///
/// `scale = 1.0` covers the whole target. Smaller scales keep the quad
/// anchored at the top-left corner, which gives a picture-in-picture inset.
pub fn unit_quad_to_ndc(scale: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(-1.0, 1.0, 0.0))
        * Mat4::from_scale(Vec3::new(2.0 * scale, -2.0 * scale, 1.0))
}

/// GPU layout of the `mvp` uniform (column-major `mat4x4<f32>`).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MvpUniform {
    pub columns: [[f32; 4]; 4],
}

impl From<Mat4> for MvpUniform {
    fn from(m: Mat4) -> Self {
        Self { columns: m.to_cols_array_2d() }
    }
}
