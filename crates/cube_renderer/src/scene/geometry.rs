//! The sample cube: a ±1 cube with per-face normals, per-corner colors and
//! texture coordinates, in indexed and non-indexed form.

use bytemuck::{Pod, Zeroable};

/// Interleaved vertex record matching the pipeline's single vertex binding
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Face normal
    pub normal: [f32; 3],
    /// Per-vertex color
    pub color: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Color derived from position so each corner gets a distinct RGB
    fn at(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        let color = position.map(|c| (c + 1.0) * 0.5);
        Self {
            position,
            normal,
            color,
            tex_coord,
        }
    }
}

/// Outward normal and the four corners of each face, counter-clockwise seen from outside
const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
    // +X
    ([1.0, 0.0, 0.0], [[1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]]),
    // -X
    ([-1.0, 0.0, 0.0], [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]]),
    // +Y
    ([0.0, 1.0, 0.0], [[-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]]),
    // -Y
    ([0.0, -1.0, 0.0], [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]]),
    // +Z
    ([0.0, 0.0, 1.0], [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]]),
    // -Z
    ([0.0, 0.0, -1.0], [[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]]),
];

const CORNER_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Two triangles per quad
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// 24 unique vertices and 36 indices
pub fn cube_indexed() -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, corners) in FACES {
        let base = vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(CORNER_UVS) {
            vertices.push(Vertex::at(corner, normal, uv));
        }
        indices.extend(QUAD_INDICES.iter().map(|i| base + i));
    }

    (vertices, indices)
}

/// The same cube expanded to 36 vertices for non-indexed drawing
pub fn cube_vertices() -> Vec<Vertex> {
    let (vertices, indices) = cube_indexed();
    indices.iter().map(|&i| vertices[i as usize]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_vertex_record_layout() {
        assert_eq!(size_of::<Vertex>(), 44);
        assert_eq!(offset_of!(Vertex, normal), 12);
        assert_eq!(offset_of!(Vertex, color), 24);
        assert_eq!(offset_of!(Vertex, tex_coord), 36);
    }

    #[test]
    fn test_counts() {
        let (vertices, indices) = cube_indexed();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        assert_eq!(cube_vertices().len(), 36);
    }

    #[test]
    fn test_expanded_matches_indexed() {
        let (vertices, indices) = cube_indexed();
        let expanded = cube_vertices();
        for (v, &i) in expanded.iter().zip(&indices) {
            assert_eq!(*v, vertices[i as usize]);
        }
    }

    #[test]
    fn test_normals_point_outward() {
        for v in cube_vertices() {
            let dot: f32 = v.position.iter().zip(v.normal).map(|(p, n)| p * n).sum();
            assert_eq!(dot, 1.0);
        }
    }

    #[test]
    fn test_triangles_wind_counter_clockwise_from_outside() {
        let expanded = cube_vertices();
        for tri in expanded.chunks_exact(3) {
            let [a, b, c] = [tri[0].position, tri[1].position, tri[2].position];
            let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let w = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let cross = [
                u[1] * w[2] - u[2] * w[1],
                u[2] * w[0] - u[0] * w[2],
                u[0] * w[1] - u[1] * w[0],
            ];
            let n = tri[0].normal;
            assert!(cross[0] * n[0] + cross[1] * n[1] + cross[2] * n[2] > 0.0);
        }
    }

    #[test]
    fn test_colors_stay_in_unit_range() {
        for v in cube_vertices() {
            assert!(v.color.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }
}
