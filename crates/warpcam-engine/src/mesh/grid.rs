use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::warp::Distortion;

/// Mesh resolution in grid points per axis.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GridParams {
    pub width_points: u32,
    pub height_points: u32,
}

impl GridParams {
    #[inline]
    pub const fn new(width_points: u32, height_points: u32) -> Self {
        Self { width_points, height_points }
    }

    /// Square grid with `points` vertices per axis.
    #[inline]
    pub const fn square(points: u32) -> Self {
        Self::new(points, points)
    }

    /// Checks dimensions and returns `(vertex_count, index_count)`.
    ///
    /// Both counts must fit a `u32` index buffer.
    pub fn counts(self) -> Result<(u32, u32), MeshError> {
        let Self { width_points: w, height_points: h } = self;
        let invalid = MeshError::InvalidGridDimensions { width: w, height: h };

        if w < 2 || h < 2 {
            return Err(invalid);
        }

        let verts = w.checked_mul(h).ok_or(invalid.clone())?;
        let indices = (h - 1)
            .checked_mul(2)
            .and_then(|n| n.checked_mul(w))
            .and_then(|n| n.checked_add(2 * (h - 2)))
            .ok_or(invalid)?;

        Ok((verts, indices))
    }
}

impl Default for GridParams {
    fn default() -> Self {
        Self::square(32)
    }
}

/// Number of indices emitted for a `w × h` grid.
///
/// Each of the `h − 1` row pairs contributes a strip of `2·w` indices, and each
/// of the `h − 2` joins between consecutive strips contributes two degenerate
/// indices. Returns `None` for invalid dimensions.
pub fn index_count(width_points: u32, height_points: u32) -> Option<u32> {
    GridParams::new(width_points, height_points).counts().ok().map(|(_, n)| n)
}

/// Interleaved mesh vertex.
///
/// `pos` spans the unit quad `[0, 1]²` (origin top-left) and is never distorted;
/// `tc` is the sample coordinate after the distortion is applied.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub tc: [f32; 2],
}

/// Mesh generation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    #[error("invalid grid dimensions {width}x{height} (need at least 2x2 within u32 index range)")]
    InvalidGridDimensions { width: u32, height: u32 },

    #[error("out of memory allocating {what} ({len} elements)")]
    OutOfMemory { what: &'static str, len: usize },

    #[error("{what} buffer needs {bytes} bytes, device limit is {limit}")]
    ExceedsDeviceLimit { what: &'static str, bytes: u64, limit: u64 },
}

impl MeshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::InvalidGridDimensions { .. } => ErrorKind::InvalidInput,
            MeshError::OutOfMemory { .. } | MeshError::ExceedsDeviceLimit { .. } => {
                ErrorKind::ResourceExhaustion
            }
        }
    }
}

/// CPU-side mesh: vertices plus a single stitched triangle-strip index list.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    params: GridParams,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshData {
    pub fn params(&self) -> GridParams {
        self.params
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Vertex at grid column `col`, row `row`.
    pub fn vertex(&self, col: u32, row: u32) -> Option<&Vertex> {
        if col >= self.params.width_points || row >= self.params.height_points {
            return None;
        }
        self.vertices
            .get((row * self.params.width_points + col) as usize)
    }
}

/// Builds a warped grid mesh.
///
/// Vertices are row-major from the top-left corner. Texcoords are the grid
/// coordinates passed through `distortion`, or left untouched when it is `None`.
pub fn build_mesh(
    params: GridParams,
    distortion: Option<&dyn Distortion>,
) -> Result<MeshData, MeshError> {
    let (nverts, nindices) = params.counts()?;

    let vertices = build_vertices(params, nverts as usize, distortion)?;
    let indices = build_indices(params, nindices as usize)?;

    log::debug!(
        "built {}x{} mesh: {} vertices, {} indices",
        params.width_points,
        params.height_points,
        vertices.len(),
        indices.len()
    );

    Ok(MeshData { params, vertices, indices })
}

fn build_vertices(
    params: GridParams,
    len: usize,
    distortion: Option<&dyn Distortion>,
) -> Result<Vec<Vertex>, MeshError> {
    let mut vertices = Vec::new();
    vertices
        .try_reserve_exact(len)
        .map_err(|_| MeshError::OutOfMemory { what: "vertices", len })?;

    let GridParams { width_points: w, height_points: h } = params;
    let (sx, sy) = ((w - 1) as f32, (h - 1) as f32);

    for row in 0..h {
        let y = row as f32 / sy;
        for col in 0..w {
            let pos = [col as f32 / sx, y];
            let tc = match distortion {
                Some(d) => d.remap(pos),
                None => pos,
            };
            vertices.push(Vertex { pos, tc });
        }
    }

    Ok(vertices)
}

fn build_indices(params: GridParams, len: usize) -> Result<Vec<u32>, MeshError> {
    let mut indices = Vec::new();
    indices
        .try_reserve_exact(len)
        .map_err(|_| MeshError::OutOfMemory { what: "indices", len })?;

    let GridParams { width_points: w, height_points: h } = params;
    let idx = |col: u32, row: u32| row * w + col;

    for row in 0..h - 1 {
        if row > 0 {
            // Degenerate join: repeat the previous strip's last index and the
            // next strip's first index.
            indices.push(idx(w - 1, row));
            indices.push(idx(0, row));
        }
        for col in 0..w {
            indices.push(idx(col, row));
            indices.push(idx(col, row + 1));
        }
    }

    debug_assert_eq!(indices.len(), len);
    Ok(indices)
}
