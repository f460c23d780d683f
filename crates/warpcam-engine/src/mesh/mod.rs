//! Warp mesh generation and upload.
//!
//! The mesh is a uniform grid over the unit quad. Positions stay regular; the
//! warp lives entirely in the texcoords, evaluated once on the host. Indices
//! form one continuous triangle strip (rows stitched with degenerate
//! triangles), so a single indexed draw covers the whole grid.

mod grid;
mod upload;

pub use grid::{build_mesh, index_count, GridParams, MeshData, MeshError, Vertex};
pub use upload::{vertex_attributes, vertex_layout, MeshBuffers};
