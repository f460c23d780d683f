use wgpu::util::DeviceExt;

use super::grid::{GridParams, MeshData, MeshError, Vertex};

/// GPU-resident, immutable mesh buffers.
///
/// Created once from [`MeshData`]; there is no update path. Share between
/// drawcalls with `Arc<MeshBuffers>`; the buffers are released when the last
/// handle is dropped.
#[derive(Debug)]
pub struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    vertex_count: u32,
    index_count: u32,
}

impl MeshBuffers {
    pub const INDEX_FORMAT: wgpu::IndexFormat = wgpu::IndexFormat::Uint32;

    /// Checks that a grid of `params` fits the device's buffer size limit.
    ///
    /// Cheap enough to run before the mesh is generated.
    pub fn check_limits(params: GridParams, limits: &wgpu::Limits) -> Result<(), MeshError> {
        let (vertices, indices) = params.counts()?;
        let sizes = [
            ("vertex", u64::from(vertices) * std::mem::size_of::<Vertex>() as u64),
            ("index", u64::from(indices) * std::mem::size_of::<u32>() as u64),
        ];
        for (what, bytes) in sizes {
            if bytes > limits.max_buffer_size {
                return Err(MeshError::ExceedsDeviceLimit { what, bytes, limit: limits.max_buffer_size });
            }
        }
        Ok(())
    }

    /// Uploads `mesh` as static vertex and index buffers.
    ///
    /// Meshes over the device's buffer size limit are rejected up front.
    /// Device loss is reported through the device's error handler and is not
    /// retried here.
    pub fn upload(device: &wgpu::Device, mesh: &MeshData) -> Result<Self, MeshError> {
        Self::check_limits(mesh.params(), &device.limits())?;

        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("warpcam mesh vbo"),
            contents: bytemuck::cast_slice(mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("warpcam mesh ibo"),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        log::debug!(
            "uploaded mesh: {} bytes vertices, {} bytes indices",
            vertex.size(),
            index.size()
        );

        Ok(Self {
            vertex,
            index,
            vertex_count: mesh.vertices().len() as u32,
            index_count: mesh.indices().len() as u32,
        })
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Vertex attributes for [`Vertex`] at the given shader locations.
pub fn vertex_attributes(position_location: u32, tc_location: u32) -> [wgpu::VertexAttribute; 2] {
    [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: position_location,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: std::mem::size_of::<[f32; 2]>() as u64,
            shader_location: tc_location,
        },
    ]
}

/// Interleaved buffer layout for [`Vertex`].
pub fn vertex_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}
