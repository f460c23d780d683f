use std::sync::Arc;

use glam::Mat4;
use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::error::ErrorKind;
use crate::feed::Feed;
use crate::mesh::{vertex_attributes, vertex_layout, MeshBuffers};

use super::ctx::{RenderCtx, RenderTarget};
use super::mvp::MvpUniform;
use super::shader::{ResourceKind, ShaderError, ShaderInterface, ShaderPair, MVP_UNIFORM};

/// Binds the shader texture named `binding_name` to feed texture unit `unit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureAssignment {
    pub binding_name: String,
    pub unit: usize,
}

impl TextureAssignment {
    pub fn new(binding_name: impl Into<String>, unit: usize) -> Self {
        Self { binding_name: binding_name.into(), unit }
    }
}

/// Everything a drawcall fixes at setup.
#[derive(Debug, Clone)]
pub struct DrawcallDesc {
    pub label: String,
    pub mvp: Mat4,
    pub textures: Vec<TextureAssignment>,
}

impl DrawcallDesc {
    /// Assigns `tex` to unit 0, the layout of [`ShaderPair::rgb`].
    pub fn rgb(label: impl Into<String>, mvp: Mat4) -> Self {
        Self {
            label: label.into(),
            mvp,
            textures: vec![TextureAssignment::new("tex", 0)],
        }
    }

    /// Assigns `tex`, `tex_u`, `tex_v` to units 0..3, the layout of
    /// [`ShaderPair::yuv`].
    pub fn yuv(label: impl Into<String>, mvp: Mat4) -> Self {
        Self {
            label: label.into(),
            mvp,
            textures: vec![
                TextureAssignment::new("tex", 0),
                TextureAssignment::new("tex_u", 1),
                TextureAssignment::new("tex_v", 2),
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum DrawcallError {
    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error("shader declares no `{0}` uniform")]
    MissingUniform(String),

    #[error("shader declares no texture named `{0}`")]
    UnknownTexture(String),

    #[error("texture `{0}` is assigned twice")]
    DuplicateTexture(String),

    #[error("shader texture `{0}` has no feed unit assigned")]
    UnassignedTexture(String),

    #[error("shader samples textures but declares no sampler")]
    MissingSampler,

    #[error("shader declares `{name}` at binding {binding}, which a warp drawcall cannot supply")]
    UnclaimedResource { name: String, binding: u32 },

    #[error("feed unit {unit} for `{name}` has no live texture")]
    UnboundTexture { name: String, unit: usize },
}

impl DrawcallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DrawcallError::Shader(e) => e.kind(),
            _ => ErrorKind::InvalidInput,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TextureSlot {
    name: String,
    binding: u32,
    unit: usize,
}

/// Bind group layout resolved from shader names, before any GPU object exists.
#[derive(Debug, Clone)]
pub struct BindingPlan {
    mvp_binding: u32,
    mvp_stages: wgpu::ShaderStages,
    sampler: Option<(u32, wgpu::ShaderStages)>,
    textures: Vec<TextureSlot>,
    texture_stages: Vec<wgpu::ShaderStages>,
    uniform: MvpUniform,
}

impl BindingPlan {
    pub fn resolve(iface: &ShaderInterface, desc: &DrawcallDesc) -> Result<Self, DrawcallError> {
        let mvp = iface
            .resource(MVP_UNIFORM)
            .filter(|r| r.kind == ResourceKind::Uniform)
            .ok_or_else(|| DrawcallError::MissingUniform(MVP_UNIFORM.to_string()))?;

        let mut textures = Vec::with_capacity(desc.textures.len());
        let mut texture_stages = Vec::with_capacity(desc.textures.len());
        for a in &desc.textures {
            let slot = iface
                .resource(&a.binding_name)
                .filter(|r| r.kind == ResourceKind::Texture)
                .ok_or_else(|| DrawcallError::UnknownTexture(a.binding_name.clone()))?;

            if textures.iter().any(|t: &TextureSlot| t.name == a.binding_name) {
                return Err(DrawcallError::DuplicateTexture(a.binding_name.clone()));
            }

            textures.push(TextureSlot {
                name: a.binding_name.clone(),
                binding: slot.binding,
                unit: a.unit,
            });
            texture_stages.push(slot.stages);
        }

        if let Some(missing) = iface.textures().find(|t| !textures.iter().any(|s| s.name == t.name)) {
            return Err(DrawcallError::UnassignedTexture(missing.name.clone()));
        }

        let sampler = match iface.sampler() {
            Some(s) => Some((s.binding, s.stages)),
            None if !textures.is_empty() => return Err(DrawcallError::MissingSampler),
            None => None,
        };

        // Every declared binding must be in the layout.
        let claimed = |binding: u32| {
            binding == mvp.binding
                || sampler.is_some_and(|(b, _)| b == binding)
                || textures.iter().any(|t| t.binding == binding)
        };
        if let Some(extra) = iface.resources().iter().find(|r| !claimed(r.binding)) {
            return Err(DrawcallError::UnclaimedResource {
                name: extra.name.clone(),
                binding: extra.binding,
            });
        }

        Ok(Self {
            mvp_binding: mvp.binding,
            mvp_stages: mvp.stages,
            sampler,
            textures,
            texture_stages,
            uniform: MvpUniform::from(desc.mvp),
        })
    }

    /// Uniform payload this drawcall writes at setup.
    pub fn uniform(&self) -> MvpUniform {
        self.uniform
    }

    /// `(binding, unit)` of each assigned texture.
    pub fn texture_bindings(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.textures.iter().map(|t| (t.binding, t.unit))
    }

    pub fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: self.mvp_binding,
            visibility: self.mvp_stages,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<MvpUniform>() as u64),
            },
            count: None,
        }];

        for (t, stages) in self.textures.iter().zip(&self.texture_stages) {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: t.binding,
                visibility: *stages,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        if let Some((binding, stages)) = self.sampler {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: stages,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        entries.sort_by_key(|e| e.binding);
        entries
    }
}

/// Shader, mesh and texture bindings plus one indexed strip draw.
///
/// The pipeline, uniform and sampler are fixed at setup. Texture views are
/// resolved from the feed at every dispatch, since a camera feed swaps its
/// images each frame.
pub struct Drawcall {
    label: String,
    mvp: Mat4,
    plan: BindingPlan,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform: wgpu::Buffer,
    sampler: wgpu::Sampler,
    mesh: Arc<MeshBuffers>,
}

impl Drawcall {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        shaders: &ShaderPair,
        mesh: Arc<MeshBuffers>,
        desc: DrawcallDesc,
    ) -> Result<Self, DrawcallError> {
        let iface = shaders.reflect()?;
        let plan = BindingPlan::resolve(&iface, &desc)?;

        let vs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("warpcam vertex shader"),
            source: wgpu::ShaderSource::Wgsl(shaders.vertex.as_str().into()),
        });
        let fs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("warpcam fragment shader"),
            source: wgpu::ShaderSource::Wgsl(shaders.fragment.as_str().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("warpcam drawcall bgl"),
            entries: &plan.layout_entries(),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("warpcam drawcall pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let attributes = vertex_attributes(iface.position_location, iface.tc_location);

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label.as_str()),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vs,
                entry_point: Some(iface.vertex_entry.as_str()),
                compilation_options: Default::default(),
                buffers: &[vertex_layout(&attributes)],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs,
                entry_point: Some(iface.fragment_entry.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: Some(MeshBuffers::INDEX_FORMAT),
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        // Written once; the matrix never changes for a drawcall.
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("warpcam mvp ubo"),
            contents: bytemuck::bytes_of(&plan.uniform()),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("warpcam feed sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        log::debug!(
            "drawcall '{}' ready: {} indices, {} textures",
            desc.label,
            mesh.index_count(),
            plan.textures.len()
        );

        Ok(Self {
            label: desc.label,
            mvp: desc.mvp,
            plan,
            pipeline,
            bind_group_layout,
            uniform,
            sampler,
            mesh,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mvp(&self) -> Mat4 {
        self.mvp
    }

    pub fn mesh(&self) -> &Arc<MeshBuffers> {
        &self.mesh
    }

    /// Records one draw of the mesh into `target`, on top of its contents.
    pub fn dispatch(
        &self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        feed: &Feed,
    ) -> Result<(), DrawcallError> {
        let mut entries = Vec::with_capacity(self.plan.textures.len() + 2);
        entries.push(wgpu::BindGroupEntry {
            binding: self.plan.mvp_binding,
            resource: self.uniform.as_entire_binding(),
        });

        for t in &self.plan.textures {
            let view = feed.texture_view(t.unit).ok_or_else(|| DrawcallError::UnboundTexture {
                name: t.name.clone(),
                unit: t.unit,
            })?;
            entries.push(wgpu::BindGroupEntry {
                binding: t.binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        if let Some((binding, _)) = self.plan.sampler {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("warpcam drawcall bind group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let mut rpass = target.pass(&self.label, wgpu::LoadOp::Load);
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.set_vertex_buffer(0, self.mesh.vertex_buffer().slice(..));
        rpass.set_index_buffer(self.mesh.index_buffer().slice(..), MeshBuffers::INDEX_FORMAT);
        rpass.draw_indexed(0..self.mesh.index_count(), 0, 0..1);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mvp::unit_quad_to_ndc;

    #[test]
    fn rgb_plan_binds_mvp_texture_and_sampler() {
        let iface = ShaderPair::rgb().reflect().unwrap();
        let plan = BindingPlan::resolve(&iface, &DrawcallDesc::rgb("full", Mat4::IDENTITY)).unwrap();

        let entries = plan.layout_entries();
        let bindings: Vec<_> = entries.iter().map(|e| e.binding).collect();
        assert_eq!(bindings, [0, 1, 2]);
        assert_eq!(plan.texture_bindings().collect::<Vec<_>>(), [(1, 0)]);
    }

    #[test]
    fn yuv_plan_maps_planes_to_units() {
        let iface = ShaderPair::yuv().reflect().unwrap();
        let plan = BindingPlan::resolve(&iface, &DrawcallDesc::yuv("full", Mat4::IDENTITY)).unwrap();
        assert_eq!(plan.texture_bindings().collect::<Vec<_>>(), [(1, 0), (2, 1), (3, 2)]);
        assert_eq!(plan.layout_entries().len(), 5);
    }

    #[test]
    fn drawcalls_sharing_a_shader_keep_their_own_mvp() {
        let iface = ShaderPair::rgb().reflect().unwrap();
        let full = BindingPlan::resolve(&iface, &DrawcallDesc::rgb("full", unit_quad_to_ndc(1.0))).unwrap();
        let inset = BindingPlan::resolve(&iface, &DrawcallDesc::rgb("inset", unit_quad_to_ndc(0.3))).unwrap();

        assert_eq!(full.uniform(), MvpUniform::from(unit_quad_to_ndc(1.0)));
        assert_eq!(inset.uniform(), MvpUniform::from(unit_quad_to_ndc(0.3)));
        assert_ne!(full.uniform(), inset.uniform());
    }

    #[test]
    fn unknown_texture_name_fails_setup() {
        let iface = ShaderPair::rgb().reflect().unwrap();
        let mut desc = DrawcallDesc::rgb("x", Mat4::IDENTITY);
        desc.textures[0].binding_name = "texture0".into();

        let err = BindingPlan::resolve(&iface, &desc).unwrap_err();
        assert!(matches!(err, DrawcallError::UnknownTexture(ref n) if n == "texture0"));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn every_shader_texture_needs_a_unit() {
        let iface = ShaderPair::yuv().reflect().unwrap();
        let err = BindingPlan::resolve(&iface, &DrawcallDesc::rgb("x", Mat4::IDENTITY)).unwrap_err();
        assert!(matches!(err, DrawcallError::UnassignedTexture(ref n) if n == "tex_u"));
    }

    #[test]
    fn duplicate_assignment_is_rejected() {
        let iface = ShaderPair::rgb().reflect().unwrap();
        let mut desc = DrawcallDesc::rgb("x", Mat4::IDENTITY);
        desc.textures.push(TextureAssignment::new("tex", 1));
        assert!(matches!(
            BindingPlan::resolve(&iface, &desc),
            Err(DrawcallError::DuplicateTexture(_))
        ));
    }

    #[test]
    fn shader_without_mvp_is_rejected() {
        let vs = r#"
            @vertex
            fn main(@location(0) position: vec2<f32>, @location(1) tc: vec2<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position + tc * 0.0, 0.0, 1.0);
            }
        "#;
        let iface = ShaderPair::new(vs, include_str!("shaders/rgb.frag.wgsl")).reflect().unwrap();
        let err = BindingPlan::resolve(&iface, &DrawcallDesc::rgb("x", Mat4::IDENTITY)).unwrap_err();
        assert!(matches!(err, DrawcallError::MissingUniform(_)));
    }

    fn fragment_with_extras(extra_decl: &str, sample: &str) -> ShaderInterface {
        let fs = format!(
            r#"
            @group(0) @binding(1) var tex: texture_2d<f32>;
            @group(0) @binding(2) var tex_sampler: sampler;
            {extra_decl}
            @fragment
            fn fs_main(@location(0) tc: vec2<f32>) -> @location(0) vec4<f32> {{
                return {sample};
            }}
            "#
        );
        ShaderPair::new(include_str!("shaders/warp.vert.wgsl"), fs).reflect().unwrap()
    }

    #[test]
    fn extra_uniform_fails_setup() {
        let iface = fragment_with_extras(
            "@group(0) @binding(5) var<uniform> gain: f32;",
            "textureSample(tex, tex_sampler, tc) * gain",
        );
        let err = BindingPlan::resolve(&iface, &DrawcallDesc::rgb("x", Mat4::IDENTITY)).unwrap_err();
        assert!(matches!(
            err,
            DrawcallError::UnclaimedResource { ref name, binding: 5 } if name == "gain"
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn second_sampler_fails_setup() {
        let iface = fragment_with_extras(
            "@group(0) @binding(6) var other_sampler: sampler;",
            "textureSample(tex, tex_sampler, tc) + textureSample(tex, other_sampler, tc)",
        );
        let err = BindingPlan::resolve(&iface, &DrawcallDesc::rgb("x", Mat4::IDENTITY)).unwrap_err();
        assert!(matches!(
            err,
            DrawcallError::UnclaimedResource { ref name, binding: 6 } if name == "other_sampler"
        ));
    }
}
