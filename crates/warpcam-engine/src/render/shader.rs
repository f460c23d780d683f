use std::path::{Path, PathBuf};

use naga::{AddressSpace, Binding, ImageClass, ImageDimension, ScalarKind, TypeInner, VectorSize};
use thiserror::Error;

use crate::error::ErrorKind;

/// Vertex input carrying the grid position.
pub const POSITION_INPUT: &str = "position";
/// Vertex input carrying the distorted texcoord.
pub const TC_INPUT: &str = "tc";
/// Uniform holding the model-view-projection matrix.
pub const MVP_UNIFORM: &str = "mvp";

/// WGSL sources of a vertex and a fragment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPair {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderPair {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self { vertex: vertex.into(), fragment: fragment.into() }
    }

    /// Warp mesh sampling one RGBA texture named `tex`.
    pub fn rgb() -> Self {
        Self::new(
            include_str!("shaders/warp.vert.wgsl"),
            include_str!("shaders/rgb.frag.wgsl"),
        )
    }

    /// Warp mesh sampling I420 planes `tex`, `tex_u` and `tex_v`.
    pub fn yuv() -> Self {
        Self::new(
            include_str!("shaders/warp.vert.wgsl"),
            include_str!("shaders/yuv.frag.wgsl"),
        )
    }

    pub fn load(vertex: impl AsRef<Path>, fragment: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path)
                .map_err(|source| ShaderError::Read { path: path.to_path_buf(), source })
        };
        Ok(Self::new(read(vertex.as_ref())?, read(fragment.as_ref())?))
    }

    /// Parses and validates both stages, then resolves the names the
    /// drawcall binds against.
    pub fn reflect(&self) -> Result<ShaderInterface, ShaderError> {
        let vs = parse("vertex", &self.vertex)?;
        let fs = parse("fragment", &self.fragment)?;

        let vertex_entry = entry_point(&vs, naga::ShaderStage::Vertex, "vertex")?;
        let fragment_entry = entry_point(&fs, naga::ShaderStage::Fragment, "fragment")?;

        let inputs = vertex_inputs(&vs, naga::ShaderStage::Vertex);
        // The mesh only supplies `position` and `tc`.
        for input in &inputs {
            if input.name != POSITION_INPUT && input.name != TC_INPUT {
                return Err(ShaderError::UnexpectedInput(input.name.clone()));
            }
            if !input.vec2_f32 {
                return Err(ShaderError::UnsupportedType { name: input.name.clone() });
            }
        }
        let location = |name: &str| {
            inputs
                .iter()
                .find(|i| i.name == name)
                .map(|i| i.location)
                .ok_or_else(|| ShaderError::MissingInput(name.to_string()))
        };
        let position_location = location(POSITION_INPUT)?;
        let tc_location = location(TC_INPUT)?;

        let mut resources: Vec<ResourceSlot> = Vec::new();
        collect_resources(&vs, wgpu::ShaderStages::VERTEX, &mut resources)?;
        collect_resources(&fs, wgpu::ShaderStages::FRAGMENT, &mut resources)?;
        resources.sort_by_key(|r| r.binding);

        Ok(ShaderInterface {
            vertex_entry,
            fragment_entry,
            position_location,
            tc_location,
            resources,
        })
    }
}

/// Kind of a bound shader resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResourceKind {
    Uniform,
    Texture,
    Sampler,
}

/// A named `@group(0)` resource and the stages that declare it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub name: String,
    pub binding: u32,
    pub kind: ResourceKind,
    pub stages: wgpu::ShaderStages,
}

/// Names resolved from a [`ShaderPair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub position_location: u32,
    pub tc_location: u32,
    resources: Vec<ResourceSlot>,
}

impl ShaderInterface {
    pub fn resource(&self, name: &str) -> Option<&ResourceSlot> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// All resources, ordered by binding.
    pub fn resources(&self) -> &[ResourceSlot] {
        &self.resources
    }

    pub fn textures(&self) -> impl Iterator<Item = &ResourceSlot> {
        self.resources.iter().filter(|r| r.kind == ResourceKind::Texture)
    }

    /// First sampler by binding.
    pub fn sampler(&self) -> Option<&ResourceSlot> {
        self.resources.iter().find(|r| r.kind == ResourceKind::Sampler)
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} shader does not parse:\n{message}")]
    Parse { stage: &'static str, message: String },

    #[error("{stage} shader is invalid:\n{message}")]
    Validation { stage: &'static str, message: String },

    #[error("{0} shader has no entry point")]
    MissingEntryPoint(&'static str),

    #[error("vertex shader has no input named `{0}`")]
    MissingInput(String),

    #[error("vertex shader input `{0}` is not provided by the warp mesh")]
    UnexpectedInput(String),

    #[error("`{name}` has an unsupported type for a warp shader")]
    UnsupportedType { name: String },

    #[error("`{name}` is a {space} binding; only uniforms, textures and samplers are supported")]
    UnsupportedAddressSpace { name: String, space: String },

    #[error("`{name}` is bound in group {group}; only group 0 is supported")]
    UnsupportedGroup { name: String, group: u32 },

    #[error("`{name}` is declared at binding {first} and {second}")]
    BindingConflict { name: String, first: u32, second: u32 },
}

impl ShaderError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

fn parse(stage: &'static str, source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| ShaderError::Parse { stage, message: e.emit_to_string(source) })?;

    naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
        .validate(&module)
        .map_err(|e| ShaderError::Validation { stage, message: e.emit_to_string(source) })?;

    Ok(module)
}

fn entry_point(
    module: &naga::Module,
    stage: naga::ShaderStage,
    stage_name: &'static str,
) -> Result<String, ShaderError> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage)
        .map(|ep| ep.name.clone())
        .ok_or(ShaderError::MissingEntryPoint(stage_name))
}

struct VertexInput {
    name: String,
    location: u32,
    vec2_f32: bool,
}

/// Every `@location` input of the stage's entry point, whether declared as
/// an argument or as a struct member. Builtins are skipped.
fn vertex_inputs(module: &naga::Module, stage: naga::ShaderStage) -> Vec<VertexInput> {
    let Some(ep) = module.entry_points.iter().find(|ep| ep.stage == stage) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut push = |name: &Option<String>, binding: Option<&Binding>, ty: naga::Handle<naga::Type>| {
        if let (Some(name), Some(location)) = (name, binding.and_then(location_of)) {
            out.push(VertexInput {
                name: name.clone(),
                location,
                vec2_f32: is_vec2_f32(&module.types[ty].inner),
            });
        }
    };

    for arg in &ep.function.arguments {
        match (&arg.binding, &module.types[arg.ty].inner) {
            (Some(binding), _) => push(&arg.name, Some(binding), arg.ty),
            (None, TypeInner::Struct { members, .. }) => {
                for m in members {
                    push(&m.name, m.binding.as_ref(), m.ty);
                }
            }
            _ => {}
        }
    }
    out
}

fn location_of(binding: &Binding) -> Option<u32> {
    match *binding {
        Binding::Location { location, .. } => Some(location),
        _ => None,
    }
}

fn is_vec2_f32(inner: &TypeInner) -> bool {
    matches!(
        inner,
        TypeInner::Vector { size: VectorSize::Bi, scalar } if *scalar == naga::Scalar::F32
    )
}

fn collect_resources(
    module: &naga::Module,
    stage: wgpu::ShaderStages,
    out: &mut Vec<ResourceSlot>,
) -> Result<(), ShaderError> {
    for (_, var) in module.global_variables.iter() {
        let (Some(name), Some(rb)) = (&var.name, &var.binding) else {
            continue;
        };

        let inner = &module.types[var.ty].inner;
        let kind = match var.space {
            AddressSpace::Uniform => {
                if name == MVP_UNIFORM && !is_mat4(inner) {
                    return Err(ShaderError::UnsupportedType { name: name.clone() });
                }
                ResourceKind::Uniform
            }
            AddressSpace::Handle => match inner {
                TypeInner::Image {
                    dim: ImageDimension::D2,
                    arrayed: false,
                    class: ImageClass::Sampled { kind: ScalarKind::Float, multi: false },
                } => ResourceKind::Texture,
                TypeInner::Sampler { comparison: false } => ResourceKind::Sampler,
                _ => return Err(ShaderError::UnsupportedType { name: name.clone() }),
            },
            other => {
                return Err(ShaderError::UnsupportedAddressSpace {
                    name: name.clone(),
                    space: format!("{other:?}"),
                });
            }
        };

        if rb.group != 0 {
            return Err(ShaderError::UnsupportedGroup { name: name.clone(), group: rb.group });
        }

        if let Some(existing) = out.iter_mut().find(|r| r.name == *name) {
            if existing.binding != rb.binding || existing.kind != kind {
                return Err(ShaderError::BindingConflict {
                    name: name.clone(),
                    first: existing.binding,
                    second: rb.binding,
                });
            }
            existing.stages |= stage;
            continue;
        }

        if let Some(clash) = out.iter().find(|r| r.binding == rb.binding) {
            return Err(ShaderError::BindingConflict {
                name: format!("{} / {}", clash.name, name),
                first: clash.binding,
                second: rb.binding,
            });
        }

        out.push(ResourceSlot {
            name: name.clone(),
            binding: rb.binding,
            kind,
            stages: stage,
        });
    }
    Ok(())
}

fn is_mat4(inner: &TypeInner) -> bool {
    matches!(
        inner,
        TypeInner::Matrix { columns: VectorSize::Quad, rows: VectorSize::Quad, scalar }
            if *scalar == naga::Scalar::F32
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rgb_pair_reflects() {
        let iface = ShaderPair::rgb().reflect().unwrap();
        assert_eq!(iface.vertex_entry, "vs_main");
        assert_eq!(iface.fragment_entry, "fs_main");
        assert_eq!((iface.position_location, iface.tc_location), (0, 1));

        let mvp = iface.resource(MVP_UNIFORM).unwrap();
        assert_eq!((mvp.binding, mvp.kind), (0, ResourceKind::Uniform));
        assert_eq!(mvp.stages, wgpu::ShaderStages::VERTEX);

        let tex = iface.resource("tex").unwrap();
        assert_eq!((tex.binding, tex.kind), (1, ResourceKind::Texture));
        assert_eq!(iface.sampler().map(|s| s.binding), Some(2));
    }

    #[test]
    fn builtin_yuv_pair_has_three_planes() {
        let iface = ShaderPair::yuv().reflect().unwrap();
        let names: Vec<_> = iface.textures().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["tex", "tex_u", "tex_v"]);
    }

    #[test]
    fn direct_argument_inputs_are_found() {
        let vs = r#"
            @group(0) @binding(0) var<uniform> mvp: mat4x4<f32>;
            @vertex
            fn main(@location(3) tc: vec2<f32>, @location(5) position: vec2<f32>) -> @builtin(position) vec4<f32> {
                return mvp * vec4<f32>(position + tc * 0.0, 0.0, 1.0);
            }
        "#;
        let pair = ShaderPair::new(vs, include_str!("shaders/rgb.frag.wgsl"));
        let iface = pair.reflect().unwrap();
        assert_eq!((iface.position_location, iface.tc_location), (5, 3));
        assert_eq!(iface.vertex_entry, "main");
    }

    #[test]
    fn missing_input_is_reported_by_name() {
        let vs = r#"
            @vertex
            fn main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position, 0.0, 1.0);
            }
        "#;
        let err = ShaderPair::new(vs, include_str!("shaders/rgb.frag.wgsl")).reflect().unwrap_err();
        assert!(matches!(err, ShaderError::MissingInput(ref n) if n == "tc"));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn syntax_errors_surface_as_parse_errors() {
        let err = ShaderPair::new("fn (", "").reflect().unwrap_err();
        assert!(matches!(err, ShaderError::Parse { stage: "vertex", .. }));
    }

    #[test]
    fn conflicting_bindings_are_rejected() {
        let fs = r#"
            @group(0) @binding(0) var tex: texture_2d<f32>;
            @group(0) @binding(2) var tex_sampler: sampler;
            @fragment
            fn main(@location(0) tc: vec2<f32>) -> @location(0) vec4<f32> {
                return textureSample(tex, tex_sampler, tc);
            }
        "#;
        let pair = ShaderPair::new(include_str!("shaders/warp.vert.wgsl"), fs);
        assert!(matches!(pair.reflect(), Err(ShaderError::BindingConflict { .. })));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ShaderPair::load("/nonexistent/a.wgsl", "/nonexistent/b.wgsl").unwrap_err();
        assert!(matches!(err, ShaderError::Read { .. }));
    }

    #[test]
    fn extra_vertex_input_is_rejected() {
        let vs = r#"
            @group(0) @binding(0) var<uniform> mvp: mat4x4<f32>;
            @vertex
            fn main(
                @location(0) position: vec2<f32>,
                @location(1) tc: vec2<f32>,
                @location(2) color: vec4<f32>,
            ) -> @builtin(position) vec4<f32> {
                return mvp * vec4<f32>(position + tc * 0.0, color.x * 0.0, 1.0);
            }
        "#;
        let err = ShaderPair::new(vs, include_str!("shaders/rgb.frag.wgsl")).reflect().unwrap_err();
        assert!(matches!(err, ShaderError::UnexpectedInput(ref n) if n == "color"));
    }

    #[test]
    fn wrongly_typed_input_is_rejected() {
        let vs = r#"
            @vertex
            fn main(@location(0) position: vec3<f32>, @location(1) tc: vec2<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position.xy + tc * 0.0, 0.0, 1.0);
            }
        "#;
        let err = ShaderPair::new(vs, include_str!("shaders/rgb.frag.wgsl")).reflect().unwrap_err();
        assert!(matches!(err, ShaderError::UnsupportedType { ref name } if name == "position"));
    }

    #[test]
    fn builtin_vertex_inputs_are_ignored() {
        let vs = r#"
            @group(0) @binding(0) var<uniform> mvp: mat4x4<f32>;
            @vertex
            fn main(
                @builtin(vertex_index) index: u32,
                @location(0) position: vec2<f32>,
                @location(1) tc: vec2<f32>,
            ) -> @builtin(position) vec4<f32> {
                return mvp * vec4<f32>(position + tc * f32(index) * 0.0, 0.0, 1.0);
            }
        "#;
        assert!(ShaderPair::new(vs, include_str!("shaders/rgb.frag.wgsl")).reflect().is_ok());
    }

    #[test]
    fn storage_buffer_is_rejected() {
        let fs = r#"
            @group(0) @binding(1) var tex: texture_2d<f32>;
            @group(0) @binding(2) var tex_sampler: sampler;
            @group(0) @binding(3) var<storage, read> weights: array<f32>;
            @fragment
            fn fs_main(@location(0) tc: vec2<f32>) -> @location(0) vec4<f32> {
                return textureSample(tex, tex_sampler, tc) * weights[0];
            }
        "#;
        let err = ShaderPair::new(include_str!("shaders/warp.vert.wgsl"), fs).reflect().unwrap_err();
        assert!(matches!(err, ShaderError::UnsupportedAddressSpace { ref name, .. } if name == "weights"));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
