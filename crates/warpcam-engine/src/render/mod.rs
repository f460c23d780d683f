//! GPU rendering subsystem.
//!
//! A [`Drawcall`] bundles a reflected shader pair, the shared warp mesh and a
//! texture assignment against a feed's units. Each drawcall records its own
//! load-preserving pass, so several of them stack on one cleared frame.
//!
//! Convention:
//! - mesh positions are in the unit quad (top-left origin, +Y down)
//! - the `mvp` uniform maps them to clip space, see [`mvp::unit_quad_to_ndc`]

mod ctx;
mod drawcall;
pub mod mvp;
mod shader;

pub use ctx::{RenderCtx, RenderTarget};
pub use drawcall::{BindingPlan, Drawcall, DrawcallDesc, DrawcallError, TextureAssignment};
pub use shader::{
    ResourceKind, ResourceSlot, ShaderError, ShaderInterface, ShaderPair, MVP_UNIFORM,
    POSITION_INPUT, TC_INPUT,
};
