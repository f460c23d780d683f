//! warpcam engine crate.
//!
//! Renders a camera or still-image feed through a barrel-distorted mesh:
//! - `warp` and `mesh` build the distorted grid on the host
//! - `feed` owns the frame source and its GPU textures
//! - `render` reflects shaders and records drawcalls
//! - `device`, `window`, `core` and `time` are the platform + GPU runtime

pub mod device;
pub mod window;
pub mod time;
pub mod core;

pub mod logging;
pub mod error;
pub mod warp;
pub mod mesh;
pub mod feed;
pub mod render;
