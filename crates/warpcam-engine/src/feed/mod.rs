//! Frame sources and their GPU texture bindings.
//!
//! A [`Feed`] owns the texture units a drawcall samples from. Each frame the
//! render loop brackets its draws with `acquire_frame` / `release_frame`;
//! `terminate` (or drop) releases everything the feed still holds.
//!
//! Two variants exist: a camera feed pulling I420 buffers from a
//! [`FrameSource`] and importing each plane per frame, and a static feed
//! serving one image uploaded at startup.

mod camera;
mod import;
mod pattern;
mod source;
mod still;

use std::path::PathBuf;

use thiserror::Error;

use crate::error::ErrorKind;

pub use camera::CameraFeed;
pub use import::{BindTarget, GpuImporter, PlaneImage, PlaneImporter, TextureUnit};
pub use pattern::{TestPatternSource, QUEUE_DEPTH};
pub use source::{CaptureConfig, FrameSource, Plane, PlaneLayout, SourceBuffer, SourceError};
pub use still::{RgbImage, StaticFeed, StillTexture};

/// Lifecycle state of a live feed.
///
/// A feed that does not exist yet or was terminated has no state: both are
/// expressed through ownership.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FeedState {
    Ready,
    Acquired,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to import {plane} plane: {reason}")]
    Import { plane: Plane, reason: String },

    #[error("no frame is currently acquired")]
    NotAcquired,

    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("{width}x{height} frames exceed the device texture limit {limit}")]
    ExceedsDeviceLimit { width: u32, height: u32, limit: u32 },
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::Source(e) => e.kind(),
            FeedError::Import { .. } => ErrorKind::TransientFrameFailure,
            FeedError::ExceedsDeviceLimit { .. } => ErrorKind::ResourceExhaustion,
            FeedError::NotAcquired | FeedError::ImageLoad { .. } | FeedError::InvalidImage(_) => {
                ErrorKind::InvalidInput
            }
        }
    }
}

/// Checks a frame size against `max_texture_dimension_2d`.
pub fn check_texture_size(width: u32, height: u32, limits: &wgpu::Limits) -> Result<(), FeedError> {
    let limit = limits.max_texture_dimension_2d;
    if width > limit || height > limit {
        return Err(FeedError::ExceedsDeviceLimit { width, height, limit });
    }
    Ok(())
}

/// Frame source bound to GPU texture units.
pub enum Feed {
    Camera(CameraFeed),
    Static(StaticFeed),
}

impl Feed {
    /// Opens a camera feed on `source`.
    pub fn camera(
        source: Box<dyn FrameSource>,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Self, FeedError> {
        CameraFeed::new(source, device, queue).map(Feed::Camera)
    }

    /// Uploads `image` and wraps it in a static feed.
    pub fn still(device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbImage) -> Result<Self, FeedError> {
        StaticFeed::new(device, queue, image).map(Feed::Static)
    }

    pub fn acquire_frame(&mut self) -> Result<(), FeedError> {
        match self {
            Feed::Camera(f) => f.acquire_frame(),
            Feed::Static(f) => f.acquire_frame(),
        }
    }

    pub fn release_frame(&mut self) -> Result<(), FeedError> {
        match self {
            Feed::Camera(f) => f.release_frame(),
            Feed::Static(f) => f.release_frame(),
        }
    }

    pub fn terminate(self) {
        match self {
            Feed::Camera(f) => f.terminate(),
            Feed::Static(f) => f.terminate(),
        }
    }

    pub fn state(&self) -> FeedState {
        match self {
            Feed::Camera(f) => f.state(),
            Feed::Static(f) => f.state(),
        }
    }

    /// Number of texture units the feed exposes.
    pub fn texture_count(&self) -> usize {
        match self {
            Feed::Camera(f) => f.units().len(),
            Feed::Static(_) => 1,
        }
    }

    pub fn bind_target(&self, unit: usize) -> Option<BindTarget> {
        match self {
            Feed::Camera(f) => f.units().get(unit).map(TextureUnit::bind_target),
            Feed::Static(f) => (unit == 0).then(|| f.unit().bind_target()),
        }
    }

    /// View of the image currently live in `unit`, if any.
    ///
    /// Camera units only have a view between acquire and release.
    pub fn texture_view(&self, unit: usize) -> Option<&wgpu::TextureView> {
        match self {
            Feed::Camera(f) => f.units().get(unit)?.image().map(PlaneImage::view),
            Feed::Static(f) => {
                if unit != 0 {
                    return None;
                }
                f.unit().image().map(StillTexture::view)
            }
        }
    }

    /// Pixel size of the frames, used to fit the warp's aspect ratio.
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            Feed::Camera(f) => {
                let c = f.config();
                (c.width, c.height)
            }
            Feed::Static(f) => f.resolution(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn error_kinds() {
        assert_eq!(FeedError::NotAcquired.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            FeedError::from(SourceError::Timeout(Duration::from_secs(1))).kind(),
            ErrorKind::TransientFrameFailure
        );
        assert_eq!(
            FeedError::from(SourceError::InvalidConfig(CaptureConfig::default())).kind(),
            ErrorKind::DeviceUnavailable
        );
        let import = FeedError::Import { plane: Plane::U, reason: "x".into() };
        assert_eq!(import.to_string(), "failed to import chroma-u plane: x");
    }

    #[test]
    fn oversized_frames_exceed_texture_limit() {
        let limits = wgpu::Limits::default();
        assert!(check_texture_size(640, 480, &limits).is_ok());
        assert!(check_texture_size(limits.max_texture_dimension_2d, 1, &limits).is_ok());

        let err = check_texture_size(10_000, 480, &limits).unwrap_err();
        assert!(matches!(
            err,
            FeedError::ExceedsDeviceLimit { width: 10_000, height: 480, limit } if limit == limits.max_texture_dimension_2d
        ));
        assert_eq!(err.kind(), ErrorKind::ResourceExhaustion);
    }
}
