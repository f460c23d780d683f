use std::path::Path;

use super::import::{BindTarget, TextureUnit};
use super::{check_texture_size, FeedError, FeedState};

/// Decoded RGB8 image, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl RgbImage {
    /// Decodes any format the `image` crate was built with (PNM, PNG).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .map_err(|source| FeedError::ImageLoad { path: path.to_path_buf(), source })?
            .into_rgb8();

        let (width, height) = decoded.dimensions();
        log::info!("loaded {} ({width}x{height})", path.display());

        Self::from_raw(width, height, decoded.into_raw())
    }

    pub fn from_raw(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, FeedError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 {
            return Err(FeedError::InvalidImage(format!("empty image {width}x{height}")));
        }
        if rgb.len() != expected {
            return Err(FeedError::InvalidImage(format!(
                "{width}x{height} RGB image needs {expected} bytes, got {}",
                rgb.len()
            )));
        }
        Ok(Self { width, height, rgb })
    }

    /// Two-tone checkerboard with `cell`-pixel squares.
    pub fn checkerboard(width: u32, height: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let light = ((x / cell) + (y / cell)) % 2 == 0;
                rgb.extend_from_slice(if light { &[230, 230, 230] } else { &[40, 40, 40] });
            }
        }
        Self { width, height, rgb }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Expands to RGBA8 with opaque alpha, the layout the GPU texture uses.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.rgb.len() / 3 * 4);
        for px in self.rgb.chunks_exact(3) {
            out.extend_from_slice(px);
            out.push(u8::MAX);
        }
        out
    }
}

/// GPU copy of a still image.
#[derive(Debug)]
pub struct StillTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl StillTexture {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

impl Drop for StillTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

/// Feed serving one fixed image.
///
/// The texture is uploaded once at construction; acquire and release only
/// move the state machine.
#[derive(Debug)]
pub struct StaticFeed<T = StillTexture> {
    unit: TextureUnit<T>,
    width: u32,
    height: u32,
    acquired: bool,
}

impl StaticFeed<StillTexture> {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbImage) -> Result<Self, FeedError> {
        check_texture_size(image.width, image.height, &device.limits())?;

        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("warpcam still image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.to_rgba(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 4),
                rows_per_image: Some(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::info!("static feed ready ({}x{})", image.width, image.height);

        Ok(Self::with_image(StillTexture { texture, view }, image.width, image.height))
    }
}

impl<T> StaticFeed<T> {
    /// Wraps an already uploaded `width`x`height` image.
    pub fn with_image(image: T, width: u32, height: u32) -> Self {
        Self {
            unit: TextureUnit::with_image(BindTarget::Texture2d, image),
            width,
            height,
            acquired: false,
        }
    }

    pub fn state(&self) -> FeedState {
        if self.acquired { FeedState::Acquired } else { FeedState::Ready }
    }

    pub fn unit(&self) -> &TextureUnit<T> {
        &self.unit
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn acquire_frame(&mut self) -> Result<(), FeedError> {
        if self.acquired {
            log::warn!("acquire_frame on static feed that is already acquired");
        }
        self.acquired = true;
        Ok(())
    }

    pub fn release_frame(&mut self) -> Result<(), FeedError> {
        if !self.acquired {
            log::warn!("release_frame called without an acquired frame");
            return Err(FeedError::NotAcquired);
        }
        self.acquired = false;
        Ok(())
    }

    pub fn terminate(mut self) {
        self.acquired = false;
        self.unit.teardown();
        log::info!("static feed terminated");
    }
}
