use super::source::{Plane, SourceBuffer};
use super::FeedError;

/// How a texture unit's image is produced.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BindTarget {
    /// Ordinary 2D texture, uploaded once.
    Texture2d,
    /// Per-frame image imported from a source buffer.
    External,
}

/// A feed-owned texture slot holding at most one live image.
///
/// Replacing the image always drops the previous one before the new import
/// runs, so two imports never coexist for the same unit.
#[derive(Debug)]
pub struct TextureUnit<T> {
    bind_target: BindTarget,
    image: Option<T>,
}

impl<T> TextureUnit<T> {
    pub fn new(bind_target: BindTarget) -> Self {
        Self { bind_target, image: None }
    }

    pub fn with_image(bind_target: BindTarget, image: T) -> Self {
        Self { bind_target, image: Some(image) }
    }

    pub fn bind_target(&self) -> BindTarget {
        self.bind_target
    }

    pub fn image(&self) -> Option<&T> {
        self.image.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.image.is_some()
    }

    /// Tears down the live image (if any), then installs the result of `import`.
    ///
    /// On failure the unit is left unbound.
    pub fn replace<E>(&mut self, import: impl FnOnce() -> Result<T, E>) -> Result<(), E> {
        self.teardown();
        self.image = Some(import()?);
        Ok(())
    }

    pub fn teardown(&mut self) {
        self.image = None;
    }
}

/// Turns source buffer planes into GPU-side images.
///
/// Dropping an `Image` must release everything the import created.
pub trait PlaneImporter {
    type Image;

    fn import(&mut self, plane: Plane, buffer: &SourceBuffer) -> Result<Self::Image, FeedError>;

    /// Called once after all planes of a frame were imported.
    fn sync(&mut self) {}
}

/// GPU image wrapping one plane of a source buffer.
#[derive(Debug)]
pub struct PlaneImage {
    plane: Plane,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl PlaneImage {
    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

impl Drop for PlaneImage {
    fn drop(&mut self) {
        // Frees the GPU memory once in-flight submissions referencing it retire.
        self.texture.destroy();
    }
}

/// Imports planes as single-channel textures through the device queue.
///
/// Each plane gets its own image sized to that plane (full-resolution luma,
/// half-resolution chroma). The queue applies the staged writes before any
/// command buffer submitted afterwards, which orders the import ahead of the
/// frame's draws without a full pipeline flush.
pub struct GpuImporter {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuImporter {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
        }
    }
}

impl PlaneImporter for GpuImporter {
    type Image = PlaneImage;

    fn import(&mut self, plane: Plane, buffer: &SourceBuffer) -> Result<PlaneImage, FeedError> {
        let layout = buffer.plane(plane);
        if layout.width == 0 || layout.height == 0 || layout.stride < layout.width {
            return Err(FeedError::Import {
                plane,
                reason: format!(
                    "bad plane layout {}x{} stride {}",
                    layout.width, layout.height, layout.stride
                ),
            });
        }

        let size = wgpu::Extent3d {
            width: layout.width,
            height: layout.height,
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(plane_label(plane)),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            buffer.plane_bytes(plane),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(layout.stride),
                rows_per_image: Some(layout.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(PlaneImage { plane, texture, view })
    }
}

fn plane_label(plane: Plane) -> &'static str {
    match plane {
        Plane::Y => "warpcam luma import",
        Plane::U => "warpcam chroma-u import",
        Plane::V => "warpcam chroma-v import",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_drops_previous_image_before_import() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct Token(Rc<Cell<u32>>);
        impl Drop for Token {
            fn drop(&mut self) {
                self.0.set(self.0.get() - 1);
            }
        }

        let live = Rc::new(Cell::new(0));
        let make = |live: &Rc<Cell<u32>>| {
            assert_eq!(live.get(), 0, "previous image still alive during import");
            live.set(live.get() + 1);
            Ok::<_, ()>(Token(live.clone()))
        };

        let mut unit = TextureUnit::new(BindTarget::External);
        unit.replace(|| make(&live)).unwrap();
        unit.replace(|| make(&live)).unwrap();
        assert_eq!(live.get(), 1);

        unit.teardown();
        assert_eq!(live.get(), 0);
        assert!(!unit.is_bound());
    }

    #[test]
    fn failed_import_leaves_unit_unbound() {
        let mut unit = TextureUnit::with_image(BindTarget::External, 1u8);
        assert!(unit.replace(|| Err::<u8, _>("boom")).is_err());
        assert!(unit.image().is_none());
        assert_eq!(unit.bind_target(), BindTarget::External);
    }
}
