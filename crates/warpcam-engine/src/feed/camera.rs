use super::import::{BindTarget, GpuImporter, PlaneImporter, TextureUnit};
use super::source::{CaptureConfig, FrameSource, Plane, SourceBuffer};
use super::{check_texture_size, FeedError, FeedState};

/// Feed backed by a camera-like [`FrameSource`].
///
/// One acquired buffer backs three texture units (Y, U, V). The units are
/// imported and torn down independently but always acquired and released
/// together.
pub struct CameraFeed<I: PlaneImporter = GpuImporter> {
    source: Box<dyn FrameSource>,
    importer: I,
    units: [TextureUnit<I::Image>; 3],
    held: Option<SourceBuffer>,
    closed: bool,
}

impl CameraFeed<GpuImporter> {
    /// Fails, closing `source`, if its frames exceed the device's texture
    /// size limit.
    pub fn new(
        mut source: Box<dyn FrameSource>,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Self, FeedError> {
        let config = source.config();
        if let Err(err) = check_texture_size(config.width, config.height, &device.limits()) {
            source.close();
            return Err(err);
        }
        Ok(Self::with_importer(source, GpuImporter::new(device, queue)))
    }
}

impl<I: PlaneImporter> CameraFeed<I> {
    pub fn with_importer(source: Box<dyn FrameSource>, importer: I) -> Self {
        log::info!("camera feed ready ({})", source.config());
        Self {
            source,
            importer,
            units: Plane::ALL.map(|_| TextureUnit::new(BindTarget::External)),
            held: None,
            closed: false,
        }
    }

    pub fn config(&self) -> CaptureConfig {
        self.source.config()
    }

    pub fn state(&self) -> FeedState {
        if self.held.is_some() { FeedState::Acquired } else { FeedState::Ready }
    }

    pub fn units(&self) -> &[TextureUnit<I::Image>] {
        &self.units
    }

    /// Sequence number of the held frame.
    pub fn held_sequence(&self) -> Option<u64> {
        self.held.as_ref().map(SourceBuffer::sequence)
    }

    /// Dequeues the next buffer and imports its planes.
    ///
    /// A frame still held from a previous acquire is released first, imports
    /// included. On failure nothing stays held and every unit is unbound.
    pub fn acquire_frame(&mut self) -> Result<(), FeedError> {
        if let Some(previous) = self.held.take() {
            log::warn!(
                "acquire_frame with frame {} still held; releasing it first",
                previous.sequence()
            );
            self.teardown_imports();
            self.source.enqueue(previous);
        }

        let buffer = self.source.dequeue()?;

        let Self { importer, units, .. } = self;
        let imported = Plane::ALL
            .into_iter()
            .try_for_each(|plane| units[plane.unit()].replace(|| importer.import(plane, &buffer)));

        if let Err(err) = imported {
            log::error!("frame {} import failed: {err}", buffer.sequence());
            self.teardown_imports();
            self.source.enqueue(buffer);
            return Err(err);
        }

        self.importer.sync();
        self.held = Some(buffer);
        Ok(())
    }

    /// Tears down this frame's imports and hands the buffer back to the source.
    ///
    /// Without a held frame this is a no-op that reports `NotAcquired`.
    pub fn release_frame(&mut self) -> Result<(), FeedError> {
        let Some(buffer) = self.held.take() else {
            log::warn!("release_frame called without an acquired frame");
            return Err(FeedError::NotAcquired);
        };

        self.teardown_imports();
        self.source.enqueue(buffer);
        Ok(())
    }

    /// Releases everything and closes the source.
    pub fn terminate(mut self) {
        self.shutdown();
    }

    fn teardown_imports(&mut self) {
        for unit in &mut self.units {
            unit.teardown();
        }
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.teardown_imports();
        if let Some(buffer) = self.held.take() {
            log::debug!("returning held frame {} during shutdown", buffer.sequence());
            self.source.enqueue(buffer);
        }
        self.source.close();
        self.closed = true;
        log::info!("camera feed terminated");
    }
}

impl<I: PlaneImporter> Drop for CameraFeed<I> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
