use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::ErrorKind;

/// Capture parameters, fixed when a source is opened.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CaptureConfig {
    pub fn validate(self) -> Result<Self, SourceError> {
        if self.width == 0 || self.height == 0 || self.fps == 0 {
            return Err(SourceError::InvalidConfig(self));
        }
        Ok(self)
    }

    /// Time between two frames at the configured rate.
    pub fn frame_interval(self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    pub fn aspect(self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { width: 640, height: 480, fps: 60 }
    }
}

impl fmt::Display for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}", self.width, self.height, self.fps)
    }
}

/// Frame source failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("invalid capture configuration {0}")]
    InvalidConfig(CaptureConfig),

    #[error("no free buffer in the capture queue")]
    Exhausted,

    #[error("timed out after {0:?} waiting for a frame")]
    Timeout(Duration),

    #[error("frame source is closed")]
    Closed,
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::InvalidConfig(_) | SourceError::Closed => ErrorKind::DeviceUnavailable,
            SourceError::Exhausted | SourceError::Timeout(_) => ErrorKind::TransientFrameFailure,
        }
    }
}

/// Image plane of a planar YUV 4:2:0 buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Plane {
    Y,
    U,
    V,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::Y, Plane::U, Plane::V];

    /// Texture unit index the plane is bound to by the camera feed.
    #[inline]
    pub fn unit(self) -> usize {
        match self {
            Plane::Y => 0,
            Plane::U => 1,
            Plane::V => 2,
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Plane::Y => "luma",
            Plane::U => "chroma-u",
            Plane::V => "chroma-v",
        })
    }
}

/// Placement of one plane inside a buffer's storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PlaneLayout {
    /// Byte offset of the first row.
    pub offset: usize,
    /// Bytes per row.
    pub stride: u32,
    /// Plane width in samples.
    pub width: u32,
    /// Plane height in rows.
    pub height: u32,
}

impl PlaneLayout {
    #[inline]
    pub fn len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One buffer of a frame source's queue (I420 layout).
///
/// The source owns the storage. `dequeue` moves a buffer out to the consumer
/// and `enqueue` moves it back, so a buffer is either queued in the source or
/// held by exactly one consumer.
#[derive(Debug)]
pub struct SourceBuffer {
    index: usize,
    sequence: u64,
    width: u32,
    height: u32,
    planes: [PlaneLayout; 3],
    data: Vec<u8>,
}

impl SourceBuffer {
    /// Allocates a zeroed I420 buffer with tightly packed planes.
    pub fn i420(index: usize, width: u32, height: u32) -> Self {
        let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));

        let y = PlaneLayout { offset: 0, stride: width, width, height };
        let u = PlaneLayout { offset: y.len(), stride: cw, width: cw, height: ch };
        let v = PlaneLayout { offset: u.offset + u.len(), stride: cw, width: cw, height: ch };

        Self {
            index,
            sequence: 0,
            width,
            height,
            planes: [y, u, v],
            data: vec![0; v.offset + v.len()],
        }
    }

    /// Slot in the owning source's queue.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Frame counter stamped by the source at dequeue.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn plane(&self, plane: Plane) -> PlaneLayout {
        self.planes[plane.unit()]
    }

    /// Bytes of `plane`, `stride × height` long.
    pub fn plane_bytes(&self, plane: Plane) -> &[u8] {
        let l = self.plane(plane);
        &self.data[l.offset..l.offset + l.len()]
    }

    pub fn plane_bytes_mut(&mut self, plane: Plane) -> &mut [u8] {
        let l = self.plane(plane);
        &mut self.data[l.offset..l.offset + l.len()]
    }
}

/// Producer of camera-like frames.
///
/// Implementations wrap a hardware capture queue or a software generator.
/// `dequeue` blocks until a frame is ready or fails; it must not block
/// forever. Every dequeued buffer is handed back through `enqueue`.
pub trait FrameSource {
    /// Configuration the source was opened with.
    fn config(&self) -> CaptureConfig;

    /// Waits for the next filled buffer.
    fn dequeue(&mut self) -> Result<SourceBuffer, SourceError>;

    /// Returns a buffer to the free pool.
    fn enqueue(&mut self, buffer: SourceBuffer);

    /// Stops capture and releases the source's buffers.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i420_layout_is_packed() {
        let buf = SourceBuffer::i420(0, 6, 4);
        assert_eq!(buf.plane(Plane::Y), PlaneLayout { offset: 0, stride: 6, width: 6, height: 4 });
        assert_eq!(buf.plane(Plane::U), PlaneLayout { offset: 24, stride: 3, width: 3, height: 2 });
        assert_eq!(buf.plane(Plane::V), PlaneLayout { offset: 30, stride: 3, width: 3, height: 2 });
        assert_eq!(buf.plane_bytes(Plane::V).len(), 6);
    }

    #[test]
    fn odd_dimensions_round_chroma_up() {
        let buf = SourceBuffer::i420(0, 5, 3);
        let u = buf.plane(Plane::U);
        assert_eq!((u.width, u.height), (3, 2));
    }

    #[test]
    fn plane_writes_stay_in_their_plane() {
        let mut buf = SourceBuffer::i420(0, 4, 2);
        buf.plane_bytes_mut(Plane::U).fill(7);
        assert!(buf.plane_bytes(Plane::Y).iter().all(|&b| b == 0));
        assert!(buf.plane_bytes(Plane::U).iter().all(|&b| b == 7));
        assert!(buf.plane_bytes(Plane::V).iter().all(|&b| b == 0));
    }

    #[test]
    fn config_validation() {
        assert!(CaptureConfig::default().validate().is_ok());
        let bad = CaptureConfig { width: 0, ..Default::default() };
        let err = bad.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert!(CaptureConfig { fps: 0, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn frame_interval_follows_fps() {
        let c = CaptureConfig { fps: 50, ..Default::default() };
        assert_eq!(c.frame_interval(), Duration::from_millis(20));
    }
}
