use std::collections::VecDeque;
use std::time::Instant;

use super::source::{CaptureConfig, FrameSource, Plane, SourceBuffer, SourceError};

/// Buffers in flight between the source and its consumer.
pub const QUEUE_DEPTH: usize = 3;

/// Grid line spacing of the luma pattern, in pixels.
const GRID_SPACING: u32 = 32;

/// Software frame source producing a moving test pattern.
///
/// Behaves like a capture queue: a fixed pool of buffers, frames paced to the
/// configured rate (`dequeue` sleeps until the next frame deadline), and an
/// `Exhausted` failure when the consumer holds every buffer.
///
/// The luma plane carries a regular grid so the warp is easy to judge by eye.
pub struct TestPatternSource {
    config: CaptureConfig,
    free: VecDeque<SourceBuffer>,
    sequence: u64,
    next_deadline: Option<Instant>,
    paced: bool,
    closed: bool,
}

impl TestPatternSource {
    pub fn open(config: CaptureConfig) -> Result<Self, SourceError> {
        let config = config.validate()?;

        let free = (0..QUEUE_DEPTH)
            .map(|i| SourceBuffer::i420(i, config.width, config.height))
            .collect();

        log::info!("test pattern source opened at {config}");

        Ok(Self {
            config,
            free,
            sequence: 0,
            next_deadline: None,
            paced: true,
            closed: false,
        })
    }

    /// Disables frame pacing; `dequeue` returns as soon as a buffer is free.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Buffers currently queued in the source.
    pub fn free_buffers(&self) -> usize {
        self.free.len()
    }

    fn wait_for_frame(&mut self) {
        if !self.paced {
            return;
        }

        let now = Instant::now();
        if let Some(deadline) = self.next_deadline {
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
        }

        let base = self.next_deadline.map_or(now, |d| d.max(now));
        self.next_deadline = Some(base + self.config.frame_interval());
    }
}

impl FrameSource for TestPatternSource {
    fn config(&self) -> CaptureConfig {
        self.config
    }

    fn dequeue(&mut self) -> Result<SourceBuffer, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }

        let mut buffer = self.free.pop_front().ok_or(SourceError::Exhausted)?;

        self.wait_for_frame();

        paint(&mut buffer, self.sequence);
        buffer.set_sequence(self.sequence);
        self.sequence = self.sequence.wrapping_add(1);

        Ok(buffer)
    }

    fn enqueue(&mut self, buffer: SourceBuffer) {
        if self.closed {
            return;
        }
        if buffer.width() != self.config.width || buffer.height() != self.config.height {
            log::warn!(
                "dropping foreign buffer {} ({}x{}) returned to test pattern source",
                buffer.index(),
                buffer.width(),
                buffer.height()
            );
            return;
        }
        self.free.push_back(buffer);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.free.clear();
        log::info!("test pattern source closed after {} frames", self.sequence);
    }
}

fn paint(buffer: &mut SourceBuffer, sequence: u64) {
    let shift = (sequence % GRID_SPACING as u64) as u32;

    let y = buffer.plane(Plane::Y);
    let luma = buffer.plane_bytes_mut(Plane::Y);
    for row in 0..y.height {
        let line = &mut luma[(row * y.stride) as usize..][..y.width as usize];
        for (col, px) in line.iter_mut().enumerate() {
            let col = col as u32;
            let on_grid = (col + shift) % GRID_SPACING == 0 || row % GRID_SPACING == 0;
            *px = if on_grid {
                235
            } else {
                // Diagonal ramp in the studio range.
                (16 + ((col + row) * 219 / (y.width + y.height).max(1))) as u8
            };
        }
    }

    for plane in [Plane::U, Plane::V] {
        let l = buffer.plane(plane);
        let bytes = buffer.plane_bytes_mut(plane);
        for row in 0..l.height {
            let line = &mut bytes[(row * l.stride) as usize..][..l.width as usize];
            for (col, px) in line.iter_mut().enumerate() {
                let t = match plane {
                    Plane::U => col as u32 * 255 / l.width.max(1),
                    _ => row * 255 / l.height.max(1),
                };
                *px = (64 + t / 2) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> CaptureConfig {
        CaptureConfig { width: 64, height: 48, fps: 60 }
    }

    #[test]
    fn open_rejects_invalid_config() {
        let cfg = CaptureConfig { height: 0, ..small() };
        assert!(matches!(TestPatternSource::open(cfg), Err(SourceError::InvalidConfig(_))));
    }

    #[test]
    fn pool_is_exhausted_after_queue_depth_dequeues() {
        let mut src = TestPatternSource::open(small()).unwrap().unpaced();
        let held: Vec<_> = (0..QUEUE_DEPTH).map(|_| src.dequeue().unwrap()).collect();
        assert_eq!(src.dequeue().unwrap_err(), SourceError::Exhausted);

        for b in held {
            src.enqueue(b);
        }
        assert_eq!(src.free_buffers(), QUEUE_DEPTH);
        assert!(src.dequeue().is_ok());
    }

    #[test]
    fn sequence_increments_per_frame() {
        let mut src = TestPatternSource::open(small()).unwrap().unpaced();
        let a = src.dequeue().unwrap();
        let b = src.dequeue().unwrap();
        assert_eq!(a.sequence() + 1, b.sequence());
    }

    #[test]
    fn pattern_has_grid_lines_on_luma() {
        let mut src = TestPatternSource::open(small()).unwrap().unpaced();
        let buf = src.dequeue().unwrap();
        let luma = buf.plane_bytes(Plane::Y);
        assert_eq!(luma[0], 235);
        assert_ne!(luma[64 + 1], 235);
    }

    #[test]
    fn closed_source_refuses_frames() {
        let mut src = TestPatternSource::open(small()).unwrap().unpaced();
        src.close();
        assert_eq!(src.dequeue().unwrap_err(), SourceError::Closed);
        src.close();
    }

    #[test]
    fn foreign_buffers_are_not_pooled() {
        let mut src = TestPatternSource::open(small()).unwrap().unpaced();
        let _held = src.dequeue().unwrap();
        src.enqueue(SourceBuffer::i420(9, 8, 8));
        assert_eq!(src.free_buffers(), QUEUE_DEPTH - 1);
    }
}
