//! Error classification shared by the engine's typed errors.
//!
//! Every module error (`MeshError`, `FeedError`, ...) maps onto one of these
//! kinds so the application can decide how far a failure propagates without
//! matching on every concrete variant.

use std::fmt;

/// Coarse failure category.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Bad caller input: grid dimensions, shader source, image data.
    /// Fatal to the setup step that received it.
    InvalidInput,

    /// Allocation or GPU resource failure. Fatal, never retried.
    ResourceExhaustion,

    /// The frame source could not be opened or stopped producing frames.
    /// Fatal to the run; there is no reconnection policy.
    DeviceUnavailable,

    /// A single frame could not be acquired or imported.
    /// Surfaced to the render loop, which decides whether to continue.
    TransientFrameFailure,
}

impl ErrorKind {
    /// Returns `true` when the failure can only abort setup or the whole run.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::TransientFrameFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::ResourceExhaustion => "resource exhaustion",
            ErrorKind::DeviceUnavailable => "device unavailable",
            ErrorKind::TransientFrameFailure => "transient frame failure",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_recoverable() {
        assert!(ErrorKind::InvalidInput.is_fatal());
        assert!(ErrorKind::ResourceExhaustion.is_fatal());
        assert!(ErrorKind::DeviceUnavailable.is_fatal());
        assert!(!ErrorKind::TransientFrameFailure.is_fatal());
    }
}
