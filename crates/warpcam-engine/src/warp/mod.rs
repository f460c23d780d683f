//! Texture-coordinate remapping.
//!
//! A [`Distortion`] maps a point of the normalized `[0, 1]²` sample space onto
//! another point of that space. The mesh generator evaluates it once per
//! vertex at setup time; nothing here runs per frame.
//!
//! Implementations must be pure: the same input always yields the same
//! output, and calls for different vertices may run concurrently.

mod barrel;

pub use barrel::{Barrel, Coefficients, WarpError};

/// Pluggable per-vertex texcoord remap.
pub trait Distortion: Sync {
    /// Remaps a texcoord in `[0, 1]²` (origin top-left).
    ///
    /// The result must be finite for every finite input.
    fn remap(&self, tc: [f32; 2]) -> [f32; 2];
}

impl<F> Distortion for F
where
    F: Fn([f32; 2]) -> [f32; 2] + Sync,
{
    #[inline]
    fn remap(&self, tc: [f32; 2]) -> [f32; 2] {
        self(tc)
    }
}

/// Pass-through remap. Equivalent to handing `None` to the mesh generator.
#[derive(Debug, Copy, Clone, Default)]
pub struct Identity;

impl Distortion for Identity {
    #[inline]
    fn remap(&self, tc: [f32; 2]) -> [f32; 2] {
        tc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_distortions() {
        let flip = |[x, y]: [f32; 2]| [1.0 - x, y];
        assert_eq!(flip.remap([0.25, 0.5]), [0.75, 0.5]);
    }

    #[test]
    fn identity_passes_through() {
        assert_eq!(Identity.remap([0.1, 0.9]), [0.1, 0.9]);
    }
}
