use thiserror::Error;

use crate::error::ErrorKind;

use super::Distortion;

/// Radial polynomial shape coefficients `k0..k3`.
///
/// The distorted radius is `r' = r·(k0·r³ + k1·r² + k2·r + k3)`. The default
/// `{0, 0, 0, 1}` is the undistorted mapping.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Coefficients {
    pub k: [f32; 4],
}

impl Coefficients {
    pub const IDENTITY: Self = Self { k: [0.0, 0.0, 0.0, 1.0] };

    #[inline]
    pub const fn new(k0: f32, k1: f32, k2: f32, k3: f32) -> Self {
        Self { k: [k0, k1, k2, k3] }
    }

    pub fn is_finite(&self) -> bool {
        self.k.iter().all(|k| k.is_finite())
    }

    /// Returns the coefficients divided by their sum, so that `r = 1` maps to
    /// `r' = 1`. `None` when the sum is zero and no such scaling exists.
    pub fn edge_anchored(&self) -> Option<[f64; 4]> {
        let k = self.k.map(f64::from);
        let sum: f64 = k.iter().sum();
        if sum.abs() < MIN_EDGE_SUM {
            return None;
        }
        Some(k.map(|k| k / sum))
    }
}

/// Smallest `|k0 + k1 + k2 + k3|` that can be rescaled to anchor the edge.
const MIN_EDGE_SUM: f64 = 1e-9;

impl Default for Coefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f32; 4]> for Coefficients {
    fn from(k: [f32; 4]) -> Self {
        Self { k }
    }
}

/// Invalid distortion parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WarpError {
    #[error("distortion coefficients must be finite, got {0:?}")]
    NonFiniteCoefficients([f32; 4]),

    #[error("distortion coefficients {0:?} sum to zero, the image edge cannot be anchored")]
    ZeroSum([f32; 4]),

    #[error("aspect ratio must be positive and finite, got {0}")]
    InvalidAspect(f32),
}

impl WarpError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Barrel/pincushion radial distortion (Dersch polynomial, as used by ImageMagick).
///
/// Texcoords are mapped onto an aspect-corrected unit disk centred on the
/// image: the disk touches the top and bottom edges, and the horizontal axis is
/// scaled by the source aspect ratio so the disk stays circular in pixels.
///
/// Edge-anchoring: the outer radius `r = 1` is a fixed point for every
/// coefficient set: the polynomial is divided once, at construction, by
/// `k0 + k1 + k2 + k3` (its value at `r = 1`). A zero sum is rejected.
///
/// Centre: at `r = 0` the direction vector is undefined; it is taken to be
/// `(0, 0)`, so the centre maps to itself instead of producing NaN.
#[derive(Debug, Clone)]
pub struct Barrel {
    coefficients: Coefficients,
    k: [f64; 4],
    aspect: f64,
    x_offset: f64,
}

impl Barrel {
    /// Creates a distortion for a source with `aspect = width / height`.
    pub fn new(coefficients: Coefficients, aspect: f32) -> Result<Self, WarpError> {
        if !coefficients.is_finite() {
            return Err(WarpError::NonFiniteCoefficients(coefficients.k));
        }
        if !(aspect.is_finite() && aspect > 0.0) {
            return Err(WarpError::InvalidAspect(aspect));
        }

        let k = coefficients
            .edge_anchored()
            .ok_or(WarpError::ZeroSum(coefficients.k))?;

        let aspect = f64::from(aspect);
        Ok(Self {
            coefficients,
            k,
            aspect,
            x_offset: (aspect - 1.0) / 2.0,
        })
    }

    /// Convenience constructor from a source resolution in pixels.
    pub fn for_resolution(coefficients: Coefficients, width: u32, height: u32) -> Result<Self, WarpError> {
        let aspect = if height == 0 { 0.0 } else { width as f32 / height as f32 };
        Self::new(coefficients, aspect)
    }

    /// Coefficients as supplied (before edge normalization).
    pub fn coefficients(&self) -> Coefficients {
        self.coefficients
    }

    /// Distorted radius for an undistorted radius on the unit disk.
    #[inline]
    pub fn radius(&self, r: f64) -> f64 {
        let [k0, k1, k2, k3] = self.k;
        r * (((k0 * r + k1) * r + k2) * r + k3)
    }
}

impl Distortion for Barrel {
    fn remap(&self, [x, y]: [f32; 2]) -> [f32; 2] {
        let dx = ((f64::from(x) * self.aspect - self.x_offset) * 2.0) - 1.0;
        let dy = (f64::from(y) * 2.0) - 1.0;
        let r = (dx * dx + dy * dy).sqrt();

        let (x_dir, y_dir) = if r == 0.0 { (0.0, 0.0) } else { (dx / r, dy / r) };

        let new_r = self.radius(r);

        let out_x = (((new_r * x_dir + 1.0) / 2.0) + self.x_offset) / self.aspect;
        let out_y = (new_r * y_dir + 1.0) / 2.0;

        [finite_or_zero(out_x as f32), finite_or_zero(out_y as f32)]
    }
}

#[inline]
fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn close(a: [f32; 2], b: [f32; 2]) -> bool {
        (a[0] - b[0]).abs() < EPS && (a[1] - b[1]).abs() < EPS
    }

    fn sample_grid() -> impl Iterator<Item = [f32; 2]> {
        (0..=20).flat_map(|j| (0..=20).map(move |i| [i as f32 / 20.0, j as f32 / 20.0]))
    }

    #[test]
    fn default_coefficients_are_identity() {
        let b = Barrel::new(Coefficients::default(), 640.0 / 480.0).unwrap();
        for p in sample_grid() {
            assert!(close(b.remap(p), p), "{p:?} -> {:?}", b.remap(p));
        }
    }

    #[test]
    fn k3_is_normalized_once() {
        let c = Coefficients::new(0.1, 0.2, 0.3, 1.0);
        let b = Barrel::new(c, 1.0).unwrap();
        let before = b.remap([0.3, 0.7]);
        for _ in 0..10 {
            let _ = b.remap([0.9, 0.1]);
        }
        assert_eq!(b.remap([0.3, 0.7]), before);
        assert_eq!(b.coefficients(), c);
    }

    #[test]
    fn unit_radius_is_fixed_for_any_coefficients() {
        let sets = [
            Coefficients::new(0.0, 0.0, 0.0, 1.0),
            Coefficients::new(0.2, -0.1, 0.05, 1.0),
            Coefficients::new(-0.5, 0.3, 0.0, 0.8),
            Coefficients::new(3.0, 2.0, 1.0, 0.0),
        ];
        for c in sets {
            let b = Barrel::new(c, 4.0 / 3.0).unwrap();
            assert!((b.radius(1.0) - 1.0).abs() < 1e-12, "{c:?}");

            // Top and bottom centre lie on the unit circle.
            assert!(close(b.remap([0.5, 0.0]), [0.5, 0.0]), "{c:?}");
            assert!(close(b.remap([0.5, 1.0]), [0.5, 1.0]), "{c:?}");
        }
    }

    #[test]
    fn centre_maps_to_itself_without_nan() {
        let b = Barrel::new(Coefficients::new(0.4, -0.2, 0.1, 1.0), 640.0 / 480.0).unwrap();
        let out = b.remap([0.5, 0.5]);
        assert!(out[0].is_finite() && out[1].is_finite());
        assert!(close(out, [0.5, 0.5]));
    }

    #[test]
    fn outputs_are_finite_over_unit_square() {
        let sets = [
            Coefficients::new(0.0, 0.0, 0.0, 1.0),
            Coefficients::new(1.0, -1.0, 0.5, 2.0),
            Coefficients::new(-4.0, 3.0, -2.0, 0.1),
        ];
        for c in sets {
            let b = Barrel::new(c, 16.0 / 9.0).unwrap();
            for p in sample_grid() {
                let [x, y] = b.remap(p);
                assert!(x.is_finite() && y.is_finite(), "{c:?} {p:?}");
            }
        }
    }

    #[test]
    fn positive_k2_pulls_midpoints_toward_centre() {
        // k / 1.2 = {0, 0, 1/6, 5/6}; r = 0.5 -> r' = 0.5 * (0.5 / 6 + 5 / 6) = 0.458333
        let b = Barrel::new(Coefficients::new(0.0, 0.0, 0.2, 1.0), 1.0).unwrap();
        let [_, y] = b.remap([0.5, 0.25]);
        assert!((y - (1.0 - 0.5 * 1.1 / 1.2) / 2.0).abs() < EPS, "y = {y}");
    }

    #[test]
    fn scaled_coefficients_give_the_same_warp() {
        let a = Barrel::new(Coefficients::new(0.1, -0.2, 0.3, 1.0), 4.0 / 3.0).unwrap();
        let b = Barrel::new(Coefficients::new(0.2, -0.4, 0.6, 2.0), 4.0 / 3.0).unwrap();
        for p in sample_grid() {
            assert!(close(a.remap(p), b.remap(p)), "{p:?}");
        }
    }

    #[test]
    fn zero_sum_coefficients_are_rejected() {
        let c = Coefficients::new(1.0, -1.0, 0.5, -0.5);
        assert_eq!(c.edge_anchored(), None);
        let err = Barrel::new(c, 1.0).unwrap_err();
        assert_eq!(err, WarpError::ZeroSum([1.0, -1.0, 0.5, -0.5]));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_non_finite_input() {
        let err = Barrel::new(Coefficients::new(f32::NAN, 0.0, 0.0, 1.0), 1.0).unwrap_err();
        assert!(matches!(err, WarpError::NonFiniteCoefficients(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert!(matches!(
            Barrel::new(Coefficients::IDENTITY, 0.0),
            Err(WarpError::InvalidAspect(_))
        ));
        assert!(matches!(
            Barrel::for_resolution(Coefficients::IDENTITY, 640, 0),
            Err(WarpError::InvalidAspect(_))
        ));
    }
}
