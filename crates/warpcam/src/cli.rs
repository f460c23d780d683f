use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use warpcam_engine::feed::CaptureConfig;
use warpcam_engine::mesh::GridParams;
use warpcam_engine::render::ShaderPair;
use warpcam_engine::warp::Coefficients;

/// Shows a camera test pattern or a still image through a barrel warp mesh.
///
/// The warp is `r' = r·(k0·r³ + k1·r² + k2·r + k3)`, renormalized so the
/// image edge stays fixed. Without coefficients the image is undistorted.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Distortion coefficients `K0 K1 K2 K3`; give all four or none.
    #[arg(value_name = "K", allow_negative_numbers = true)]
    pub coefficients: Vec<f32>,

    /// Show this image (PNM or PNG) instead of the camera feed.
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,

    /// Show a generated checkerboard at the capture size instead of the camera feed.
    #[arg(long, conflicts_with = "image")]
    pub checkerboard: bool,

    /// Mesh points per axis.
    #[arg(long, default_value_t = 32)]
    pub grid: u32,

    /// Capture width in pixels.
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Capture height in pixels.
    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Capture frame rate.
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// WGSL vertex stage replacing the built-in one.
    #[arg(long, value_name = "PATH", requires = "fragment_shader")]
    pub vertex_shader: Option<PathBuf>,

    /// WGSL fragment stage replacing the built-in one.
    #[arg(long, value_name = "PATH", requires = "vertex_shader")]
    pub fragment_shader: Option<PathBuf>,

    /// Log filter in `env_logger` syntax; overrides `RUST_LOG`.
    #[arg(long, value_name = "FILTER")]
    pub log: Option<String>,
}

/// Validated run parameters.
#[derive(Debug, Clone)]
pub struct Settings {
    pub coefficients: Coefficients,
    pub grid: GridParams,
    pub capture: CaptureConfig,
    pub image: Option<PathBuf>,
    pub checkerboard: bool,
    pub shaders: Option<ShaderPair>,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let coefficients = match cli.coefficients.as_slice() {
            [] => Coefficients::IDENTITY,
            &[k0, k1, k2, k3] => Coefficients::new(k0, k1, k2, k3),
            other => bail!("expected 0 or 4 distortion coefficients, got {}", other.len()),
        };

        let capture = CaptureConfig {
            width: cli.width,
            height: cli.height,
            fps: cli.fps,
        }
        .validate()?;

        let shaders = match (&cli.vertex_shader, &cli.fragment_shader) {
            (Some(vs), Some(fs)) => {
                Some(ShaderPair::load(vs, fs).context("failed to load shader override")?)
            }
            _ => None,
        };

        Ok(Self {
            coefficients,
            grid: GridParams::square(cli.grid),
            capture,
            image: cli.image.clone(),
            checkerboard: cli.checkerboard,
            shaders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> Result<Settings> {
        let cli = Cli::try_parse_from(std::iter::once("warpcam").chain(args.iter().copied()))?;
        Settings::from_cli(&cli)
    }

    #[test]
    fn defaults_are_identity_at_vga() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.coefficients, Coefficients::IDENTITY);
        assert_eq!(s.grid, GridParams::square(32));
        assert_eq!(s.capture, CaptureConfig::default());
        assert!(s.image.is_none());
        assert!(s.shaders.is_none());
    }

    #[test]
    fn four_coefficients_accept_negatives() {
        let s = settings(&["0.1", "-0.25", "0", "1"]).unwrap();
        assert_eq!(s.coefficients, Coefficients::new(0.1, -0.25, 0.0, 1.0));
    }

    #[test]
    fn partial_coefficients_are_rejected() {
        let err = settings(&["0.1", "0.2"]).unwrap_err();
        assert!(err.to_string().contains("got 2"));
    }

    #[test]
    fn zero_capture_size_is_rejected() {
        assert!(settings(&["--width", "0"]).is_err());
    }

    #[test]
    fn shader_overrides_come_in_pairs() {
        assert!(Cli::try_parse_from(["warpcam", "--vertex-shader", "a.wgsl"]).is_err());
    }

    #[test]
    fn options_parse() {
        let s = settings(&["--grid", "8", "--fps", "30", "--image", "ref.ppm"]).unwrap();
        assert_eq!(s.grid, GridParams::square(8));
        assert_eq!(s.capture.fps, 30);
        assert_eq!(s.image, Some(PathBuf::from("ref.ppm")));
    }

    #[test]
    fn checkerboard_excludes_image() {
        assert!(settings(&["--checkerboard"]).unwrap().checkerboard);
        assert!(Cli::try_parse_from(["warpcam", "--checkerboard", "--image", "a.ppm"]).is_err());
    }
}
