use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use warpcam_engine::core::{App, AppControl, FrameCtx};
use warpcam_engine::device::Gpu;
use warpcam_engine::feed::{Feed, RgbImage, TestPatternSource};
use warpcam_engine::mesh::{build_mesh, MeshBuffers};
use warpcam_engine::render::mvp::unit_quad_to_ndc;
use warpcam_engine::render::{Drawcall, DrawcallDesc, ShaderPair};
use warpcam_engine::time::FpsMeter;
use warpcam_engine::warp::Barrel;

use crate::cli::Settings;

const CLEAR: wgpu::Color = wgpu::Color { r: 0.0, g: 0.0, b: 1.0, a: 1.0 };

/// Inset size of the second drawcall, as a fraction of the window.
const INSET_SCALE: f32 = 0.3;

const CHECKER_CELL: u32 = 40;

/// Feed plus the drawcalls sampling it, in dispatch order.
struct Scene {
    feed: Feed,
    drawcalls: Vec<Drawcall>,
}

/// Per-frame loop: acquire, clear, dispatch every drawcall, present, release.
pub struct WarpApp {
    settings: Settings,
    stop: &'static AtomicBool,
    scene: Option<Scene>,
    fps: FpsMeter,
    failure: Option<anyhow::Error>,
}

impl WarpApp {
    pub fn new(settings: Settings, stop: &'static AtomicBool) -> Self {
        Self {
            settings,
            stop,
            scene: None,
            fps: FpsMeter::new(Instant::now()),
            failure: None,
        }
    }

    /// Terminates the feed and reports how the loop ended.
    pub fn finish(mut self) -> Result<()> {
        if let Some(Scene { feed, drawcalls }) = self.scene.take() {
            drop(drawcalls);
            feed.terminate();
        }
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn build_scene(&self, gpu: &Gpu<'_>) -> Result<Scene> {
        let (device, queue) = (gpu.device(), gpu.queue());

        let feed = match &self.settings.image {
            Some(path) => Feed::still(device, queue, &RgbImage::load(path)?)?,
            None if self.settings.checkerboard => {
                let capture = self.settings.capture;
                let image = RgbImage::checkerboard(capture.width, capture.height, CHECKER_CELL);
                Feed::still(device, queue, &image)?
            }
            None => {
                let source = TestPatternSource::open(self.settings.capture)
                    .context("failed to open frame source")?;
                Feed::camera(Box::new(source), device, queue)?
            }
        };
        let planar = matches!(feed, Feed::Camera(_));

        let (width, height) = feed.resolution();
        let barrel = Barrel::for_resolution(self.settings.coefficients, width, height)?;
        MeshBuffers::check_limits(self.settings.grid, &device.limits())?;
        let mesh = build_mesh(self.settings.grid, Some(&barrel))?;
        let mesh = Arc::new(MeshBuffers::upload(device, &mesh)?);

        let default_shaders = if planar { ShaderPair::yuv() } else { ShaderPair::rgb() };
        let shaders = self.settings.shaders.as_ref().unwrap_or(&default_shaders);

        let drawcalls = [("full", 1.0), ("inset", INSET_SCALE)]
            .into_iter()
            .map(|(label, scale)| {
                let mvp = unit_quad_to_ndc(scale);
                let desc = if planar {
                    DrawcallDesc::yuv(label, mvp)
                } else {
                    DrawcallDesc::rgb(label, mvp)
                };
                Drawcall::new(device, gpu.surface_format(), shaders, mesh.clone(), desc)
                    .with_context(|| format!("failed to set up drawcall '{label}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Scene { feed, drawcalls })
    }

    fn fail(&mut self, err: anyhow::Error) -> AppControl {
        self.failure.get_or_insert(err);
        AppControl::Exit
    }
}

impl App for WarpApp {
    fn on_init(&mut self, gpu: &Gpu<'_>) -> Result<()> {
        let info = gpu.adapter_info();
        log::info!("adapter: {} ({:?})", info.name, info.backend);
        log::info!("driver: {} {}", info.driver, info.driver_info);

        self.scene = Some(self.build_scene(gpu)?);
        Ok(())
    }

    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                AppControl::Exit
            }
            _ => AppControl::Continue,
        }
    }

    fn should_exit(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.should_exit() {
            return AppControl::Exit;
        }
        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Exit;
        };

        if let Err(err) = scene.feed.acquire_frame() {
            return self.fail(anyhow::Error::new(err).context("failed to acquire frame"));
        }

        let Scene { feed, drawcalls } = &*scene;
        let rendered = ctx.render(CLEAR, |rctx, target| {
            for dc in drawcalls {
                dc.dispatch(rctx, target, feed)
                    .with_context(|| format!("drawcall '{}' failed", dc.label()))?;
            }
            Ok(())
        });

        // Released whether or not the frame made it to the screen.
        let released = scene.feed.release_frame();

        let control = match rendered {
            Ok(control) => control,
            Err(err) => return self.fail(err),
        };
        if let Err(err) = released {
            return self.fail(err.into());
        }

        if let Some(fps) = self.fps.tick(ctx.time.now) {
            log::info!("{fps:.3} fps");
        }

        control
    }
}
