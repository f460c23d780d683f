mod app;
mod cli;
mod signal;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use winit::dpi::LogicalSize;

use warpcam_engine::device::GpuInit;
use warpcam_engine::logging::{init_logging, LoggingConfig};
use warpcam_engine::window::{Runtime, RuntimeConfig};

use crate::app::WarpApp;
use crate::cli::{Cli, Settings};

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..Default::default()
    });

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = Settings::from_cli(cli)?;
    log::info!(
        "coefficients {:?}, {}x{} mesh, capture {}",
        settings.coefficients.k,
        settings.grid.width_points,
        settings.grid.height_points,
        settings.capture
    );

    let stop = signal::install()?;

    let config = RuntimeConfig {
        title: "warpcam".to_string(),
        initial_size: LogicalSize::new(settings.capture.width as f64, settings.capture.height as f64),
    };

    let app = Runtime::run(config, GpuInit::default(), WarpApp::new(settings, stop))?;

    if signal::requested() {
        log::info!("caught signal, shutting down");
    }

    app.finish()
}
