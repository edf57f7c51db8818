//! Application entry point for the spinfield viewer.
//!
//! This binary sets up logging, loads the simulation parameters and
//! delegates all interactive logic and rendering to [`Viewer`] from the
//! `viewer` module.

mod logging;
mod viewer;

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use spinfield_core::Config;
use viewer::Viewer;

#[derive(Parser, Debug)]
#[command(about = "Interactive spin-particle simulation on a torus")]
struct Args {
    /// YAML preset with simulation parameters; missing keys use defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let cfg: Config = serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("checking {}", path.display()))?;
    Ok(cfg)
}

/// Starts the native eframe application.
///
/// The window is titled `"spinfield"`; all UI state and rendering are
/// handled by [`Viewer`].
fn main() -> Result<()> {
    let _logger = logging::setup()?;
    let args = Args::parse();

    let cfg = load_config(args.config.as_deref())?;
    log::info!(
        "starting with {} distance, {} boundary, {} ticks/s",
        cfg.metric,
        if cfg.boundary.wraps() { "wrapping" } else { "clamped" },
        cfg.ticks_per_second
    );
    let viewer = Viewer::new(cfg)?;

    eframe::run_native(
        "spinfield",
        eframe::NativeOptions::default(),
        Box::new(move |_cc| Ok(Box::new(viewer))),
    )
    .map_err(|err| anyhow!("window terminated: {err}"))
}
