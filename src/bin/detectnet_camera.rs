//! detectnet-camera - locate objects in a live camera stream
//!
//! Opens the camera, loads a detection network and runs the perception loop until
//! Ctrl-C, the display is closed, or `--frames` is reached. Detections are printed to
//! stdout; diagnostics go to the log (RUST_LOG).
//!
//! Exit status: 0 after a requested stop, 1 when startup fails or the loop stops on
//! a device, engine or display failure.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use perception_loop::cli::{camera_usage, CameraArgs};
use perception_loop::config::PerceptionConfig;
use perception_loop::detect::{EngineCapability, EngineOptions, InferenceEngine, NetworkRegistry};
use perception_loop::display::{ConsoleSink, PresentationSink};
use perception_loop::ingest::{open_camera, start, FrameSource};
use perception_loop::pipeline::{DetectionLoop, LoopConfig, RunSummary};
use perception_loop::report::Reporter;
use perception_loop::run_state::StopSignal;
use perception_loop::ui::Ui;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CameraArgs::parse();
    let registry = NetworkRegistry::builtin();
    if args.help {
        print!("{}", camera_usage(&registry));
        return ExitCode::SUCCESS;
    }

    match run(&args, &registry) {
        Ok(summary) if !summary.stop.is_failure() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("detectnet-camera: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CameraArgs, registry: &NetworkRegistry) -> Result<RunSummary> {
    let cfg = args.resolve()?;
    let ui = Ui::from_flag(&args.ui);

    let stop = StopSignal::new();
    stop.install()?;

    let mut source = {
        let stage = ui.stage("open camera");
        match open_source(&cfg) {
            Ok(source) => source,
            Err(err) => {
                stage.fail();
                return Err(err.context("failed to initialize camera device"));
            }
        }
    };
    log::info!("successfully initialized camera device {}", source.name());
    log::info!("    width:  {}", source.width());
    log::info!("    height: {}", source.height());
    log::info!("    depth:  {} (bpp)", source.pixel_depth());

    let engine = {
        let stage = ui.stage("load network");
        match load_engine(&cfg, registry) {
            Ok(engine) => engine,
            Err(err) => {
                stage.fail();
                if let Err(close_err) = source.close() {
                    log::error!("failed to close frame source: {}", close_err);
                }
                return Err(err.context("failed to load detection network"));
            }
        }
    };

    let display = {
        let _stage = ui.stage("open display");
        open_display(&cfg)
    };

    let loop_config = LoopConfig {
        capture_timeout: cfg.camera.capture_timeout,
        overlay: cfg.overlay,
        max_frames: cfg.max_frames,
    };
    let mut detection_loop =
        DetectionLoop::new(source, engine, display, loop_config, stop, Reporter::stdout())?;
    log::info!("camera open for streaming");

    Ok(detection_loop.run())
}

fn open_source(cfg: &PerceptionConfig) -> Result<Box<dyn FrameSource>> {
    let source = open_camera(&cfg.camera.device, cfg.camera.width, cfg.camera.height)?;
    let source = start(source)
        .with_context(|| format!("failed to open camera {}", cfg.camera.device))?;
    Ok(source)
}

fn load_engine(
    cfg: &PerceptionConfig,
    registry: &NetworkRegistry,
) -> Result<Box<dyn InferenceEngine>> {
    let opts = EngineOptions {
        threshold: cfg.threshold,
        labels: cfg.labels.clone(),
        profile: cfg.profile,
        ..EngineOptions::default()
    };
    let engine = registry.load_for(cfg.network.as_deref(), &opts, EngineCapability::Detection)?;
    log::info!(
        "loaded network {} ({}, threshold {})",
        engine.name(),
        engine.precision_mode(),
        cfg.threshold
    );
    Ok(engine)
}

/// A display that fails to open is not fatal; the run continues headless.
fn open_display(cfg: &PerceptionConfig) -> Option<Box<dyn PresentationSink>> {
    if cfg.display.headless {
        log::info!("running headless");
        return None;
    }
    match &cfg.display.snapshot_dir {
        Some(dir) => snapshot_display(dir, cfg.display.snapshot_every),
        None => Some(Box::new(ConsoleSink::new())),
    }
}

#[cfg(feature = "image-file")]
fn snapshot_display(dir: &std::path::Path, every: u64) -> Option<Box<dyn PresentationSink>> {
    use perception_loop::display::{SnapshotConfig, SnapshotSink};

    match SnapshotSink::new(SnapshotConfig {
        dir: dir.to_path_buf(),
        every,
    }) {
        Ok(sink) => {
            log::info!("writing snapshots to {}", dir.display());
            Some(Box::new(sink))
        }
        Err(err) => {
            log::error!("failed to create snapshot display: {}", err);
            None
        }
    }
}

#[cfg(not(feature = "image-file"))]
fn snapshot_display(dir: &std::path::Path, _every: u64) -> Option<Box<dyn PresentationSink>> {
    log::error!(
        "snapshots to {} require the image-file feature, running headless",
        dir.display()
    );
    None
}
