//! recognize-image - classify a single image
//!
//! Loads one image, runs one classification and prints the result. The classifier
//! not reaching a decision is a normal outcome ("failed to classify image", exit 0);
//! a missing argument, an unreadable image or a failing network exits nonzero.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use perception_loop::cli::{image_usage, ImageArgs};
use perception_loop::detect::{EngineCapability, EngineOptions, NetworkRegistry};
use perception_loop::ingest::open_image;
use perception_loop::report::Reporter;
use perception_loop::single_shot::ClassificationRun;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = ImageArgs::parse();
    let registry = NetworkRegistry::builtin();
    if args.help {
        print!("{}", image_usage(&registry));
        return ExitCode::SUCCESS;
    }
    let Some(image) = args.image.as_deref() else {
        eprintln!("recognize-image: expected image filename as argument\n");
        eprint!("{}", image_usage(&registry));
        return ExitCode::from(2);
    };

    match run(image, &args, &registry) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("recognize-image: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(image: &str, args: &ImageArgs, registry: &NetworkRegistry) -> Result<()> {
    let source = open_image(image)?;
    let opts = EngineOptions {
        labels: args.labels().map(|p| p.to_path_buf()),
        profile: args.profile,
        ..EngineOptions::default()
    };
    let engine = registry.load_for(
        args.network.as_deref(),
        &opts,
        EngineCapability::Classification,
    )?;

    let mut reporter = Reporter::stdout();
    ClassificationRun::new(source, engine).run(&mut reporter)?;
    Ok(())
}
