//! extract_frame - save the first frame of an input as the annotation reference

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use parking_occupancy::{FileConfig, FileSource};

#[derive(Parser, Debug)]
#[command(name = "extract_frame", about = "Write the first frame of a video as a JPEG")]
struct Args {
    /// Video, image, or stub:// source.
    input: String,
    #[arg(long, default_value = "video_frame.jpg")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut source = FileSource::new(FileConfig {
        path: args.input.clone(),
        target_fps: 0,
        max_frames: Some(1),
    })?;
    source.connect()?;
    let frame = source
        .next_frame()?
        .ok_or_else(|| anyhow!("could not read a frame from {}", args.input))?;

    frame
        .to_image()?
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    log::info!(
        "wrote {}x{} frame to {}",
        frame.width,
        frame.height,
        args.output.display()
    );
    Ok(())
}
