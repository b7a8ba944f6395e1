//! spot_editor - annotate parking spots over a reference frame
//!
//! Each subcommand loads the spot file (a missing file starts empty),
//! applies one edit, and writes the file back. Corners may be given in any
//! order; the stored rectangle is normalised.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use parking_occupancy::render::{draw_plan, LabelFont, RenderPlan};
use parking_occupancy::EditorSession;

#[derive(Parser, Debug)]
#[command(name = "spot_editor", about = "Edit the parking spot file")]
struct Args {
    /// Spot file to edit.
    #[arg(long, default_value = "spots.json", global = true)]
    spots: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a spot from two opposite corners
    Add { x1: i32, y1: i32, x2: i32, y2: i32 },

    /// Remove the most recently added spot
    Undo,

    /// Remove every spot
    Clear,

    /// Print the spots with their 1-based numbers
    List,

    /// Draw the spots over a reference frame
    Preview {
        /// Reference frame (see extract_frame).
        #[arg(long, default_value = "video_frame.jpg")]
        frame: PathBuf,
        #[arg(long, default_value = "spots_preview.jpg")]
        output: PathBuf,
        /// TrueType font for the spot numbers.
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let mut session = EditorSession::load(&args.spots)?;

    match args.command {
        Command::Add { x1, y1, x2, y2 } => {
            session.begin_drag(x1, y1);
            session
                .end_drag(x2, y2)
                .ok_or_else(|| anyhow!("corners ({x1}, {y1}) and ({x2}, {y2}) enclose no area"))?;
            session.save(&args.spots)?;
        }
        Command::Undo => {
            if session.undo().is_some() {
                session.save(&args.spots)?;
            }
        }
        Command::Clear => {
            session.clear();
            session.save(&args.spots)?;
        }
        Command::List => {
            if session.is_empty() {
                println!("no spots in {}", args.spots.display());
            }
            for spot in session.into_store().iter() {
                println!("{:>3}  {}", spot.label(), spot.rect);
            }
        }
        Command::Preview {
            frame,
            output,
            font,
        } => {
            let mut img = image::open(&frame)
                .with_context(|| format!("failed to open reference frame {}", frame.display()))?
                .to_rgb8();
            let font = match &font {
                Some(path) => LabelFont::from_path(path)?,
                None => LabelFont::embedded()?,
            };
            let mut plan = RenderPlan::default();
            for (index, rect) in session.spots().iter().enumerate() {
                plan.push_spot(*rect, false, Some((index + 1).to_string()));
            }
            draw_plan(&mut img, &plan, &font);
            img.save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            log::info!(
                "drew {} spots over {} into {}",
                session.len(),
                frame.display(),
                output.display()
            );
        }
    }
    Ok(())
}
