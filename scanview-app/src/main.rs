//! Scanview Application
//!
//! Headless driver for the scanview core: reconstructs a scanned point cloud
//! and plays the reveal effect, or loops a recorded frame sequence.
//! Progress is reported through the log.

mod app;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scanview - scanned mesh reveal and sequence playback
#[derive(Parser, Debug)]
#[command(name = "scanview")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON viewer configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Presentation frame rate
    #[arg(long, global = true, default_value_t = 60)]
    fps: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconstruct a PLY point cloud and play the reveal animation
    Reveal {
        /// Point cloud to reconstruct
        cloud: PathBuf,

        /// Seconds of animation to run after the mesh appears
        #[arg(short, long, default_value_t = 8.0)]
        seconds: f64,

        /// Override the configured meshing resolution
        #[arg(short, long)]
        resolution: Option<u32>,
    },
    /// Loop a directory of PLY frames
    Play {
        /// Directory holding the recorded frames
        dir: PathBuf,

        /// Seconds of playback before dismissing
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f64,

        /// Delete the sequence directory when playback ends
        #[arg(long)]
        delete_on_exit: bool,
    },
}

fn main() {
    app::init_tracing();

    let args = Args::parse();
    let result = app::load_config(args.config.as_deref()).and_then(|config| {
        let options = app::RunOptions::new(args.fps)?;
        match args.command {
            Command::Reveal {
                cloud,
                seconds,
                resolution,
            } => app::run_reveal(config, &cloud, seconds, resolution, options),
            Command::Play {
                dir,
                seconds,
                delete_on_exit,
            } => app::run_play(config, &dir, seconds, delete_on_exit, options),
        }
    });

    if let Err(e) = result {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
