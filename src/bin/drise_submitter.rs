//! drise-submitter — CLI client that submits a single tiled-image or
//! animation render job to a `drise-server` (C14, §4.14).

use clap::{Parser, Subcommand};
use rise_engine::config::Options;
use rise_engine::net::protocol::{SubmitJobAnim, SubmitJobBasic};
use rise_engine::net::submitter::{submit_animation, submit_tiled};
use std::net::TcpStream;

/// drise-submitter — submit a render job to the farm
#[derive(Parser, Debug)]
#[command(name = "drise-submitter", version, about = "Submit a tiled-image or animation render job")]
struct Cli {
    #[command(subcommand)]
    job: Job,

    /// Path to a drise.options file (defaults used if absent)
    #[arg(long, default_value = "drise.options")]
    options: String,

    /// Handshake secret the server expects
    #[arg(long, default_value = "rise-engine")]
    secret: String,
}

#[derive(Subcommand, Debug)]
enum Job {
    /// Submit a single still-image render split into a tile grid
    Tiled {
        scene: String,
        rx: u32,
        ry: u32,
        output: String,
        gx: u32,
        gy: u32,
    },
    /// Submit a multi-frame animation render, one action per frame
    Animation { scene: String, rx: u32, ry: u32, output: String, frames: u32 },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let options = Options::load(&cli.options).unwrap_or_else(|_| Options::parse(""));
    let address = format!("{}:{}", options.server_name(), options.port_number());

    let mut stream = TcpStream::connect(&address).unwrap_or_else(|e| {
        log::error!("failed to connect to {address}: {e}");
        std::process::exit(1);
    });

    let result = match cli.job {
        Job::Tiled { scene, rx, ry, output, gx, gy } => {
            submit_tiled(&mut stream, &cli.secret, &SubmitJobBasic { filename: scene, rx, ry, output, gx, gy })
        }
        Job::Animation { scene, rx, ry, output, frames } => {
            submit_animation(&mut stream, &cli.secret, &SubmitJobAnim { filename: scene, rx, ry, output, frames })
        }
    };

    match result {
        Ok(()) => log::info!("job submitted successfully"),
        Err(e) => {
            log::error!("submission failed: {e}");
            std::process::exit(1);
        }
    }
}
