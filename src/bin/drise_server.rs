//! drise-server — accepts worker/submitter/MCP connections on a TCP port,
//! dispatching each to a handler thread against a shared job engine (C13,
//! §4.14).

use clap::Parser;
use rise_engine::config::Options;
use rise_engine::job::engine::JobEngine;
use rise_engine::net::connection::ServerHandshake;
use rise_engine::net::dispatch::handle_connection;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

/// drise-server — the distributed render farm's dispatch process
#[derive(Parser, Debug)]
#[command(name = "drise-server", version, about = "Accepts worker/submitter connections and dispatches render tasks")]
struct Cli {
    /// Path to a drise.options file (defaults used if absent)
    #[arg(long, default_value = "drise.options")]
    options: String,

    /// Handshake secret clients must present
    #[arg(long, default_value = "rise-engine")]
    secret: String,

    /// Override the listen port from drise.options
    #[arg(short, long)]
    port: Option<u32>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let options = Options::load(&cli.options).unwrap_or_else(|_| Options::parse(""));
    let port = cli.port.unwrap_or_else(|| options.port_number());

    let listener = TcpListener::bind(("0.0.0.0", port as u16)).expect("failed to bind listen socket");
    log::info!("drise-server listening on port {port}");

    let engine = Arc::new(JobEngine::new());
    let handshake = Arc::new(ServerHandshake::new(cli.secret));

    for incoming in listener.incoming() {
        let mut stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to accept connection: {e}");
                continue;
            }
        };
        let engine = engine.clone();
        let handshake = handshake.clone();
        thread::spawn(move || {
            if let Err(e) = handle_connection(&mut stream, &handshake, &engine) {
                log::warn!("connection closed with error: {e}");
            }
        });
    }
}
