//! Mesh data-frame portal
//!
//! Bridges the 6LoWPAN capture pipe to TCP subscribers, one JSON record per
//! frame.
//!
//! Run with: cargo run --example lowpan_portal [DEVICE] [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example lowpan_portal                            # /tmp/lowpan_fifo, 0.0.0.0:8763
//!   cargo run --example lowpan_portal /tmp/other_fifo 0.0.0.0:9000
//!
//! Subscribe with netcat:
//!   printf 'subscribe\n' | nc localhost 8763

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use radio_portal::{BridgeError, FanoutReader, PortalServer, Protocol, ServerConfig};

const DEFAULT_DEVICE: &str = "/tmp/lowpan_fifo";
const DEFAULT_BIND: &str = "0.0.0.0:8763";

fn print_usage() {
    eprintln!("Usage: lowpan_portal [DEVICE] [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  DEVICE       Capture pipe path (default: {DEFAULT_DEVICE})");
    eprintln!("  BIND_ADDR    Address to listen on (default: {DEFAULT_BIND})");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let device_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_DEVICE);
    let bind_addr: SocketAddr = args
        .get(2)
        .map(String::as_str)
        .unwrap_or(DEFAULT_BIND)
        .parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("radio_portal=debug".parse()?)
                .add_directive("lowpan_portal=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr);
    let server = PortalServer::new(config, Protocol::Mesh);
    let registry = Arc::clone(server.registry());

    let device = tokio::fs::File::open(device_path)
        .await
        .map_err(BridgeError::Device)?;
    let reader = FanoutReader::new(device, Protocol::Mesh, Arc::clone(&registry));

    println!("6LoWPAN portal: {device_path} -> {bind_addr}");
    println!("Subscribe:      printf 'subscribe\\n' | nc {} {}", bind_addr.ip(), bind_addr.port());

    let stats = Arc::clone(registry.stats());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let snap = stats.snapshot();
            tracing::info!(
                frames_read = snap.frames_read,
                delivered = snap.frames_delivered,
                dropped = snap.frames_dropped,
                truncated = snap.decode_truncated,
                unknown_type = snap.decode_unknown_type,
                subscribers = snap.active_subscribers,
                "Bridge stats"
            );
        }
    });

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {e}");
            }
        }
        result = reader.run() => {
            if let Err(e) = result {
                eprintln!("Device error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
