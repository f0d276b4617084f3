//! Beacon advertisement portal
//!
//! Bridges the BLE sniffer character device to TCP subscribers, one JSON
//! record per advertisement.
//!
//! Run with: cargo run --example ble_portal [DEVICE] [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example ble_portal                               # /dev/nrf51822_1, 0.0.0.0:8764
//!   cargo run --example ble_portal /dev/nrf51822_2               # custom device
//!   cargo run --example ble_portal /dev/nrf51822_1 0.0.0.0:9000  # custom bind address
//!
//! Subscribe with netcat:
//!   printf 'subscribe\n' | nc localhost 8764

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use radio_portal::{BridgeError, FanoutReader, PortalServer, Protocol, ServerConfig};

const DEFAULT_DEVICE: &str = "/dev/nrf51822_1";
const DEFAULT_BIND: &str = "0.0.0.0:8764";

fn print_usage() {
    eprintln!("Usage: ble_portal [DEVICE] [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  DEVICE       Receiver device path (default: {DEFAULT_DEVICE})");
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
                .add_directive("ble_portal=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr);
    let server = PortalServer::new(config, Protocol::Beacon);
    let registry = Arc::clone(server.registry());

    let device = tokio::fs::File::open(device_path)
        .await
        .map_err(BridgeError::Device)?;
    let reader = FanoutReader::new(device, Protocol::Beacon, Arc::clone(&registry));

    println!("BLE portal: {device_path} -> {bind_addr}");
    println!("Subscribe:  printf 'subscribe\\n' | nc {} {}", bind_addr.ip(), bind_addr.port());

    // Periodic counter dump so dropped/undecodable frames stay visible
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
