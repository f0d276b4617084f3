//! Fan-out reader
//!
//! The single owner of the device handle. Each successful read produces
//! exactly one frame (the hardware frames its output per read; nothing is
//! reassembled here), which is copied to every registered subscriber.
//!
//! A read error or EOF means the device is gone: the reader closes every
//! subscriber channel and terminates the bridge.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{BridgeError, Result};
use crate::protocol::Protocol;
use crate::registry::SubscriberRegistry;

/// Single reader of the raw device, fanning frames out via the registry
pub struct FanoutReader<R> {
    device: R,
    protocol: Protocol,
    registry: Arc<SubscriberRegistry>,
}

impl<R: AsyncRead + Unpin> FanoutReader<R> {
    /// Create a reader over an already-open, non-blocking device handle
    pub fn new(device: R, protocol: Protocol, registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            device,
            protocol,
            registry,
        }
    }

    /// Run the read loop until the device fails
    ///
    /// On any exit, every subscriber channel is closed first so blocked
    /// handlers wake up and deregister.
    pub async fn run(mut self) -> Result<()> {
        let result = self.read_loop().await;
        self.registry.close_all().await;
        result
    }

    /// Run the read loop until the device fails or `shutdown` resolves
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received, stopping fan-out reader");
                Ok(())
            }
            result = self.read_loop() => result,
        };

        self.registry.close_all().await;
        result
    }

    async fn read_loop(&mut self) -> Result<()> {
        // One read = one frame; the buffer is sized to the protocol maximum.
        let mut buf = vec![0u8; self.protocol.max_frame_size()];

        tracing::info!(
            protocol = %self.protocol,
            read_size = buf.len(),
            "Fan-out reader started"
        );

        loop {
            match self.device.read(&mut buf).await {
                Ok(0) => {
                    tracing::error!(protocol = %self.protocol, "Device closed (EOF)");
                    return Err(BridgeError::Device(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "device closed",
                    )));
                }
                Ok(n) => {
                    let frame = Bytes::copy_from_slice(&buf[..n]);
                    self.registry
                        .stats()
                        .frames_read
                        .fetch_add(1, Ordering::Relaxed);

                    tracing::trace!(frame_len = n, "Frame read from device");
                    self.registry.fanout(frame).await;
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    // No data this readiness cycle; take no action.
                    continue;
                }
                Err(e) => {
                    tracing::error!(protocol = %self.protocol, error = %e, "Device read failed");
                    return Err(BridgeError::Device(e));
                }
            }
        }
    }
}
