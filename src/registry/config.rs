//! Registry configuration

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Per-subscriber queue depth, in frames
    ///
    /// When a subscriber's queue is full the new frame is dropped for that
    /// subscriber only and the subscriber is marked degraded; the reader is
    /// never blocked.
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

impl RegistryConfig {
    /// Set the per-subscriber queue depth (minimum 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}
