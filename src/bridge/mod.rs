//! Device-side half of the bridge
//!
//! One [`FanoutReader`] per bridge owns the raw device handle and feeds the
//! subscriber registry. Opening the device (non-blocking mode, raw-socket
//! setup) is the caller's job; the reader takes an already-open handle.

pub mod reader;

pub use reader::FanoutReader;
