//! # Utility Modules
//!
//! Supporting utilities for payload processing, logging, and metrics.
//!
//! ## Components
//! - **Compression**: LZ4, Zstd and ChaCha20-Poly1305 processing stages
//! - **Logging**: `tracing-subscriber` setup from configuration
//! - **Metrics**: Thread-safe dispatch counters
//!
//! ## Security
//! - Decompression bomb protection (configurable limit, 16MB default)
//! - Random nonces from the OS RNG (getrandom)

pub mod compression;
pub mod logging;
pub mod metrics;

pub use metrics::{DispatchMetrics, MetricsSnapshot};
