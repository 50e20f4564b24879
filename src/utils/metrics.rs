//! Dispatch metrics
//!
//! Atomic counters describing what happened to packets arriving on a
//! connection. Every connection owns one `DispatchMetrics`; counters use
//! relaxed ordering since they are only observed as totals.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Per-connection packet counters
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Packets handed to the receive path
    pub packets_received: AtomicU64,
    /// Packets delivered to at least one connection-local handler
    pub packets_handled_locally: AtomicU64,
    /// Packets consumed by global handlers after finding no local ones
    pub packets_handled_globally: AtomicU64,
    /// Packets with neither local nor global handlers
    pub packets_unhandled: AtomicU64,
    /// Packets dropped by a resolution or dispatch failure
    pub packets_dropped: AtomicU64,
    /// Handler invocations that returned an error or panicked
    pub handler_failures: AtomicU64,
    /// Payloads that failed to decode
    pub deserialization_failures: AtomicU64,
    /// Option resolutions that failed
    pub resolution_failures: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_handled_locally(&self) {
        self.packets_handled_locally.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_handled_globally(&self) {
        self.packets_handled_globally.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_unhandled(&self) {
        self.packets_unhandled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failed(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deserialization_failed(&self) {
        self.deserialization_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resolution_failed(&self) {
        self.resolution_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_handled_locally: self.packets_handled_locally.load(Ordering::Relaxed),
            packets_handled_globally: self.packets_handled_globally.load(Ordering::Relaxed),
            packets_unhandled: self.packets_unhandled.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            deserialization_failures: self.deserialization_failures.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
        }
    }

    /// Handled, unhandled and dropped packets. Equals `packets_received`
    /// once every packet handed in has returned.
    pub fn packets_settled(&self) -> u64 {
        let s = self.snapshot();
        s.packets_handled_locally
            + s.packets_handled_globally
            + s.packets_unhandled
            + s.packets_dropped
    }

    /// Reset all counters (useful for testing)
    pub fn reset(&self) {
        self.packets_received.store(0, Ordering::Relaxed);
        self.packets_handled_locally.store(0, Ordering::Relaxed);
        self.packets_handled_globally.store(0, Ordering::Relaxed);
        self.packets_unhandled.store(0, Ordering::Relaxed);
        self.packets_dropped.store(0, Ordering::Relaxed);
        self.handler_failures.store(0, Ordering::Relaxed);
        self.deserialization_failures.store(0, Ordering::Relaxed);
        self.resolution_failures.store(0, Ordering::Relaxed);
    }

    /// Log current metrics summary
    pub fn log_summary(&self, connection_id: u64) {
        let s = self.snapshot();
        info!(
            connection_id,
            received = s.packets_received,
            handled_locally = s.packets_handled_locally,
            handled_globally = s.packets_handled_globally,
            unhandled = s.packets_unhandled,
            dropped = s.packets_dropped,
            handler_failures = s.handler_failures,
            "Dispatch metrics summary"
        );
    }
}

/// Point-in-time copy of [`DispatchMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub packets_handled_locally: u64,
    pub packets_handled_globally: u64,
    pub packets_unhandled: u64,
    pub packets_dropped: u64,
    pub handler_failures: u64,
    pub deserialization_failures: u64,
    pub resolution_failures: u64,
}
