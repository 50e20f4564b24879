//! # Connection
//!
//! The handler-facing half of one logical connection. It owns the handler
//! registry, the options resolver and the dispatch metrics, and exposes the
//! operations library consumers use: registering and removing handlers and
//! shutdown listeners, querying options, and (for the I/O layer) handing in
//! arrived packets and closing.
//!
//! ## Receive path
//! `handle_incoming_packet` resolves options, dispatches to local handlers,
//! and falls back to the global registry when the packet type has no local
//! handlers. It never
//! fails; problems are logged and counted in [`DispatchMetrics`].

use crate::config::{ConnectionConfig, ProcessingConfig};
use crate::core::identifier::{BuiltinResolver, SerializerResolver};
use crate::core::options::SendReceiveOptions;
use crate::error::{DispatchError, Result};
use crate::protocol::dispatcher::{deliver, Delivery};
use crate::protocol::handler::HandlerFn;
use crate::protocol::header::PacketHeader;
use crate::protocol::registry::HandlerRegistry;
use crate::protocol::resolver::{GlobalRegistry, NoGlobalHandlers, OptionsResolver};
use crate::protocol::shutdown::{notify_all, ShutdownListener};
use crate::utils::metrics::DispatchMetrics;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub struct Connection {
    id: u64,
    registry: HandlerRegistry,
    resolver: OptionsResolver,
    default_options: SendReceiveOptions,
    processing: ProcessingConfig,
    metrics: DispatchMetrics,
    closed: AtomicBool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("default_options", &self.default_options)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Stand-alone connection: no global handlers, built-in serializers.
    /// The connection default options double as the global defaults.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let global = Arc::new(NoGlobalHandlers::new(config.options.default_options()));
        Self::with_collaborators(config, global, Arc::new(BuiltinResolver))
    }

    pub fn with_collaborators(
        config: ConnectionConfig,
        global: Arc<dyn GlobalRegistry>,
        serializers: Arc<dyn SerializerResolver>,
    ) -> Result<Self> {
        let mut errors = config.options.validate();
        errors.extend(config.processing.validate());
        if !errors.is_empty() {
            return Err(DispatchError::ConfigError(format!(
                "Invalid connection configuration:\n  - {}",
                errors.join("\n  - ")
            )));
        }

        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(connection_id = id, "Connection created");

        Ok(Self {
            id,
            registry: HandlerRegistry::new(),
            resolver: OptionsResolver::new(global, serializers),
            default_options: config.options.default_options(),
            processing: config.processing,
            metrics: DispatchMetrics::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn default_options(&self) -> &SendReceiveOptions {
        &self.default_options
    }

    pub fn processing(&self) -> &ProcessingConfig {
        &self.processing
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Register a handler for `packet_type`. `None` options means the
    /// connection default.
    pub fn append_packet_handler<T>(
        &self,
        packet_type: &str,
        handler: HandlerFn<T>,
        options: Option<SendReceiveOptions>,
    ) -> Result<()>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.registry.register(packet_type, handler, options)
    }

    pub fn remove_packet_handler<T: ?Sized>(
        &self,
        packet_type: &str,
        handler: &Arc<T>,
    ) -> Result<bool> {
        self.registry.unregister(packet_type, handler)
    }

    pub fn remove_all_packet_handlers(&self, packet_type: &str) -> Result<()> {
        self.registry.unregister_all(packet_type)
    }

    pub fn remove_all_handlers(&self) -> Result<()> {
        self.registry.unregister_all_types()
    }

    pub fn add_shutdown_listener(&self, listener: ShutdownListener) -> Result<()> {
        self.registry.add_shutdown_listener(listener)
    }

    pub fn remove_shutdown_listener(&self, listener: &ShutdownListener) -> Result<bool> {
        self.registry.remove_shutdown_listener(listener)
    }

    pub fn has_shutdown_listeners(&self) -> Result<bool> {
        self.registry.has_shutdown_listeners()
    }

    pub fn shutdown_listener_count(&self) -> Result<usize> {
        self.registry.shutdown_listener_count()
    }

    /// Options registered for `packet_type`, or the connection default
    pub fn packet_type_options(&self, packet_type: &str) -> Result<SendReceiveOptions> {
        Ok(self
            .registry
            .lookup_options(packet_type)?
            .unwrap_or_else(|| self.default_options.clone()))
    }

    /// Options that would govern a packet with this header right now
    pub fn effective_options(&self, header: &PacketHeader) -> Result<SendReceiveOptions> {
        self.resolver
            .resolve(header, &self.registry, &self.default_options)
    }

    /// Entry point for the receive loop. Returns whether any local or global
    /// handler consumed the packet. Each packet lands in exactly one of the
    /// handled, unhandled or dropped counters. A packet dropped on the local
    /// path is not offered to global handlers.
    pub fn handle_incoming_packet(&self, header: &PacketHeader, payload: &[u8]) -> bool {
        self.metrics.packet_received();
        let packet_type = header.packet_type();

        if self.is_closed() {
            trace!(connection_id = self.id, packet_type, "Packet arrived after close");
            self.metrics.packet_dropped();
            return false;
        }

        let options = match self.effective_options(header) {
            Ok(options) => options,
            Err(e) => {
                self.metrics.resolution_failed();
                self.metrics.packet_dropped();
                error!(
                    connection_id = self.id,
                    packet_type,
                    error = %e,
                    "Failed to resolve packet options, dropping packet"
                );
                return false;
            }
        };

        match deliver(self, header, payload, Some(&options)) {
            Delivery::Handled => return true,
            Delivery::Dropped => return false,
            Delivery::NoLocalHandlers => {}
        }

        let handled = self
            .resolver
            .global()
            .trigger_global_handlers(header, self, payload, &options);
        if handled {
            self.metrics.packet_handled_globally();
        } else {
            self.metrics.packet_unhandled();
            debug!(connection_id = self.id, packet_type, "No handler consumed packet");
        }
        handled
    }

    /// Mark the connection closed and run shutdown listeners. Only the first
    /// call does anything; it returns `true`.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let listeners = self.registry.shutdown_snapshot().unwrap_or_else(|e| {
            error!(connection_id = self.id, error = %e, "Failed to read shutdown listeners");
            Vec::new()
        });
        let failures = notify_all(&listeners, self);

        info!(
            connection_id = self.id,
            listeners = listeners.len(),
            failures,
            "Connection closed"
        );
        self.metrics.log_summary(self.id);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
