//! Connection-local handler registry.
//!
//! Holds, under a single mutex:
//! - the per-packet-type handler lists (registration order = invocation order)
//! - the per-packet-type options ("unwrappers") chosen at registration
//! - the shutdown listeners
//!
//! A packet type never keeps an empty handler list, and dropping a handler
//! list always drops its unwrapper in the same critical section.
//!
//! Callers that run user code (dispatch, shutdown) take a snapshot under the
//! lock and release it first, so handlers may re-enter the registry.

use crate::core::options::SendReceiveOptions;
use crate::error::{DispatchError, Result};
use crate::protocol::handler::{callback_addr, HandlerEntry, HandlerFn, TypedHandler};
use crate::protocol::shutdown::{ShutdownListener, ShutdownNotifier};
use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub(crate) type HandlerSnapshot = Vec<Arc<dyn HandlerEntry>>;

#[derive(Default)]
struct RegistryState {
    unwrappers: HashMap<String, SendReceiveOptions>,
    handlers: HashMap<String, HandlerSnapshot>,
    shutdown: ShutdownNotifier,
}

impl RegistryState {
    fn prune(&mut self, packet_type: &str) {
        self.handlers.remove(packet_type);
        self.unwrappers.remove(packet_type);
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    state: Mutex<RegistryState>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| DispatchError::LockPoisoned)
    }

    /// Register `callback` for `packet_type`.
    ///
    /// `options` of `None` means "use the default options". The first
    /// registration with explicit options fixes them for the packet type;
    /// later registrations must pass equal options.
    pub fn register<T>(
        &self,
        packet_type: &str,
        callback: HandlerFn<T>,
        options: Option<SendReceiveOptions>,
    ) -> Result<()>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        if let Some(options) = &options {
            options.validate()?;
        }

        let mut state = self.lock()?;

        match (state.unwrappers.get(packet_type), &options) {
            (Some(existing), Some(requested)) if existing != requested => {
                return Err(DispatchError::OptionsConflict {
                    packet_type: packet_type.to_string(),
                });
            }
            (Some(_), None) => {
                return Err(DispatchError::OptionsConflict {
                    packet_type: packet_type.to_string(),
                });
            }
            _ => {}
        }

        if let Some(list) = state.handlers.get(packet_type) {
            let addr = callback_addr(&callback);
            if list.iter().any(|entry| entry.callback_addr() == addr) {
                return Err(DispatchError::DuplicateHandler {
                    packet_type: packet_type.to_string(),
                });
            }
            if list
                .first()
                .is_some_and(|entry| entry.payload_type() != TypeId::of::<T>())
            {
                return Err(DispatchError::PayloadTypeMismatch {
                    packet_type: packet_type.to_string(),
                });
            }
        }

        if let Some(options) = options {
            state
                .unwrappers
                .entry(packet_type.to_string())
                .or_insert(options);
        }
        let list = state.handlers.entry(packet_type.to_string()).or_default();
        list.push(Arc::new(TypedHandler::new(callback)));

        debug!(
            packet_type,
            handlers = list.len(),
            payload = std::any::type_name::<T>(),
            "Registered packet handler"
        );
        Ok(())
    }

    /// Remove the first entry registered with `callback`. Returns whether
    /// anything was removed.
    pub fn unregister<T: ?Sized>(&self, packet_type: &str, callback: &Arc<T>) -> Result<bool> {
        let addr = callback_addr(callback);
        let mut state = self.lock()?;

        let Some(list) = state.handlers.get_mut(packet_type) else {
            return Ok(false);
        };
        let Some(pos) = list.iter().position(|entry| entry.callback_addr() == addr) else {
            return Ok(false);
        };
        list.remove(pos);
        let remaining = list.len();
        if remaining == 0 {
            state.prune(packet_type);
        }

        debug!(packet_type, remaining, "Removed packet handler");
        Ok(true)
    }

    /// Drop every handler and the options for `packet_type`
    pub fn unregister_all(&self, packet_type: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.prune(packet_type);
        debug!(packet_type, "Removed all handlers for packet type");
        Ok(())
    }

    /// Drop every handler and every packet type's options
    pub fn unregister_all_types(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.handlers.clear();
        state.unwrappers.clear();
        debug!("Removed all packet handlers");
        Ok(())
    }

    /// Options fixed for `packet_type` at registration, if any
    pub fn lookup_options(&self, packet_type: &str) -> Result<Option<SendReceiveOptions>> {
        Ok(self.lock()?.unwrappers.get(packet_type).cloned())
    }

    pub fn has_handlers(&self, packet_type: &str) -> Result<bool> {
        Ok(self.lock()?.handlers.contains_key(packet_type))
    }

    pub fn handler_count(&self, packet_type: &str) -> Result<usize> {
        Ok(self.lock()?.handlers.get(packet_type).map_or(0, Vec::len))
    }

    /// Packet types with at least one handler, sorted
    pub fn packet_types(&self) -> Result<Vec<String>> {
        let mut types: Vec<String> = self.lock()?.handlers.keys().cloned().collect();
        types.sort();
        Ok(types)
    }

    /// Handler presence and options for `packet_type`, read together
    pub(crate) fn local_view(
        &self,
        packet_type: &str,
    ) -> Result<(bool, Option<SendReceiveOptions>)> {
        let state = self.lock()?;
        Ok((
            state.handlers.contains_key(packet_type),
            state.unwrappers.get(packet_type).cloned(),
        ))
    }

    pub(crate) fn snapshot(&self, packet_type: &str) -> Result<Option<HandlerSnapshot>> {
        Ok(self.lock()?.handlers.get(packet_type).cloned())
    }

    pub fn add_shutdown_listener(&self, listener: ShutdownListener) -> Result<()> {
        self.lock()?.shutdown.add(listener);
        Ok(())
    }

    pub fn remove_shutdown_listener(&self, listener: &ShutdownListener) -> Result<bool> {
        Ok(self.lock()?.shutdown.remove(listener))
    }

    pub fn shutdown_listener_count(&self) -> Result<usize> {
        Ok(self.lock()?.shutdown.len())
    }

    pub fn has_shutdown_listeners(&self) -> Result<bool> {
        Ok(!self.lock()?.shutdown.is_empty())
    }

    pub(crate) fn shutdown_snapshot(&self) -> Result<Vec<ShutdownListener>> {
        Ok(self.lock()?.shutdown.snapshot())
    }
}
