//! Typed packet handlers and their type-erased registry entries.
//!
//! Consumers register `HandlerFn<T>` callbacks. The registry stores them as
//! `Arc<dyn HandlerEntry>` so handlers for different payload types can share
//! one map, while each entry keeps the knowledge needed to decode its own
//! payload type and to recognise its callback on removal.

use crate::config::ProcessingConfig;
use crate::connection::Connection;
use crate::core::options::SendReceiveOptions;
use crate::error::{DispatchError, Result};
use crate::protocol::header::PacketHeader;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Outcome of a handler callback
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A typed packet handler. Keep a clone to remove it again later; removal
/// matches on the allocation, not on behaviour.
pub type HandlerFn<T> =
    Arc<dyn Fn(&PacketHeader, &Connection, &T) -> HandlerResult + Send + Sync + 'static>;

/// Decoded payload shared by every handler of one dispatch
pub type Payload = Box<dyn Any + Send + Sync>;

/// Wrap a closure as a [`HandlerFn`]
pub fn handler_fn<T, F>(f: F) -> HandlerFn<T>
where
    F: Fn(&PacketHeader, &Connection, &T) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn callback_addr<T: ?Sized>(callback: &Arc<T>) -> *const () {
    Arc::as_ptr(callback).cast::<()>()
}

pub(crate) trait HandlerEntry: Send + Sync {
    fn payload_type(&self) -> TypeId;

    fn decode(
        &self,
        data: &[u8],
        options: &SendReceiveOptions,
        processing: &ProcessingConfig,
    ) -> Result<Payload>;

    fn invoke(
        &self,
        header: &PacketHeader,
        connection: &Connection,
        payload: &(dyn Any + Send + Sync),
    ) -> HandlerResult;

    fn callback_addr(&self) -> *const ();
}

pub(crate) struct TypedHandler<T> {
    callback: HandlerFn<T>,
}

impl<T> TypedHandler<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn new(callback: HandlerFn<T>) -> Self {
        Self { callback }
    }
}

impl<T> HandlerEntry for TypedHandler<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn payload_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn decode(
        &self,
        data: &[u8],
        options: &SendReceiveOptions,
        processing: &ProcessingConfig,
    ) -> Result<Payload> {
        let value: T = options.decode_payload(data, processing)?;
        Ok(Box::new(value))
    }

    fn invoke(
        &self,
        header: &PacketHeader,
        connection: &Connection,
        payload: &(dyn Any + Send + Sync),
    ) -> HandlerResult {
        let value = payload.downcast_ref::<T>().ok_or_else(|| {
            DispatchError::InternalInvariant(format!(
                "payload for '{}' is not a {}",
                header.packet_type(),
                std::any::type_name::<T>()
            ))
        })?;
        (self.callback)(header, connection, value)
    }

    fn callback_addr(&self) -> *const () {
        callback_addr(&self.callback)
    }
}
