//! Fan-out of one arrived packet to the connection's local handlers.
//!
//! The handler list is copied under the registry lock and the lock is
//! released before decoding or running any handler. The payload is decoded
//! once, with the first handler's payload type, and every handler receives a
//! reference to that value. Handler errors and panics are logged and do not
//! stop the remaining handlers. Nothing escapes [`dispatch`]: it runs on the
//! receive path, where a fault would end the connection's receive loop.
//!
//! A handler registered while a dispatch is in flight may miss that packet.

use crate::connection::Connection;
use crate::core::options::SendReceiveOptions;
use crate::error::{constants, DispatchError, Result};
use crate::protocol::header::PacketHeader;
use crate::protocol::shutdown::panic_message;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, trace};

/// What happened to one packet on the local dispatch path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// A non-empty handler list ran
    Handled,
    /// No local handlers for the packet type
    NoLocalHandlers,
    /// The packet could not be delivered and is gone
    Dropped,
}

/// Deliver `payload` to the local handlers of `header.packet_type()`.
///
/// Returns `true` when a non-empty handler list was found and run, whether
/// or not every handler succeeded. Returns `false` when there are no local
/// handlers or the packet could not be delivered at all.
pub fn dispatch(
    connection: &Connection,
    header: &PacketHeader,
    payload: &[u8],
    options: Option<&SendReceiveOptions>,
) -> bool {
    deliver(connection, header, payload, options) == Delivery::Handled
}

/// [`dispatch`] with the dropped case kept apart from "no local handlers".
/// Counts `handled_locally` or `dropped`; never both.
pub(crate) fn deliver(
    connection: &Connection,
    header: &PacketHeader,
    payload: &[u8],
    options: Option<&SendReceiveOptions>,
) -> Delivery {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        try_dispatch(connection, header, payload, options)
    }));

    match outcome {
        Ok(Ok(true)) => {
            connection.metrics().packet_handled_locally();
            Delivery::Handled
        }
        Ok(Ok(false)) => Delivery::NoLocalHandlers,
        Ok(Err(e)) => {
            connection.metrics().packet_dropped();
            error!(
                connection_id = connection.id(),
                packet_type = header.packet_type(),
                error = %e,
                "Failed to dispatch packet"
            );
            Delivery::Dropped
        }
        Err(panic) => {
            connection.metrics().packet_dropped();
            error!(
                connection_id = connection.id(),
                packet_type = header.packet_type(),
                panic = panic_message(&*panic),
                "Packet dispatch panicked"
            );
            Delivery::Dropped
        }
    }
}

fn try_dispatch(
    connection: &Connection,
    header: &PacketHeader,
    payload: &[u8],
    options: Option<&SendReceiveOptions>,
) -> Result<bool> {
    let options = options.ok_or(DispatchError::NullOptions)?;
    let packet_type = header.packet_type();

    let Some(handlers) = connection.registry().snapshot(packet_type)? else {
        trace!(packet_type, "No local handlers for packet type");
        return Ok(false);
    };

    if let Some(declared) = header.payload_size() {
        if declared != payload.len() {
            return Err(DispatchError::PayloadSizeMismatch {
                packet_type: packet_type.to_string(),
                declared,
                actual: payload.len(),
            });
        }
    }

    let first = handlers.first().ok_or_else(|| {
        DispatchError::InternalInvariant(constants::ERR_EMPTY_HANDLER_LIST.to_string())
    })?;

    let value = first
        .decode(payload, options, connection.processing())
        .inspect_err(|_| connection.metrics().deserialization_failed())?;

    for (index, handler) in handlers.iter().enumerate() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            handler.invoke(header, connection, &*value)
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                connection.metrics().handler_failed();
                error!(
                    connection_id = connection.id(),
                    packet_type,
                    handler = index,
                    error = %e,
                    "Packet handler failed"
                );
            }
            Err(panic) => {
                connection.metrics().handler_failed();
                error!(
                    connection_id = connection.id(),
                    packet_type,
                    handler = index,
                    panic = panic_message(&*panic),
                    "Packet handler panicked"
                );
            }
        }
    }

    trace!(packet_type, handlers = handlers.len(), "Dispatched packet");
    Ok(true)
}
