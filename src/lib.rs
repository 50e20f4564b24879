//! # peer-dispatch
//!
//! Per-connection packet handler registry, options resolution and dispatch
//! for peer-to-peer endpoints.
//!
//! Consumers register typed handlers per packet type, optionally with their
//! own serializer, processor stages and option map. When a packet arrives the
//! connection decides which options govern it (reconciling connection-local
//! and process-wide registrations), decodes the payload once and hands it to
//! every local handler, isolating handler failures from each other and from
//! the receive loop.
//!
//! ## Example
//! ```rust
//! use peer_dispatch::config::ConnectionConfig;
//! use peer_dispatch::connection::Connection;
//! use peer_dispatch::protocol::handler::handler_fn;
//! use peer_dispatch::protocol::header::PacketHeader;
//!
//! # fn main() -> peer_dispatch::error::Result<()> {
//! let connection = Connection::new(ConnectionConfig::default())?;
//! connection.append_packet_handler(
//!     "ping",
//!     handler_fn(|_header, _conn, n: &u32| {
//!         assert_eq!(*n, 7);
//!         Ok(())
//!     }),
//!     None,
//! )?;
//!
//! let payload = connection
//!     .packet_type_options("ping")?
//!     .encode_payload(&7u32, connection.processing())?;
//! assert!(connection.handle_incoming_packet(&PacketHeader::new("ping"), &payload));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod core;
pub mod error;
pub mod protocol;
pub mod utils;

pub use crate::connection::Connection;
pub use crate::core::options::SendReceiveOptions;
pub use crate::core::serialization::SerializerKind;
pub use crate::error::{DispatchError, Result};
pub use crate::protocol::handler::{handler_fn, HandlerFn, HandlerResult};
pub use crate::protocol::header::PacketHeader;
pub use crate::protocol::resolver::{GlobalRegistry, NoGlobalHandlers};
pub use crate::protocol::shutdown::{shutdown_listener, ShutdownListener};
pub use crate::utils::compression::ProcessorKind;
