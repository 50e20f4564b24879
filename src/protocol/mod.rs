//! # Packet Handling
//!
//! Per-connection handler registration, options resolution and dispatch.
//!
//! ## Flow
//! 1. `resolver` computes the effective `SendReceiveOptions` for a header
//! 2. `dispatcher` snapshots the local handler list from `registry`
//! 3. the payload is decoded once and handed to every handler in order
//!
//! ## Components
//! - **header**: `PacketHeader` as delivered by the I/O layer
//! - **handler**: typed callbacks and their type-erased entries
//! - **registry**: handler lists, per-type options, shutdown listeners
//! - **resolver**: `GlobalRegistry` collaborator and options selection
//! - **dispatcher**: decode-once, failure-isolated fan-out
//! - **shutdown**: listeners fired when a connection closes

pub mod dispatcher;
pub mod handler;
pub mod header;
pub mod registry;
pub mod resolver;
pub mod shutdown;
