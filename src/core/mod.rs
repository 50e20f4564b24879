//! # Core Components
//!
//! Serialization formats, send/receive options and the compact
//! serializer/processor identifier.
//!
//! ## Components
//! - **SerializerKind**: bincode, JSON and MessagePack
//! - **SendReceiveOptions**: per-packet-type settings with compatibility
//!   checking and option-map merging
//! - **Identifier**: `u64` encoding of a serializer plus up to seven processors

pub mod identifier;
pub mod options;
pub mod serialization;
