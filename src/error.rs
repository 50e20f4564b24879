//! # Error Types
//!
//! Error handling for handler registration, options resolution and dispatch.
//!
//! ## Error Categories
//! - **Registration errors**: invalid or conflicting options, duplicate handlers.
//!   Raised synchronously to the registering caller.
//! - **Resolution errors**: local and global options disagree for a packet type.
//! - **Dispatch errors**: missing options, internal invariant violations,
//!   serializer and processor failures. These are logged at the dispatch
//!   boundary and never reach the receive loop.
//! - **Configuration errors**: invalid or unreadable configuration.
//!
//! ## Example Usage
//! ```rust
//! use peer_dispatch::error::{DispatchError, Result};
//! use tracing::error;
//!
//! fn check(tag: &str) -> Result<()> {
//!     Err(DispatchError::DuplicateHandler {
//!         packet_type: tag.to_string(),
//!     })
//! }
//!
//! if let Err(e) = check("ping") {
//!     error!(error = %e, "Registration rejected");
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Options validation
    pub const ERR_PARTIAL_OPTIONS: &str =
        "Serializer and processor list must either both be set or both be unset";
    pub const ERR_TOO_MANY_PROCESSORS: &str = "At most 7 processors fit in an identifier";
    pub const ERR_DUPLICATE_PROCESSOR: &str = "A processor may only appear once";
    pub const ERR_MISSING_PASSWORD: &str =
        "The chacha20poly1305 processor requires a 'chacha20poly1305.password' option";

    /// Registry invariants
    pub const ERR_EMPTY_HANDLER_LIST: &str =
        "Handler list present with zero entries; empty lists must be pruned";

    /// Identifier decoding
    pub const ERR_IDENTIFIER_GAP: &str = "Processor byte follows a terminating zero byte";
}

/// Error type for every fallible operation in this crate
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Options for packet type '{packet_type}' conflict with previously registered options")]
    OptionsConflict { packet_type: String },

    #[error("Handler already registered for packet type '{packet_type}'")]
    DuplicateHandler { packet_type: String },

    #[error("Handler payload type for packet type '{packet_type}' differs from existing handlers")]
    PayloadTypeMismatch { packet_type: String },

    #[error("Local and global options for packet type '{packet_type}' are incompatible")]
    OptionsIncompatible { packet_type: String },

    #[error("Packet type '{packet_type}' declared {declared} payload bytes but carried {actual}")]
    PayloadSizeMismatch {
        packet_type: String,
        declared: usize,
        actual: usize,
    },

    #[error("Dispatch attempted without resolved options")]
    NullOptions,

    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("Unknown serializer id: {0:#04x}")]
    UnknownSerializer(u8),

    #[error("Unknown processor id: {0:#04x}")]
    UnknownProcessor(u8),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using DispatchError
pub type Result<T> = std::result::Result<T, DispatchError>;
