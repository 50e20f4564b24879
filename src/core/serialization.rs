//! # Serialization Formats
//!
//! Serializers selectable per packet type through `SendReceiveOptions`.
//! Supports bincode (default), JSON (debugging/interop), and MessagePack (compact encoding).
//!
//! Each serializer has a one-byte identifier used by the compact
//! serializer/processor identifier carried in packet headers.
//!
//! ## Performance Characteristics
//! - **Bincode**: fastest, binary
//! - **MessagePack**: compact, binary
//! - **JSON**: human-readable, text

use crate::error::{DispatchError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializerKind {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    #[serde(alias = "msgpack")]
    MessagePack,
}

impl SerializerKind {
    /// Identifier byte used on the wire. Zero is reserved for "unset".
    pub fn id(self) -> u8 {
        match self {
            SerializerKind::Bincode => 0x01,
            SerializerKind::Json => 0x02,
            SerializerKind::MessagePack => 0x03,
        }
    }

    /// Detect format from identifier byte
    pub fn from_id(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializerKind::Bincode),
            0x02 => Some(SerializerKind::Json),
            0x03 => Some(SerializerKind::MessagePack),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializerKind::Bincode => "Bincode",
            SerializerKind::Json => "JSON",
            SerializerKind::MessagePack => "MessagePack",
        }
    }

    /// Serialize a value to bytes
    pub fn serialize<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializerKind::Bincode => {
                bincode::serialize(value).map_err(|e| DispatchError::SerializeError(e.to_string()))
            }
            SerializerKind::Json => {
                serde_json::to_vec(value).map_err(|e| DispatchError::SerializeError(e.to_string()))
            }
            SerializerKind::MessagePack => {
                rmp_serde::to_vec(value).map_err(|e| DispatchError::SerializeError(e.to_string()))
            }
        }
    }

    /// Deserialize a value from bytes
    pub fn deserialize<T: DeserializeOwned>(self, data: &[u8]) -> Result<T> {
        match self {
            SerializerKind::Bincode => bincode::deserialize(data)
                .map_err(|e| DispatchError::DeserializeError(e.to_string())),
            SerializerKind::Json => serde_json::from_slice(data)
                .map_err(|e| DispatchError::DeserializeError(e.to_string())),
            SerializerKind::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| DispatchError::DeserializeError(e.to_string())),
        }
    }
}

impl std::fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
