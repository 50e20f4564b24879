//! # Serializer/Processor Identifier
//!
//! Senders may advertise the serializer and processors they used as a
//! single `u64` in the packet header. Layout, most significant byte first:
//!
//! ```text
//! [Serializer(1)] [Processor(1)] x 7
//! ```
//!
//! Processor bytes are in application order and the list ends at the first
//! zero byte. Every byte after a zero must also be zero.

use crate::core::serialization::SerializerKind;
use crate::error::{constants, DispatchError, Result};
use crate::utils::compression::ProcessorKind;

/// Number of processor slots in an identifier
pub const MAX_PROCESSORS: usize = 7;

/// Turns a header identifier into the settings it names.
pub trait SerializerResolver: Send + Sync {
    fn decode(&self, identifier: u64) -> Result<(SerializerKind, Vec<ProcessorKind>)>;
}

/// Resolver for the serializers and processors built into this crate
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinResolver;

impl SerializerResolver for BuiltinResolver {
    fn decode(&self, identifier: u64) -> Result<(SerializerKind, Vec<ProcessorKind>)> {
        decode_identifier(identifier)
    }
}

pub fn encode_identifier(serializer: SerializerKind, processors: &[ProcessorKind]) -> Result<u64> {
    if processors.len() > MAX_PROCESSORS {
        return Err(DispatchError::InvalidIdentifier(
            constants::ERR_TOO_MANY_PROCESSORS.to_string(),
        ));
    }

    let mut bytes = [0u8; 8];
    bytes[0] = serializer.id();
    for (slot, processor) in bytes[1..].iter_mut().zip(processors) {
        *slot = processor.id();
    }
    Ok(u64::from_be_bytes(bytes))
}

pub fn decode_identifier(identifier: u64) -> Result<(SerializerKind, Vec<ProcessorKind>)> {
    let bytes = identifier.to_be_bytes();
    let serializer =
        SerializerKind::from_id(bytes[0]).ok_or(DispatchError::UnknownSerializer(bytes[0]))?;

    let mut processors = Vec::new();
    let mut terminated = false;
    for &byte in &bytes[1..] {
        if byte == 0 {
            terminated = true;
            continue;
        }
        if terminated {
            return Err(DispatchError::InvalidIdentifier(
                constants::ERR_IDENTIFIER_GAP.to_string(),
            ));
        }
        let processor =
            ProcessorKind::from_id(byte).ok_or(DispatchError::UnknownProcessor(byte))?;
        processors.push(processor);
    }
    Ok((serializer, processors))
}
