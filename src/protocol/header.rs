use serde::{Deserialize, Serialize};

/// Header of an arrived packet, as produced by the connection I/O layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    packet_type: String,
    serializer_identifier: Option<u64>,
    payload_size: Option<usize>,
}

impl PacketHeader {
    pub fn new(packet_type: impl Into<String>) -> Self {
        Self {
            packet_type: packet_type.into(),
            serializer_identifier: None,
            payload_size: None,
        }
    }

    /// Sender-advertised serializer/processor identifier
    pub fn with_serializer_identifier(mut self, identifier: u64) -> Self {
        self.serializer_identifier = Some(identifier);
        self
    }

    /// Payload length declared by the framing layer. When set, dispatch
    /// refuses a payload of any other length.
    pub fn with_payload_size(mut self, size: usize) -> Self {
        self.payload_size = Some(size);
        self
    }

    pub fn packet_type(&self) -> &str {
        &self.packet_type
    }

    pub fn serializer_identifier(&self) -> Option<u64> {
        self.serializer_identifier
    }

    pub fn payload_size(&self) -> Option<usize> {
        self.payload_size
    }
}
