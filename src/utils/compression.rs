//! # Data Processors
//!
//! Byte-level stages applied after serialization on send and before
//! deserialization on receive. A `SendReceiveOptions` carries an ordered list
//! of these; they run in list order on send and in reverse order on receive.
//!
//! - **Lz4**: fast compression, size-prepended frames
//! - **Zstd**: stronger compression, level taken from `ProcessingConfig`
//! - **ChaCha20Poly1305**: pre-shared-key AEAD; the key is SHA-256 of the
//!   `chacha20poly1305.password` option and a random nonce prefixes each frame
//!
//! Decompression output is capped at `ProcessingConfig::max_payload_size` to
//! reject decompression bombs.

use crate::config::ProcessingConfig;
use crate::error::{DispatchError, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;

/// Option key holding the pre-shared password for the encryption stage
pub const PASSWORD_OPTION: &str = "chacha20poly1305.password";

const NONCE_LEN: usize = 12;

/// Supported data processing stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    Lz4,
    Zstd,
    ChaCha20Poly1305,
}

impl ProcessorKind {
    /// Identifier byte used on the wire. Zero terminates a processor list.
    pub fn id(self) -> u8 {
        match self {
            ProcessorKind::Lz4 => 0x01,
            ProcessorKind::Zstd => 0x02,
            ProcessorKind::ChaCha20Poly1305 => 0x03,
        }
    }

    pub fn from_id(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(ProcessorKind::Lz4),
            0x02 => Some(ProcessorKind::Zstd),
            0x03 => Some(ProcessorKind::ChaCha20Poly1305),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProcessorKind::Lz4 => "LZ4",
            ProcessorKind::Zstd => "Zstd",
            ProcessorKind::ChaCha20Poly1305 => "ChaCha20-Poly1305",
        }
    }

    /// Run the stage in the send direction
    pub fn apply(
        self,
        data: &[u8],
        options: &BTreeMap<String, String>,
        processing: &ProcessingConfig,
    ) -> Result<Vec<u8>> {
        match self {
            ProcessorKind::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            ProcessorKind::Zstd => {
                let mut out = Vec::new();
                zstd::stream::copy_encode(data, &mut out, processing.compression_level)
                    .map_err(|_| DispatchError::CompressionFailure)?;
                Ok(out)
            }
            ProcessorKind::ChaCha20Poly1305 => encrypt(data, options),
        }
    }

    /// Run the stage in the receive direction
    pub fn reverse(
        self,
        data: &[u8],
        options: &BTreeMap<String, String>,
        processing: &ProcessingConfig,
    ) -> Result<Vec<u8>> {
        match self {
            ProcessorKind::Lz4 => decompress_lz4(data, processing.max_payload_size),
            ProcessorKind::Zstd => decompress_zstd(data, processing.max_payload_size),
            ProcessorKind::ChaCha20Poly1305 => decrypt(data, options),
        }
    }
}

impl std::fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn decompress_lz4(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    // lz4_flex prepends the uncompressed size as 4-byte little-endian;
    // check it before lz4_flex allocates.
    if data.len() < 4 {
        return Err(DispatchError::DecompressionFailure);
    }
    let claimed_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if claimed_size > limit {
        return Err(DispatchError::DecompressionFailure);
    }

    let decompressed = lz4_flex::decompress_size_prepended(data)
        .map_err(|_| DispatchError::DecompressionFailure)?;
    if decompressed.len() > limit {
        return Err(DispatchError::DecompressionFailure);
    }
    Ok(decompressed)
}

fn decompress_zstd(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut reader =
        zstd::stream::Decoder::new(data).map_err(|_| DispatchError::DecompressionFailure)?;

    let mut out = Vec::new();
    let mut buffer = [0u8; 8192];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&buffer[..n]);
                if out.len() > limit {
                    return Err(DispatchError::DecompressionFailure);
                }
            }
            Err(_) => return Err(DispatchError::DecompressionFailure),
        }
    }
    Ok(out)
}

fn cipher(options: &BTreeMap<String, String>) -> Result<ChaCha20Poly1305> {
    let password = options
        .get(PASSWORD_OPTION)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            DispatchError::InvalidOptions(crate::error::constants::ERR_MISSING_PASSWORD.to_string())
        })?;
    let digest = Sha256::digest(password.as_bytes());
    Ok(ChaCha20Poly1305::new(Key::from_slice(digest.as_slice())))
}

fn encrypt(data: &[u8], options: &BTreeMap<String, String>) -> Result<Vec<u8>> {
    let cipher = cipher(options)?;
    let mut nonce = [0u8; NONCE_LEN];
    getrandom::fill(&mut nonce).map_err(|_| DispatchError::EncryptionFailure)?;

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), data)
        .map_err(|_| DispatchError::EncryptionFailure)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn decrypt(data: &[u8], options: &BTreeMap<String, String>) -> Result<Vec<u8>> {
    let cipher = cipher(options)?;
    if data.len() < NONCE_LEN {
        return Err(DispatchError::DecryptionFailure);
    }
    let (nonce, sealed) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| DispatchError::DecryptionFailure)
}
