//! # Send/Receive Options
//!
//! `SendReceiveOptions` bundles the serializer, the ordered processor list and
//! a free-form string option map for one packet type.
//!
//! Two options values are *compatible* when their serializer and processor
//! list are structurally equal (both unset counts as equal). Merging keeps
//! the settings of one side and combines the option maps, with the local side
//! winning on key collisions.

use crate::config::ProcessingConfig;
use crate::core::identifier;
use crate::core::serialization::SerializerKind;
use crate::error::{constants, DispatchError, Result};
use crate::utils::compression::{ProcessorKind, PASSWORD_OPTION};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable serializer, processor and option bundle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SendReceiveOptions {
    serializer: Option<SerializerKind>,
    processors: Option<Vec<ProcessorKind>>,
    options: BTreeMap<String, String>,
}

impl SendReceiveOptions {
    /// Fully specified options with an empty option map
    pub fn new(serializer: SerializerKind, processors: Vec<ProcessorKind>) -> Self {
        Self {
            serializer: Some(serializer),
            processors: Some(processors),
            options: BTreeMap::new(),
        }
    }

    /// Options from raw parts. Partial settings are accepted here and
    /// rejected by [`SendReceiveOptions::validate`].
    pub fn from_parts(
        serializer: Option<SerializerKind>,
        processors: Option<Vec<ProcessorKind>>,
        options: BTreeMap<String, String>,
    ) -> Self {
        Self {
            serializer,
            processors,
            options,
        }
    }

    /// Return a copy with `key` set to `value`
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Return a copy whose serializer and processors are replaced
    pub fn with_settings(
        mut self,
        serializer: SerializerKind,
        processors: Vec<ProcessorKind>,
    ) -> Self {
        self.serializer = Some(serializer);
        self.processors = Some(processors);
        self
    }

    pub fn serializer(&self) -> Option<SerializerKind> {
        self.serializer
    }

    pub fn processors(&self) -> Option<&[ProcessorKind]> {
        self.processors.as_deref()
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// True when neither serializer nor processors are set
    pub fn has_no_settings(&self) -> bool {
        self.serializer.is_none() && self.processors.is_none()
    }

    /// Reject partial settings, processor lists that cannot be encoded into
    /// an identifier, and encryption without a password.
    pub fn validate(&self) -> Result<()> {
        if self.serializer.is_some() != self.processors.is_some() {
            return Err(DispatchError::InvalidOptions(
                constants::ERR_PARTIAL_OPTIONS.to_string(),
            ));
        }
        if let Some(processors) = &self.processors {
            if processors.len() > identifier::MAX_PROCESSORS {
                return Err(DispatchError::InvalidOptions(
                    constants::ERR_TOO_MANY_PROCESSORS.to_string(),
                ));
            }
            for (i, p) in processors.iter().enumerate() {
                if processors[..i].contains(p) {
                    return Err(DispatchError::InvalidOptions(format!(
                        "{}: {}",
                        constants::ERR_DUPLICATE_PROCESSOR,
                        p
                    )));
                }
            }
            if processors.contains(&ProcessorKind::ChaCha20Poly1305)
                && self.option(PASSWORD_OPTION).map_or(true, str::is_empty)
            {
                return Err(DispatchError::InvalidOptions(
                    constants::ERR_MISSING_PASSWORD.to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Serializer and processor list are structurally equal
    pub fn is_compatible(&self, other: &SendReceiveOptions) -> bool {
        self.serializer == other.serializer && self.processors == other.processors
    }

    /// Combine option maps of `self` (local) and `global`. The result keeps
    /// the settings of `self`; keys present in both take the local value.
    pub fn merged_over(&self, global: &SendReceiveOptions) -> SendReceiveOptions {
        let mut options = global.options.clone();
        options.extend(self.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        SendReceiveOptions {
            serializer: self.serializer,
            processors: self.processors.clone(),
            options,
        }
    }

    /// Fill unset settings from `defaults`, keeping the option map
    pub fn or_settings_from(mut self, defaults: &SendReceiveOptions) -> Self {
        if self.has_no_settings() {
            self.serializer = defaults.serializer;
            self.processors = defaults.processors.clone();
        }
        self
    }

    /// Compact identifier for fully specified options
    pub fn identifier(&self) -> Option<u64> {
        match (self.serializer, &self.processors) {
            (Some(serializer), Some(processors)) => {
                identifier::encode_identifier(serializer, processors).ok()
            }
            _ => None,
        }
    }

    /// Serialize `value` and run processors in list order
    pub fn encode_payload<T: Serialize + ?Sized>(
        &self,
        value: &T,
        processing: &ProcessingConfig,
    ) -> Result<Bytes> {
        let mut data = self.serializer.unwrap_or_default().serialize(value)?;
        for processor in self.processors.as_deref().unwrap_or(&[]) {
            data = processor.apply(&data, &self.options, processing)?;
        }
        Ok(Bytes::from(data))
    }

    /// Undo processors in reverse order and deserialize
    pub fn decode_payload<T: DeserializeOwned>(
        &self,
        data: &[u8],
        processing: &ProcessingConfig,
    ) -> Result<T> {
        if data.len() > processing.max_payload_size {
            return Err(DispatchError::DeserializeError(format!(
                "payload of {} bytes exceeds limit of {}",
                data.len(),
                processing.max_payload_size
            )));
        }

        let processors = self.processors.as_deref().unwrap_or(&[]);
        let serializer = self.serializer.unwrap_or_default();
        if processors.is_empty() {
            return serializer.deserialize(data);
        }

        let mut buf = data.to_vec();
        for processor in processors.iter().rev() {
            buf = processor.reverse(&buf, &self.options, processing)?;
        }
        serializer.deserialize(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_rejected() {
        let only_serializer =
            SendReceiveOptions::from_parts(Some(SerializerKind::Json), None, BTreeMap::new());
        assert!(matches!(
            only_serializer.validate(),
            Err(DispatchError::InvalidOptions(_))
        ));

        let only_processors =
            SendReceiveOptions::from_parts(None, Some(vec![ProcessorKind::Lz4]), BTreeMap::new());
        assert!(only_processors.validate().is_err());

        assert!(SendReceiveOptions::default().validate().is_ok());
        assert!(SendReceiveOptions::new(SerializerKind::Json, vec![])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_duplicate_processor_rejected() {
        let options = SendReceiveOptions::new(
            SerializerKind::Bincode,
            vec![ProcessorKind::Lz4, ProcessorKind::Lz4],
        );
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_encryption_requires_password() {
        let bare =
            SendReceiveOptions::new(SerializerKind::Json, vec![ProcessorKind::ChaCha20Poly1305]);
        assert!(matches!(
            bare.validate(),
            Err(DispatchError::InvalidOptions(ref m)) if m.contains(PASSWORD_OPTION)
        ));
        assert!(bare.clone().with_option(PASSWORD_OPTION, "").validate().is_err());
        assert!(bare.with_option(PASSWORD_OPTION, "pw").validate().is_ok());
    }

    #[test]
    fn test_compatibility_ignores_option_map() {
        let a = SendReceiveOptions::new(SerializerKind::Json, vec![ProcessorKind::Zstd])
            .with_option("a", "1");
        let b = SendReceiveOptions::new(SerializerKind::Json, vec![ProcessorKind::Zstd])
            .with_option("b", "2");
        assert!(a.is_compatible(&b));
        assert_ne!(a, b);

        let c = SendReceiveOptions::new(SerializerKind::Json, vec![ProcessorKind::Lz4]);
        assert!(!a.is_compatible(&c));

        // Processor order matters
        let d = SendReceiveOptions::new(
            SerializerKind::Json,
            vec![ProcessorKind::Lz4, ProcessorKind::Zstd],
        );
        let e = SendReceiveOptions::new(
            SerializerKind::Json,
            vec![ProcessorKind::Zstd, ProcessorKind::Lz4],
        );
        assert!(!d.is_compatible(&e));

        assert!(SendReceiveOptions::default().is_compatible(&SendReceiveOptions::default()));
    }

    #[test]
    fn test_merge_local_wins() {
        let local = SendReceiveOptions::new(SerializerKind::Bincode, vec![])
            .with_option("a", "1")
            .with_option("b", "2");
        let global = SendReceiveOptions::new(SerializerKind::Bincode, vec![])
            .with_option("b", "9")
            .with_option("c", "3");

        let merged = local.merged_over(&global);
        assert_eq!(merged.option("a"), Some("1"));
        assert_eq!(merged.option("b"), Some("2"));
        assert_eq!(merged.option("c"), Some("3"));
        assert_eq!(merged.options().len(), 3);
    }

    #[test]
    fn test_unset_settings_filled_from_defaults() {
        let defaults = SendReceiveOptions::new(SerializerKind::Json, vec![ProcessorKind::Lz4]);
        let filled = SendReceiveOptions::default()
            .with_option("k", "v")
            .or_settings_from(&defaults);
        assert_eq!(filled.serializer(), Some(SerializerKind::Json));
        assert_eq!(filled.processors(), Some(&[ProcessorKind::Lz4][..]));
        assert_eq!(filled.option("k"), Some("v"));

        let explicit = SendReceiveOptions::new(SerializerKind::MessagePack, vec![]);
        assert_eq!(
            explicit.clone().or_settings_from(&defaults).serializer(),
            Some(SerializerKind::MessagePack)
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_processors_run_in_reverse_on_decode() {
        let processing = ProcessingConfig::default();
        let options = SendReceiveOptions::new(
            SerializerKind::MessagePack,
            vec![ProcessorKind::Zstd, ProcessorKind::ChaCha20Poly1305],
        )
        .with_option(PASSWORD_OPTION, "pw");

        let value = vec!["x".repeat(100); 10];
        let wire = options.encode_payload(&value, &processing).unwrap();
        let back: Vec<String> = options.decode_payload(&wire, &processing).unwrap();
        assert_eq!(back, value);

        // Swapping the stage order must not decode
        let swapped = SendReceiveOptions::new(
            SerializerKind::MessagePack,
            vec![ProcessorKind::ChaCha20Poly1305, ProcessorKind::Zstd],
        )
        .with_option(PASSWORD_OPTION, "pw");
        assert!(swapped
            .decode_payload::<Vec<String>>(&wire, &processing)
            .is_err());
    }

    #[test]
    fn test_identifier_only_for_full_settings() {
        assert_eq!(SendReceiveOptions::default().identifier(), None);
        assert!(SendReceiveOptions::new(SerializerKind::Json, vec![ProcessorKind::Lz4])
            .identifier()
            .is_some());
    }
}
