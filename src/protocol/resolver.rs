//! Effective options for an arriving packet.
//!
//! Local options come from the connection's registry (or the connection
//! default), global options from the injected [`GlobalRegistry`]. When a
//! packet type has both local and global handlers the two must agree on
//! serializer and processors; their option maps are merged with local keys
//! winning. A serializer identifier in the header overrides the settings of
//! whichever side is chosen but never its option map.

use crate::connection::Connection;
use crate::core::identifier::SerializerResolver;
use crate::core::options::SendReceiveOptions;
use crate::core::serialization::SerializerKind;
use crate::error::{DispatchError, Result};
use crate::protocol::header::PacketHeader;
use crate::protocol::registry::HandlerRegistry;
use crate::utils::compression::ProcessorKind;
use std::sync::Arc;
use tracing::trace;

/// Process-wide handler table, consulted but not owned by a connection
pub trait GlobalRegistry: Send + Sync {
    fn has_global_handler(&self, packet_type: &str) -> bool;

    fn global_options(&self, packet_type: &str) -> Option<SendReceiveOptions>;

    fn default_options(&self) -> SendReceiveOptions;

    /// Run global handlers for a packet no local handler consumed. Returns
    /// whether any ran.
    fn trigger_global_handlers(
        &self,
        _header: &PacketHeader,
        _connection: &Connection,
        _payload: &[u8],
        _options: &SendReceiveOptions,
    ) -> bool {
        false
    }
}

/// Global registry with no handlers, for connections used on their own
#[derive(Debug, Clone, Default)]
pub struct NoGlobalHandlers {
    defaults: SendReceiveOptions,
}

impl NoGlobalHandlers {
    pub fn new(defaults: SendReceiveOptions) -> Self {
        Self { defaults }
    }
}

impl GlobalRegistry for NoGlobalHandlers {
    fn has_global_handler(&self, _packet_type: &str) -> bool {
        false
    }

    fn global_options(&self, _packet_type: &str) -> Option<SendReceiveOptions> {
        None
    }

    fn default_options(&self) -> SendReceiveOptions {
        self.defaults.clone()
    }
}

/// Inputs to [`select_options`], gathered from the registries and header
#[derive(Debug, Clone)]
pub struct ResolutionInputs<'a> {
    pub packet_type: &'a str,
    pub has_local_handlers: bool,
    pub has_global_handlers: bool,
    pub local: SendReceiveOptions,
    pub global: SendReceiveOptions,
    pub advertised: Option<(SerializerKind, Vec<ProcessorKind>)>,
}

/// Pure options selection
pub fn select_options(inputs: ResolutionInputs<'_>) -> Result<SendReceiveOptions> {
    let chosen = match (inputs.has_local_handlers, inputs.has_global_handlers) {
        (true, true) => {
            if !inputs.local.is_compatible(&inputs.global) {
                return Err(DispatchError::OptionsIncompatible {
                    packet_type: inputs.packet_type.to_string(),
                });
            }
            inputs.local.merged_over(&inputs.global)
        }
        (true, false) => inputs.local,
        (false, _) => inputs.global,
    };

    Ok(match inputs.advertised {
        Some((serializer, processors)) => chosen.with_settings(serializer, processors),
        None => chosen,
    })
}

/// Resolves options for one connection's packets
#[derive(Clone)]
pub struct OptionsResolver {
    global: Arc<dyn GlobalRegistry>,
    serializers: Arc<dyn SerializerResolver>,
}

impl OptionsResolver {
    pub fn new(global: Arc<dyn GlobalRegistry>, serializers: Arc<dyn SerializerResolver>) -> Self {
        Self {
            global,
            serializers,
        }
    }

    pub fn global(&self) -> &Arc<dyn GlobalRegistry> {
        &self.global
    }

    /// Effective options for `header`. Reads state but never mutates it.
    pub fn resolve(
        &self,
        header: &PacketHeader,
        registry: &HandlerRegistry,
        connection_default: &SendReceiveOptions,
    ) -> Result<SendReceiveOptions> {
        let packet_type = header.packet_type();

        let advertised = header
            .serializer_identifier()
            .map(|id| self.serializers.decode(id))
            .transpose()?;

        let (has_local_handlers, local) = registry.local_view(packet_type)?;
        let local = local
            .unwrap_or_else(|| connection_default.clone())
            .or_settings_from(connection_default);

        let global_default = self.global.default_options();
        let global = self
            .global
            .global_options(packet_type)
            .unwrap_or_else(|| global_default.clone())
            .or_settings_from(&global_default);

        let has_global_handlers = self.global.has_global_handler(packet_type);
        trace!(
            packet_type,
            has_local_handlers,
            has_global_handlers,
            advertised = advertised.is_some(),
            "Resolving packet options"
        );

        select_options(ResolutionInputs {
            packet_type,
            has_local_handlers,
            has_global_handlers,
            local,
            global,
            advertised,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn inputs<'a>(local: bool, global: bool) -> ResolutionInputs<'a> {
        ResolutionInputs {
            packet_type: "X",
            has_local_handlers: local,
            has_global_handlers: global,
            local: SendReceiveOptions::new(SerializerKind::Bincode, vec![])
                .with_option("side", "local"),
            global: SendReceiveOptions::new(SerializerKind::Bincode, vec![])
                .with_option("side", "global")
                .with_option("g", "1"),
            advertised: None,
        }
    }

    #[test]
    fn test_only_local() {
        let chosen = select_options(inputs(true, false)).unwrap();
        assert_eq!(chosen.option("side"), Some("local"));
        assert_eq!(chosen.option("g"), None);
    }

    #[test]
    fn test_only_global_or_neither() {
        for global in [true, false] {
            let chosen = select_options(inputs(false, global)).unwrap();
            assert_eq!(chosen.option("side"), Some("global"));
        }
    }

    #[test]
    fn test_both_merges() {
        let chosen = select_options(inputs(true, true)).unwrap();
        assert_eq!(chosen.option("side"), Some("local"));
        assert_eq!(chosen.option("g"), Some("1"));
    }

    #[test]
    fn test_advertised_settings_keep_option_map() {
        let mut i = inputs(true, true);
        i.advertised = Some((SerializerKind::Json, vec![ProcessorKind::Lz4]));
        let chosen = select_options(i).unwrap();
        assert_eq!(chosen.serializer(), Some(SerializerKind::Json));
        assert_eq!(chosen.processors(), Some(&[ProcessorKind::Lz4][..]));
        assert_eq!(chosen.option("side"), Some("local"));
        assert_eq!(chosen.option("g"), Some("1"));
    }

    #[test]
    fn test_advertised_settings_do_not_bypass_compatibility() {
        let mut i = inputs(true, true);
        i.global = SendReceiveOptions::new(SerializerKind::Json, vec![]);
        i.advertised = Some((SerializerKind::Bincode, vec![]));
        assert!(matches!(
            select_options(i),
            Err(DispatchError::OptionsIncompatible { .. })
        ));
    }
}
