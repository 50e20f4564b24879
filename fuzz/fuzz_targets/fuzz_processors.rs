#![no_main]

use libfuzzer_sys::fuzz_target;
use peer_dispatch::config::ProcessingConfig;
use peer_dispatch::utils::compression::PASSWORD_OPTION;
use peer_dispatch::ProcessorKind;
use std::collections::BTreeMap;

fuzz_target!(|data: &[u8]| {
    let processing = ProcessingConfig::default();
    let mut options = BTreeMap::new();
    options.insert(PASSWORD_OPTION.to_string(), "fuzz".to_string());

    for kind in [
        ProcessorKind::Lz4,
        ProcessorKind::Zstd,
        ProcessorKind::ChaCha20Poly1305,
    ] {
        // Round trip must hold for any input
        if let Ok(processed) = kind.apply(data, &options, &processing) {
            let restored = kind.reverse(&processed, &options, &processing);
            assert_eq!(restored.ok().as_deref(), Some(data));
        }
        // Malformed input must fail cleanly and respect size limits
        let _ = kind.reverse(data, &options, &processing);
    }
});
