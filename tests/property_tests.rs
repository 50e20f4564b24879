//! Property-based tests using proptest
//!
//! Options merging and registry pruning checked against randomly
//! generated inputs and operation sequences.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use peer_dispatch::config::ConnectionConfig;
use peer_dispatch::core::identifier::{decode_identifier, encode_identifier};
use peer_dispatch::{
    handler_fn, Connection, HandlerFn, PacketHeader, ProcessorKind, SendReceiveOptions,
    SerializerKind,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn option_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-e]", "[0-9]{1,2}", 0..5)
}

fn with_map(map: &BTreeMap<String, String>) -> SendReceiveOptions {
    SendReceiveOptions::from_parts(Some(SerializerKind::Bincode), Some(vec![]), map.clone())
}

// Property: merged map is global overlaid by local
proptest! {
    #[test]
    fn prop_merge_local_wins(local in option_map(), global in option_map()) {
        let merged = with_map(&local).merged_over(&with_map(&global));

        for (k, v) in &local {
            prop_assert_eq!(merged.option(k), Some(v.as_str()));
        }
        for (k, v) in &global {
            if !local.contains_key(k) {
                prop_assert_eq!(merged.option(k), Some(v.as_str()));
            }
        }
        let mut keys: Vec<&String> = local.keys().chain(global.keys()).collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(merged.options().len(), keys.len());
    }
}

fn processor() -> impl Strategy<Value = ProcessorKind> {
    prop_oneof![
        Just(ProcessorKind::Lz4),
        Just(ProcessorKind::Zstd),
        Just(ProcessorKind::ChaCha20Poly1305),
    ]
}

fn serializer() -> impl Strategy<Value = SerializerKind> {
    prop_oneof![
        Just(SerializerKind::Bincode),
        Just(SerializerKind::Json),
        Just(SerializerKind::MessagePack),
    ]
}

// Property: every encodable settings pair decodes back to itself
proptest! {
    #[test]
    fn prop_identifier_preserves_settings(
        serializer in serializer(),
        processors in prop::collection::vec(processor(), 0..=7),
    ) {
        let id = encode_identifier(serializer, &processors).expect("at most 7 processors");
        let (s, p) = decode_identifier(id).expect("decodes");
        prop_assert_eq!(s, serializer);
        prop_assert_eq!(p, processors);
    }
}

#[derive(Debug, Clone)]
enum Op {
    Register(usize, usize),
    Unregister(usize, usize),
    UnregisterAll(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..4usize).prop_map(|(t, h)| Op::Register(t, h)),
        (0..3usize, 0..4usize).prop_map(|(t, h)| Op::Unregister(t, h)),
        (0..3usize).prop_map(Op::UnregisterAll),
    ]
}

// Property: a type has options exactly while it has handlers, and the
// handler count tracks a simple model
proptest! {
    #[test]
    fn prop_prune_invariant(ops in prop::collection::vec(op(), 0..60)) {
        let conn = Connection::new(ConnectionConfig::default()).unwrap();
        let types = ["a", "b", "c"];
        let handlers: Vec<HandlerFn<u32>> =
            (0..4).map(|_| handler_fn(|_, _, _: &u32| Ok(()))).collect();
        let options = SendReceiveOptions::new(SerializerKind::Json, vec![]);
        let mut model = [[false; 4]; 3];

        for op in ops {
            match op {
                Op::Register(t, h) => {
                    let result = conn.append_packet_handler(
                        types[t],
                        handlers[h].clone(),
                        Some(options.clone()),
                    );
                    prop_assert_eq!(result.is_ok(), !model[t][h]);
                    model[t][h] = true;
                }
                Op::Unregister(t, h) => {
                    let removed = conn.remove_packet_handler(types[t], &handlers[h]).unwrap();
                    prop_assert_eq!(removed, model[t][h]);
                    model[t][h] = false;
                }
                Op::UnregisterAll(t) => {
                    conn.remove_all_packet_handlers(types[t]).unwrap();
                    model[t] = [false; 4];
                }
            }

            for (t, packet_type) in types.iter().enumerate() {
                let expected = model[t].iter().filter(|x| **x).count();
                let registry = conn.registry();
                prop_assert_eq!(registry.handler_count(packet_type).unwrap(), expected);
                prop_assert_eq!(registry.has_handlers(packet_type).unwrap(), expected > 0);
                prop_assert_eq!(
                    registry.lookup_options(packet_type).unwrap().is_some(),
                    expected > 0
                );
            }
        }

        // Dispatch agrees with the model
        let payload = options.encode_payload(&1u32, conn.processing()).unwrap();
        for (t, packet_type) in types.iter().enumerate() {
            let any = model[t].iter().any(|x| *x);
            prop_assert_eq!(
                conn.handle_incoming_packet(&PacketHeader::new(*packet_type), &payload),
                any
            );
        }
    }
}
