#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Registration rules as seen through the public connection API

use peer_dispatch::config::ConnectionConfig;
use peer_dispatch::core::options::SendReceiveOptions;
use peer_dispatch::{
    handler_fn, Connection, DispatchError, HandlerFn, PacketHeader, ProcessorKind, SerializerKind,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn connection() -> Connection {
    Connection::new(ConnectionConfig::default()).expect("default config is valid")
}

fn counting(counter: &Arc<AtomicUsize>) -> HandlerFn<String> {
    let counter = counter.clone();
    handler_fn(move |_, _, _: &String| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn test_same_handler_twice_is_duplicate() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    let h = counting(&calls);

    conn.append_packet_handler("chat", h.clone(), None).unwrap();
    let err = conn.append_packet_handler("chat", h, None).unwrap_err();
    assert!(matches!(err, DispatchError::DuplicateHandler { .. }));
    assert_eq!(conn.registry().handler_count("chat").unwrap(), 1);

    let bytes = conn
        .default_options()
        .encode_payload(&"hi".to_string(), conn.processing())
        .unwrap();
    assert!(conn.handle_incoming_packet(&PacketHeader::new("chat"), &bytes));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_equal_behaviour_different_handlers_both_register() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    conn.append_packet_handler("chat", counting(&calls), None)
        .unwrap();
    conn.append_packet_handler("chat", counting(&calls), None)
        .unwrap();
    assert_eq!(conn.registry().handler_count("chat").unwrap(), 2);
}

#[test]
fn test_invalid_options_leave_no_trace() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    let partial =
        SendReceiveOptions::from_parts(None, Some(vec![ProcessorKind::Lz4]), BTreeMap::new());

    let err = conn
        .append_packet_handler("chat", counting(&calls), Some(partial))
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidOptions(_)));
    assert!(conn.registry().packet_types().unwrap().is_empty());
}

#[test]
fn test_encryption_without_password_is_refused_at_registration() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    let encrypted =
        SendReceiveOptions::new(SerializerKind::Json, vec![ProcessorKind::ChaCha20Poly1305]);

    let err = conn
        .append_packet_handler("secret", counting(&calls), Some(encrypted.clone()))
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidOptions(ref m) if m.contains("password")));
    assert!(conn.registry().lookup_options("secret").unwrap().is_none());

    let keyed = encrypted.with_option("chacha20poly1305.password", "pw");
    conn.append_packet_handler("secret", counting(&calls), Some(keyed.clone()))
        .unwrap();
    assert_eq!(conn.registry().lookup_options("secret").unwrap(), Some(keyed));
}

#[test]
fn test_registered_options_are_reported() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    let json = SendReceiveOptions::new(SerializerKind::Json, vec![ProcessorKind::Zstd]);

    assert_eq!(
        conn.packet_type_options("chat").unwrap(),
        *conn.default_options()
    );
    conn.append_packet_handler("chat", counting(&calls), Some(json.clone()))
        .unwrap();
    assert_eq!(conn.packet_type_options("chat").unwrap(), json);
    assert_eq!(conn.registry().lookup_options("chat").unwrap(), Some(json));
}

#[test]
fn test_last_removal_prunes_options_and_dispatch() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    let json = SendReceiveOptions::new(SerializerKind::Json, vec![]);
    let a = counting(&calls);
    let b = counting(&calls);

    conn.append_packet_handler("chat", a.clone(), Some(json.clone()))
        .unwrap();
    conn.append_packet_handler("chat", b.clone(), Some(json.clone()))
        .unwrap();
    assert!(conn.remove_packet_handler("chat", &a).unwrap());
    assert!(conn.remove_packet_handler("chat", &b).unwrap());

    assert!(conn.registry().lookup_options("chat").unwrap().is_none());
    assert!(!conn.registry().has_handlers("chat").unwrap());

    let bytes = json
        .encode_payload(&"hi".to_string(), conn.processing())
        .unwrap();
    assert!(!conn.handle_incoming_packet(&PacketHeader::new("chat"), &bytes));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_remove_is_idempotent() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    let registered = counting(&calls);
    let never = counting(&calls);

    conn.append_packet_handler("chat", registered.clone(), None)
        .unwrap();
    assert!(!conn.remove_packet_handler("chat", &never).unwrap());
    assert_eq!(conn.registry().handler_count("chat").unwrap(), 1);

    assert!(conn.remove_packet_handler("chat", &registered).unwrap());
    assert!(!conn.remove_packet_handler("chat", &registered).unwrap());
    assert!(conn.registry().packet_types().unwrap().is_empty());
}

#[test]
fn test_remove_all_for_type_and_everything() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    let json = SendReceiveOptions::new(SerializerKind::Json, vec![]);

    conn.append_packet_handler("a", counting(&calls), Some(json.clone()))
        .unwrap();
    conn.append_packet_handler("a", counting(&calls), Some(json.clone()))
        .unwrap();
    conn.append_packet_handler("b", counting(&calls), Some(json.clone()))
        .unwrap();

    conn.remove_all_packet_handlers("a").unwrap();
    assert_eq!(conn.registry().packet_types().unwrap(), vec!["b"]);
    assert!(conn.registry().lookup_options("a").unwrap().is_none());

    // Removing an unknown type is harmless
    conn.remove_all_packet_handlers("zzz").unwrap();

    conn.remove_all_handlers().unwrap();
    assert!(conn.registry().packet_types().unwrap().is_empty());
    assert!(conn.registry().lookup_options("b").unwrap().is_none());

    // Options no longer pin the type after a full reset
    conn.append_packet_handler("b", counting(&calls), None)
        .unwrap();
}

#[test]
fn test_conflicting_registration_reports_packet_type() {
    let conn = connection();
    let calls = Arc::new(AtomicUsize::new(0));
    conn.append_packet_handler(
        "chat",
        counting(&calls),
        Some(SendReceiveOptions::new(SerializerKind::Json, vec![])),
    )
    .unwrap();

    let err = conn
        .append_packet_handler("chat", counting(&calls), None)
        .unwrap_err();
    assert!(err.to_string().contains("'chat'"));
}
