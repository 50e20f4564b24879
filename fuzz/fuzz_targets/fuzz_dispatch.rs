#![no_main]

use libfuzzer_sys::fuzz_target;
use peer_dispatch::config::ConnectionConfig;
use peer_dispatch::core::identifier::decode_identifier;
use peer_dispatch::{handler_fn, Connection, PacketHeader};

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let (id, payload) = data.split_at(8);
    let id = u64::from_be_bytes([id[0], id[1], id[2], id[3], id[4], id[5], id[6], id[7]]);
    let _ = decode_identifier(id);

    // The receive path must never panic, whatever the header and payload
    let conn = Connection::new(ConnectionConfig::default()).unwrap();
    conn.append_packet_handler("f", handler_fn(|_, _, _: &Vec<String>| Ok(())), None)
        .unwrap();
    let header = PacketHeader::new("f").with_serializer_identifier(id);
    let _ = conn.handle_incoming_packet(&header, payload);
});
