//! Discovery datagram acceptance rules

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;

use bytes::BytesMut;
use peerwire::protocol::discovery::{
    encode_datagram, parse_datagram, DiscoveryReject, PROTOCOL_VERSION,
};
use peerwire::protocol::message::{MessagePool, MessageType};
use proptest::prelude::*;

const APP: &str = "com.example.game";

fn source() -> SocketAddr {
    "10.1.2.3:10600".parse().unwrap()
}

#[test]
fn test_matching_request_delivered() {
    let pool = MessagePool::new();
    let mut message = pool.acquire(MessageType::DiscoveryRequest);
    message.write_str("who is there");

    let mut wire = BytesMut::new();
    encode_datagram(&mut wire, APP, &message, None).unwrap();

    let mut parsed = parse_datagram(&wire, source(), APP, &pool).unwrap();
    assert_eq!(parsed.message_type(), Some(MessageType::DiscoveryRequest));
    assert_eq!(parsed.remote_address(), Some(source()));
    assert_eq!(parsed.read_string().unwrap().as_deref(), Some("who is there"));
}

#[test]
fn test_app_id_prefix_is_not_a_match() {
    let pool = MessagePool::new();
    let message = pool.acquire(MessageType::DiscoveryRequest);
    let mut wire = BytesMut::new();
    encode_datagram(&mut wire, "com.example", &message, None).unwrap();
    assert!(matches!(
        parse_datagram(&wire, source(), APP, &pool),
        Err(DiscoveryReject::WrongAppId(_))
    ));
}

#[test]
fn test_stream_types_are_rejected() {
    let pool = MessagePool::new();
    for tag in [0u8, 1, 2, 3, 4, 7, 255] {
        let mut wire = vec![PROTOCOL_VERSION, APP.len() as u8];
        wire.extend_from_slice(APP.as_bytes());
        wire.extend_from_slice(&[tag, 0, 0, 0, 0]);
        assert_eq!(
            parse_datagram(&wire, source(), APP, &pool).unwrap_err(),
            DiscoveryReject::UnexpectedType(tag)
        );
    }
}

// Property: arbitrary noise never panics and never yields a message for
// a datagram without the right header
proptest! {
    #[test]
    fn prop_noise_is_rejected(noise in prop::collection::vec(any::<u8>(), 0..200)) {
        let pool = MessagePool::new();
        let accepted = parse_datagram(&noise, source(), APP, &pool);
        let header_matches = noise.len() >= 2 + APP.len()
            && noise[0] == PROTOCOL_VERSION
            && noise[1] as usize == APP.len()
            && &noise[2..2 + APP.len()] == APP.as_bytes();
        if !header_matches {
            prop_assert!(accepted.is_err());
        }
    }
}

// Property: any payload that fits survives the discovery envelope
proptest! {
    #[test]
    fn prop_response_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..1000), port in any::<u16>()) {
        let pool = MessagePool::new();
        let message = pool.acquire_with_payload(MessageType::DiscoveryResponse, &payload);
        let mut wire = BytesMut::new();
        encode_datagram(&mut wire, APP, &message, Some(port)).unwrap();

        let parsed = parse_datagram(&wire, source(), APP, &pool).unwrap();
        prop_assert_eq!(parsed.as_slice(), payload.as_slice());
        prop_assert_eq!(parsed.remote_address(), Some(SocketAddr::new(source().ip(), port)));
    }
}
