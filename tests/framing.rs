//! Frame codec over blocking and async streams

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Cursor;

use futures::{SinkExt, StreamExt};
use peerwire::error::NetError;
use peerwire::protocol::frame::{
    read_frame, write_frame, FrameCodec, FrameHeader, HEADER_SIZE, MAX_PAYLOAD_LENGTH,
};
use peerwire::protocol::message::{MessagePool, MessageType};
use tokio_util::codec::{Decoder, Framed};

#[test]
fn test_exact_wire_bytes() {
    let pool = MessagePool::new();
    let mut message = pool.acquire(MessageType::Data);
    message.write_i16(0x0102);

    let mut wire = Vec::new();
    write_frame(&mut wire, &message).unwrap();
    assert_eq!(wire, vec![0, 0, 0, 0, 2, 0x01, 0x02]);
}

#[test]
fn test_max_payload_accepted_one_more_rejected() {
    let at_limit = FrameHeader::decode(&[0, 0x00, 0x30, 0x00, 0x00]).unwrap();
    assert_eq!(at_limit.payload_length, MAX_PAYLOAD_LENGTH);
    assert!(matches!(
        FrameHeader::decode(&[0, 0x00, 0x30, 0x00, 0x01]),
        Err(NetError::OversizedPayload(_))
    ));
}

#[test]
fn test_oversize_rejected_before_payload_consumed() {
    let pool = MessagePool::new();
    let mut wire = vec![MessageType::Data.as_u8()];
    wire.extend_from_slice(&u32::MAX.to_be_bytes());
    wire.extend_from_slice(b"payload that must stay unread");

    let mut stream = Cursor::new(wire);
    let err = read_frame(&mut stream, &pool).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(stream.position() as usize, HEADER_SIZE);
}

#[test]
fn test_back_to_back_frames() {
    let pool = MessagePool::new();
    let mut wire = Vec::new();
    for i in 0..5u8 {
        let message = pool.acquire_with_payload(MessageType::Data, &vec![i; i as usize]);
        write_frame(&mut wire, &message).unwrap();
    }

    let mut stream = wire.as_slice();
    for i in 0..5u8 {
        let message = read_frame(&mut stream, &pool).unwrap();
        assert_eq!(message.as_slice(), vec![i; i as usize].as_slice());
    }
    assert!(matches!(
        read_frame(&mut stream, &pool),
        Err(NetError::EndOfStream)
    ));
}

#[test]
fn test_codec_rejects_unknown_tag() {
    let mut codec = FrameCodec::default();
    let mut src = bytes::BytesMut::from(&[42u8, 0, 0, 0, 0][..]);
    assert!(matches!(
        codec.decode(&mut src),
        Err(NetError::UnknownMessageType(42))
    ));
}

#[tokio::test]
async fn test_framed_duplex_roundtrip() {
    let pool = MessagePool::new();
    let (left, right) = tokio::io::duplex(64);
    let mut sender = Framed::new(left, FrameCodec::new(pool.clone()));
    let mut receiver = Framed::new(right, FrameCodec::new(pool.clone()));

    let send = async {
        for i in 0..10 {
            let mut message = pool.acquire(MessageType::Data);
            message.write_i32(i);
            message.write_str("over the duplex pipe");
            sender.send(message).await.unwrap();
        }
    };
    let receive = async {
        for i in 0..10 {
            let mut message = receiver.next().await.unwrap().unwrap();
            assert_eq!(message.read_i32().unwrap(), i);
            assert_eq!(
                message.read_string().unwrap().as_deref(),
                Some("over the duplex pipe")
            );
        }
    };
    tokio::join!(send, receive);
}
