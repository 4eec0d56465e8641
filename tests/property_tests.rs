//! Property-based tests using proptest
//!
//! Codec and bit-packing invariants across randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use peerwire::core::bits;
use peerwire::core::buffer::NetBuffer;
use peerwire::protocol::frame::{read_frame, write_frame};
use peerwire::protocol::message::{MessagePool, MessageType};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Field {
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    Text(Option<String>),
}

fn field() -> impl Strategy<Value = Field> {
    prop_oneof![
        any::<bool>().prop_map(Field::Bool),
        any::<u8>().prop_map(Field::Byte),
        any::<i16>().prop_map(Field::Short),
        any::<i32>().prop_map(Field::Int),
        any::<i64>().prop_map(Field::Long),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Field::Bytes),
        prop::option::of(".{0,300}").prop_map(Field::Text),
    ]
}

fn write(buffer: &mut NetBuffer, field: &Field) {
    match field {
        Field::Bool(v) => buffer.write_bool(*v),
        Field::Byte(v) => buffer.write_u8(*v),
        Field::Short(v) => buffer.write_i16(*v),
        Field::Int(v) => buffer.write_i32(*v),
        Field::Long(v) => buffer.write_i64(*v),
        Field::Bytes(v) => buffer.write_bytes(v),
        Field::Text(v) => buffer.write_string(v.as_deref()),
    }
}

fn check(buffer: &mut NetBuffer, field: &Field) -> Result<(), TestCaseError> {
    match field {
        Field::Bool(v) => prop_assert_eq!(buffer.read_bool().unwrap(), *v),
        Field::Byte(v) => prop_assert_eq!(buffer.read_u8().unwrap(), *v),
        Field::Short(v) => prop_assert_eq!(buffer.read_i16().unwrap(), *v),
        Field::Int(v) => prop_assert_eq!(buffer.read_i32().unwrap(), *v),
        Field::Long(v) => prop_assert_eq!(buffer.read_i64().unwrap(), *v),
        Field::Bytes(v) => prop_assert_eq!(&buffer.read_bytes(v.len()).unwrap(), v),
        Field::Text(v) => prop_assert_eq!(&buffer.read_string().unwrap(), v),
    }
    Ok(())
}

// Property: any sequence of fields reads back in write order
proptest! {
    #[test]
    fn prop_field_sequence_roundtrip(fields in prop::collection::vec(field(), 0..32)) {
        let mut buffer = NetBuffer::new();
        for f in &fields {
            write(&mut buffer, f);
        }
        for f in &fields {
            check(&mut buffer, f)?;
        }
        prop_assert_eq!(buffer.remaining(), 0);
    }
}

// Property: an underrun fails without consuming anything
proptest! {
    #[test]
    fn prop_underrun_leaves_cursor(bytes in prop::collection::vec(any::<u8>(), 0..8), wanted in 8usize..16) {
        let mut buffer = NetBuffer::from_slice(&bytes);
        prop_assert!(buffer.read_bytes(wanted).is_err());
        prop_assert_eq!(buffer.read_position(), 0);
        prop_assert_eq!(buffer.read_bytes(bytes.len()).unwrap(), bytes);
    }
}

// Property: varints up to 28 bits survive and use the minimal width
proptest! {
    #[test]
    fn prop_varint_roundtrip(value in 0u32..(1 << 28)) {
        let mut buffer = NetBuffer::new();
        let width = buffer.write_var_u32(value);
        let expected = match value {
            0..=0x7f => 1,
            0x80..=0x3fff => 2,
            0x4000..=0x1f_ffff => 3,
            _ => 4,
        };
        prop_assert_eq!(width, expected);
        prop_assert_eq!(buffer.read_var_u32().unwrap(), value);
    }
}

// Property: n bits written at any offset read back as the low n bits
proptest! {
    #[test]
    fn prop_bit_byte_roundtrip(source in any::<u8>(), bits_count in 1u32..=8, offset in 0usize..56, fill in any::<u8>()) {
        let mut storage = [fill; 9];
        bits::write_byte(source, bits_count, &mut storage, offset);
        let mask = (0xFFu16 >> (8 - bits_count)) as u8;
        prop_assert_eq!(bits::read_byte(&storage, bits_count, offset), source & mask);
    }
}

// Property: writing bits leaves neighbouring bits untouched
proptest! {
    #[test]
    fn prop_bit_write_preserves_neighbours(source in any::<u8>(), bits_count in 1u32..=8, offset in 8usize..48) {
        let mut storage = [0xA5u8; 8];
        let before = storage;
        bits::write_byte(source, bits_count, &mut storage, offset);

        for bit in (0..64).filter(|b| *b < offset || *b >= offset + bits_count as usize) {
            let was = (before[bit / 8] >> (bit % 8)) & 1;
            let now = (storage[bit / 8] >> (bit % 8)) & 1;
            prop_assert_eq!(was, now, "bit {} changed", bit);
        }
    }
}

// Property: whole-byte runs survive unaligned placement
proptest! {
    #[test]
    fn prop_bit_bytes_roundtrip(source in prop::collection::vec(any::<u8>(), 0..32), offset in 0usize..16) {
        let mut storage = vec![0u8; source.len() + 3];
        bits::write_bytes(&source, &mut storage, offset);
        let mut out = vec![0u8; source.len()];
        bits::read_bytes(&storage, offset, &mut out);
        prop_assert_eq!(out, source);
    }
}

// Property: wide values chain through the 8-bit primitive
proptest! {
    #[test]
    fn prop_bit_u64_roundtrip(value in any::<u64>(), bits_count in 1u32..=64, offset in 0usize..24) {
        let mut storage = [0u8; 12];
        let end = bits::write_u64(value, bits_count, &mut storage, offset);
        prop_assert_eq!(end, offset + bits_count as usize);
        let mask = if bits_count == 64 { u64::MAX } else { (1u64 << bits_count) - 1 };
        prop_assert_eq!(bits::read_u64(&storage, bits_count, offset), value & mask);
    }
}

// Property: a framed message parses back to the same type and payload
proptest! {
    #[test]
    fn prop_frame_roundtrip(tag in 0u8..=6, payload in prop::collection::vec(any::<u8>(), 0..4096)) {
        let pool = MessagePool::new();
        let message_type = MessageType::try_from(tag).unwrap();
        let message = pool.acquire_with_payload(message_type, &payload);

        let mut wire = Vec::new();
        write_frame(&mut wire, &message).unwrap();
        prop_assert_eq!(wire.len(), 5 + payload.len());

        let decoded = read_frame(&mut wire.as_slice(), &pool).unwrap();
        prop_assert_eq!(decoded.message_type(), Some(message_type));
        prop_assert_eq!(decoded.as_slice(), payload.as_slice());
    }
}
