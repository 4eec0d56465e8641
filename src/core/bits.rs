//! Sub-byte bit packing on raw byte slices.
//!
//! Bits are addressed LSB-first: bit offset `n` is bit `n % 8` of byte
//! `n / 8`. Multi-byte helpers chain the 8-bit primitive, low byte first;
//! callers pick how many bits of each value travel with `number_of_bits`.
//!
//! Bit counts outside the documented range and offsets past the end of the
//! slice are programming errors and panic.

/// Read 1-8 bits starting at `read_bit_offset`.
pub fn read_byte(from: &[u8], number_of_bits: u32, read_bit_offset: usize) -> u8 {
    assert!(
        (1..=8).contains(&number_of_bits),
        "read_byte() can only read between 1 and 8 bits"
    );

    let byte_ptr = read_bit_offset >> 3;
    let start_read_at = (read_bit_offset & 0x7) as u32;

    if start_read_at == 0 && number_of_bits == 8 {
        return from[byte_ptr];
    }

    // Drop bits below the start offset
    let first = from[byte_ptr] >> start_read_at;

    let bits_in_second = number_of_bits as i32 - (8 - start_read_at as i32);
    if bits_in_second < 1 {
        return first & (0xFF >> (8 - number_of_bits));
    }

    let second = from[byte_ptr + 1] & (0xFF >> (8 - bits_in_second as u32));
    first | (second << (number_of_bits - bits_in_second as u32))
}

/// Read `destination.len()` whole bytes starting at `read_bit_offset`.
pub fn read_bytes(from: &[u8], read_bit_offset: usize, destination: &mut [u8]) {
    let mut read_ptr = read_bit_offset >> 3;
    let start_read_at = (read_bit_offset & 0x7) as u32;

    if start_read_at == 0 {
        destination.copy_from_slice(&from[read_ptr..read_ptr + destination.len()]);
        return;
    }

    let second_part_len = 8 - start_read_at;
    let second_mask = 0xFFu8 >> second_part_len;

    for out in destination.iter_mut() {
        let low = from[read_ptr] >> start_read_at;
        read_ptr += 1;
        let high = from[read_ptr] & second_mask;
        *out = low | (high << second_part_len);
    }
}

/// Write the low 0-8 bits of `source` at `dest_bit_offset`, leaving the
/// surrounding bits untouched.
pub fn write_byte(source: u8, number_of_bits: u32, destination: &mut [u8], dest_bit_offset: usize) {
    if number_of_bits == 0 {
        return;
    }
    assert!(number_of_bits <= 8, "Must write between 0 and 8 bits");

    let source = source & (0xFF >> (8 - number_of_bits));

    let p = dest_bit_offset >> 3;
    let bits_used = (dest_bit_offset & 0x7) as u32;
    let bits_free = 8 - bits_used;

    // Fast path, everything fits in the first byte
    if bits_free >= number_of_bits {
        let bits_left = bits_free - number_of_bits;
        let keep_low = low_mask(bits_used);
        let keep_high = !low_mask(8 - bits_left);
        destination[p] = (destination[p] & (keep_low | keep_high)) | (source << bits_used);
        return;
    }

    // Low part of source goes to the upper bits of the first byte
    destination[p] = (destination[p] & low_mask(bits_used)) | (source << bits_used);

    // Remaining high part goes to the lower bits of the second byte
    let spill = number_of_bits - bits_free;
    destination[p + 1] = (destination[p + 1] & !low_mask(spill)) | (source >> bits_free);
}

/// Write `source` as whole bytes at `dest_bit_offset`.
pub fn write_bytes(source: &[u8], destination: &mut [u8], dest_bit_offset: usize) {
    let mut dst_ptr = dest_bit_offset >> 3;
    let first_part_len = (dest_bit_offset & 0x7) as u32;

    if first_part_len == 0 {
        destination[dst_ptr..dst_ptr + source.len()].copy_from_slice(source);
        return;
    }

    let last_part_len = 8 - first_part_len;

    for &src in source {
        destination[dst_ptr] &= 0xFF >> last_part_len;
        destination[dst_ptr] |= src << first_part_len;

        dst_ptr += 1;

        destination[dst_ptr] &= 0xFF << first_part_len;
        destination[dst_ptr] |= src >> last_part_len;
    }
}

/// Read 1-16 bits as a `u16`.
pub fn read_u16(from: &[u8], number_of_bits: u32, read_bit_offset: usize) -> u16 {
    assert!(
        (1..=16).contains(&number_of_bits),
        "read_u16() can only read between 1 and 16 bits"
    );
    read_chained(from, number_of_bits, read_bit_offset) as u16
}

/// Read 1-32 bits as a `u32`.
pub fn read_u32(from: &[u8], number_of_bits: u32, read_bit_offset: usize) -> u32 {
    assert!(
        (1..=32).contains(&number_of_bits),
        "read_u32() can only read between 1 and 32 bits"
    );
    read_chained(from, number_of_bits, read_bit_offset) as u32
}

/// Read 1-64 bits as a `u64`.
pub fn read_u64(from: &[u8], number_of_bits: u32, read_bit_offset: usize) -> u64 {
    assert!(
        (1..=64).contains(&number_of_bits),
        "read_u64() can only read between 1 and 64 bits"
    );
    read_chained(from, number_of_bits, read_bit_offset)
}

/// Write the low 0-16 bits of `source`. Returns the bit offset past the write.
pub fn write_u16(source: u16, number_of_bits: u32, destination: &mut [u8], offset: usize) -> usize {
    assert!(number_of_bits <= 16, "number_of_bits must be between 0 and 16");
    write_chained(u64::from(source), number_of_bits, destination, offset)
}

/// Write the low 0-32 bits of `source`. Returns the bit offset past the write.
pub fn write_u32(source: u32, number_of_bits: u32, destination: &mut [u8], offset: usize) -> usize {
    assert!(number_of_bits <= 32, "number_of_bits must be between 0 and 32");
    write_chained(u64::from(source), number_of_bits, destination, offset)
}

/// Write the low 0-64 bits of `source`. Returns the bit offset past the write.
pub fn write_u64(source: u64, number_of_bits: u32, destination: &mut [u8], offset: usize) -> usize {
    assert!(number_of_bits <= 64, "number_of_bits must be between 0 and 64");
    write_chained(source, number_of_bits, destination, offset)
}

fn read_chained(from: &[u8], mut number_of_bits: u32, mut offset: usize) -> u64 {
    let mut value = 0u64;
    let mut shift = 0;
    while number_of_bits > 0 {
        let chunk = number_of_bits.min(8);
        value |= u64::from(read_byte(from, chunk, offset)) << shift;
        number_of_bits -= chunk;
        offset += chunk as usize;
        shift += 8;
    }
    value
}

fn write_chained(source: u64, mut number_of_bits: u32, destination: &mut [u8], mut offset: usize) -> usize {
    let mut shift = 0;
    while number_of_bits > 0 {
        let chunk = number_of_bits.min(8);
        write_byte((source >> shift) as u8, chunk, destination, offset);
        number_of_bits -= chunk;
        offset += chunk as usize;
        shift += 8;
    }
    offset
}

#[inline]
fn low_mask(bits: u32) -> u8 {
    if bits >= 8 {
        0xFF
    } else {
        (1u8 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_width_and_offset_roundtrips() {
        for bits in 1..=8u32 {
            for offset in 0..16usize {
                for source in [0x00u8, 0xFF, 0xA5, 0x5A, 0x81] {
                    let mut buffer = [0u8; 4];
                    write_byte(source, bits, &mut buffer, offset);
                    let expected = source & (0xFF >> (8 - bits));
                    assert_eq!(
                        read_byte(&buffer, bits, offset),
                        expected,
                        "bits={bits} offset={offset} source={source:#x}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_write_preserves_neighbours() {
        let mut buffer = [0xFFu8; 3];
        write_byte(0, 5, &mut buffer, 6);
        // bits 6..11 cleared, everything else still set
        assert_eq!(buffer, [0b0011_1111, 0b1111_1000, 0xFF]);
    }

    #[test]
    fn test_zero_bits_is_noop() {
        let mut buffer = [0xAAu8; 2];
        write_byte(0xFF, 0, &mut buffer, 3);
        assert_eq!(buffer, [0xAA, 0xAA]);
    }

    #[test]
    fn test_unaligned_byte_runs() {
        let source = [0xDE, 0xAD, 0xBE, 0xEF];
        for offset in 0..8usize {
            let mut buffer = [0u8; 6];
            write_bytes(&source, &mut buffer, offset);
            let mut out = [0u8; 4];
            read_bytes(&buffer, offset, &mut out);
            assert_eq!(out, source, "offset={offset}");
        }
    }

    #[test]
    fn test_packed_fields_share_bytes() {
        let mut buffer = [0u8; 10];
        let mut offset = write_u32(5, 3, &mut buffer, 0);
        offset = write_u16(0x3FF, 10, &mut buffer, offset);
        offset = write_u64(u64::MAX >> 4, 60, &mut buffer, offset);
        assert_eq!(offset, 73);

        assert_eq!(read_u32(&buffer, 3, 0), 5);
        assert_eq!(read_u16(&buffer, 10, 3), 0x3FF);
        assert_eq!(read_u64(&buffer, 60, 13), u64::MAX >> 4);
    }

    #[test]
    #[should_panic(expected = "between 1 and 8 bits")]
    fn test_read_nine_bits_panics() {
        read_byte(&[0, 0], 9, 0);
    }
}
