//! # Byte Codec
//!
//! Growable byte buffer with an independent write length and read cursor.
//!
//! ## Encoding
//! - Fixed-width integers are big-endian.
//! - Booleans take one whole byte (`0` or `1`).
//! - Variable-length integers are base-128, least-significant group first,
//!   high bit set on every byte but the last, at most 4 bytes.
//! - Strings are `[present flag][varint byte length][UTF-8 bytes]`; a null
//!   string writes only the flag.
//!
//! ## Invariants
//! - `0 <= read_position <= length <= capacity`.
//! - Writes never fail and never shrink storage.
//! - Reads check availability first; a failed read leaves the cursor where
//!   the read started.

use crate::error::{NetError, Result};

/// Extra bytes allocated on every growth to amortize runs of small writes.
const OVER_ALLOCATE_AMOUNT: usize = 4;

/// Maximum number of bytes in an encoded variable-length `u32`.
pub const MAX_VARINT_BYTES: usize = 4;

/// Largest value representable in [`MAX_VARINT_BYTES`] bytes.
pub const MAX_VARINT_VALUE: u32 = (1 << (7 * MAX_VARINT_BYTES)) - 1;

/// Growable read/write byte buffer.
#[derive(Debug, Clone, Default)]
pub struct NetBuffer {
    /// Backing storage; `data.len()` is the capacity.
    data: Vec<u8>,
    /// Bytes logically written.
    length: usize,
    read_position: usize,
}

/// Buffers compare by written content and read cursor. Spare capacity and
/// bytes left over from earlier use are ignored.
impl PartialEq for NetBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.read_position == other.read_position && self.as_slice() == other.as_slice()
    }
}

impl Eq for NetBuffer {}

impl NetBuffer {
    /// Create an empty buffer without allocating.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with `capacity` bytes of storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            length: 0,
            read_position: 0,
        }
    }

    /// Create a buffer whose written content is a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buffer = Self::with_capacity(bytes.len());
        buffer.write_bytes(bytes);
        buffer
    }

    /// Clear length and cursor. Capacity is kept for reuse.
    pub fn reset(&mut self) {
        self.length = 0;
        self.read_position = 0;
    }

    /// Bytes logically written.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Size of the backing storage.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn read_position(&self) -> usize {
        self.read_position
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.length - self.read_position
    }

    /// Written bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Mutable view of the written bytes, used to fill a payload in place
    /// after [`set_length`](Self::set_length).
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.length]
    }

    /// Set the logical length, growing storage if needed.
    ///
    /// Newly exposed bytes are whatever the storage held; callers overwrite
    /// them. The read cursor is clamped to the new length.
    pub fn set_length(&mut self, length: usize) {
        if length > self.data.len() {
            self.data.resize(length, 0);
        }
        self.length = length;
        self.read_position = self.read_position.min(length);
    }

    /// Replace the content with `payload`, rewinding the cursor.
    pub fn set_payload(&mut self, payload: &[u8]) {
        self.reset();
        self.write_bytes(payload);
    }

    /// Move the read cursor back to the start.
    pub fn rewind(&mut self) {
        self.read_position = 0;
    }

    // ------------------------------------------------------------------
    // Writes

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_u8(&mut self, value: u8) {
        self.ensure_write_available(1);
        self.data[self.length] = value;
        self.length += 1;
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.put(&value.to_be_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.put(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.put(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.put(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.put(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.put(&value.to_be_bytes());
    }

    /// Append every byte of `bytes`.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.put(bytes);
    }

    /// Append `length` bytes of `source` starting at `offset`.
    pub fn write_bytes_range(&mut self, source: &[u8], offset: usize, length: usize) -> Result<()> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= source.len())
            .ok_or_else(|| {
                NetError::InvalidArgument(format!(
                    "Invalid offset and length values: {offset} + {length} > {}",
                    source.len()
                ))
            })?;
        self.put(&source[offset..end]);
        Ok(())
    }

    /// Append a variable-length unsigned integer. Returns the encoded size.
    ///
    /// Values above [`MAX_VARINT_VALUE`] still encode (up to five bytes) but
    /// will not read back; the protocol never produces them because string
    /// lengths are bounded by the maximum payload size.
    pub fn write_var_u32(&mut self, value: u32) -> usize {
        let mut remaining = value;
        let mut written = 1;
        while remaining >= 0x80 {
            self.write_u8((remaining as u8) | 0x80);
            remaining >>= 7;
            written += 1;
        }
        self.write_u8(remaining as u8);
        written
    }

    /// Append an optional string: presence flag, then varint length and
    /// UTF-8 bytes when present.
    pub fn write_string(&mut self, value: Option<&str>) {
        self.write_bool(value.is_some());
        if let Some(s) = value {
            self.write_var_u32(s.len() as u32);
            self.put(s.as_bytes());
        }
    }

    /// Append a present string.
    pub fn write_str(&mut self, value: &str) {
        self.write_string(Some(value));
    }

    // ------------------------------------------------------------------
    // Reads

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.check_read_available(1)?;
        let value = self.data[self.read_position];
        self.read_position += 1;
        Ok(value)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Read `count` bytes into a new vector.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        Ok(self.take_slice(count)?.to_vec())
    }

    /// Read `count` bytes into `destination[offset..offset + count]`.
    pub fn read_bytes_into(
        &mut self,
        destination: &mut [u8],
        offset: usize,
        count: usize,
    ) -> Result<()> {
        let end = offset
            .checked_add(count)
            .filter(|end| *end <= destination.len())
            .ok_or_else(|| {
                NetError::InvalidArgument(format!(
                    "Invalid offset and numberOfBytes values: {offset} + {count} > {}",
                    destination.len()
                ))
            })?;
        let source = self.take_slice(count)?;
        destination[offset..end].copy_from_slice(source);
        Ok(())
    }

    /// Read a variable-length unsigned integer of at most four bytes.
    pub fn read_var_u32(&mut self) -> Result<u32> {
        let start = self.read_position;
        let result = self.read_var_u32_inner();
        if result.is_err() {
            self.read_position = start;
        }
        result
    }

    fn read_var_u32_inner(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;
        for _ in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(NetError::InvalidVarint)
    }

    /// Read a string written with [`write_string`](Self::write_string).
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let start = self.read_position;
        let result = self.read_string_inner();
        if result.is_err() {
            self.read_position = start;
        }
        result
    }

    fn read_string_inner(&mut self) -> Result<Option<String>> {
        if !self.read_bool()? {
            return Ok(None);
        }
        let byte_length = self.read_var_u32_inner()? as usize;
        if byte_length == 0 {
            return Ok(Some(String::new()));
        }
        let bytes = self.take_slice(byte_length)?;
        std::str::from_utf8(bytes)
            .map(|s| Some(s.to_owned()))
            .map_err(|_| NetError::InvalidUtf8)
    }

    // ------------------------------------------------------------------
    // Internals

    fn put(&mut self, bytes: &[u8]) {
        self.ensure_write_available(bytes.len());
        self.data[self.length..self.length + bytes.len()].copy_from_slice(bytes);
        self.length += bytes.len();
    }

    fn take_slice(&mut self, count: usize) -> Result<&[u8]> {
        self.check_read_available(count)?;
        let start = self.read_position;
        self.read_position += count;
        Ok(&self.data[start..start + count])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take_slice(N)?);
        Ok(bytes)
    }

    #[inline]
    fn check_read_available(&self, amount: usize) -> Result<()> {
        let available = self.remaining();
        if available < amount {
            return Err(NetError::ReadUnderrun {
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    fn ensure_write_available(&mut self, amount: usize) {
        let available = self.data.len() - self.length;
        if available < amount {
            let new_capacity = self.data.len() + (amount - available) + OVER_ALLOCATE_AMOUNT;
            self.data.resize(new_capacity, 0);
        }
    }
}

impl AsRef<[u8]> for NetBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
