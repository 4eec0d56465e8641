//! # Frame Format
//!
//! One frame per message on the TCP stream:
//!
//! ```text
//! [Type(1)] [Length(4), big-endian] [Payload(Length)]
//! ```
//!
//! The declared length is checked against [`MAX_PAYLOAD_LENGTH`] before any
//! payload byte is read, so a hostile length never drives an allocation.
//!
//! Blocking helpers ([`read_frame`], [`write_frame`]) serve the transport
//! worker threads; [`FrameCodec`] drives the same format through
//! `tokio_util::codec::Framed` for async streams.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::{NetError, Result};
use crate::protocol::message::{Message, MessagePool, MessageType, PooledMessage};

/// Frame header size: type byte plus 4-byte length.
pub const HEADER_SIZE: usize = 1 + 4;

/// Largest payload accepted on the wire (3 MiB).
pub const MAX_PAYLOAD_LENGTH: usize = 3 * 1024 * 1024;

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub message_type: MessageType,
    pub payload_length: usize,
}

impl FrameHeader {
    pub fn new(message_type: MessageType, payload_length: usize) -> Self {
        Self {
            message_type,
            payload_length,
        }
    }

    /// Header for `message`. Fails for untagged or oversized messages.
    pub fn for_message(message: &Message) -> Result<Self> {
        let message_type = message
            .message_type()
            .ok_or(NetError::InvalidState("message has no type"))?;
        if message.len() > MAX_PAYLOAD_LENGTH {
            return Err(NetError::OversizedPayload(message.len()));
        }
        Ok(Self::new(message_type, message.len()))
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let length = (self.payload_length as u32).to_be_bytes();
        [
            self.message_type.as_u8(),
            length[0],
            length[1],
            length[2],
            length[3],
        ]
    }

    /// Parse and validate a header: known type tag, length within bounds.
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let message_type = MessageType::try_from(bytes[0])?;
        let payload_length = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        if payload_length > MAX_PAYLOAD_LENGTH {
            return Err(NetError::OversizedPayload(payload_length));
        }
        Ok(Self::new(message_type, payload_length))
    }
}

/// Read exactly `buffer.len()` bytes, looping over partial reads.
///
/// A stream that ends first is [`NetError::EndOfStream`].
pub fn read_fully<R: Read + ?Sized>(stream: &mut R, buffer: &mut [u8]) -> Result<()> {
    let mut offset = 0;
    while offset < buffer.len() {
        match stream.read(&mut buffer[offset..]) {
            Ok(0) => return Err(NetError::EndOfStream),
            Ok(n) => offset += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(NetError::Io(e)),
        }
    }
    Ok(())
}

/// Read one frame from `stream` into a message from `pool`.
pub fn read_frame<R: Read + ?Sized>(stream: &mut R, pool: &MessagePool) -> Result<PooledMessage> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    read_fully(stream, &mut header_bytes)?;
    let header = FrameHeader::decode(&header_bytes)?;

    let mut message = pool.acquire(header.message_type);
    message.set_length(header.payload_length);
    read_fully(stream, message.as_mut_slice())?;

    trace!(
        message_type = %header.message_type,
        bytes = header.payload_length,
        "Frame received"
    );
    Ok(message)
}

/// Write `message` as one frame.
pub fn write_frame<W: Write + ?Sized>(stream: &mut W, message: &Message) -> Result<()> {
    let header = FrameHeader::for_message(message)?;
    stream.write_all(&header.encode())?;
    stream.write_all(message.as_slice())?;
    trace!(
        message_type = %header.message_type,
        bytes = header.payload_length,
        "Frame sent"
    );
    Ok(())
}

/// `tokio_util` codec for the frame format.
///
/// Decoded frames land in messages drawn from the codec's pool.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    pool: MessagePool,
}

impl FrameCodec {
    pub fn new(pool: MessagePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }

    fn encode_message(&self, message: &Message, dst: &mut BytesMut) -> Result<()> {
        let header = FrameHeader::for_message(message)?;
        dst.reserve(HEADER_SIZE + header.payload_length);
        dst.put_slice(&header.encode());
        dst.put_slice(message.as_slice());
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = PooledMessage;
    type Error = NetError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<PooledMessage>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&src[..HEADER_SIZE]);
        let header = FrameHeader::decode(&header_bytes)?;

        let frame_length = HEADER_SIZE + header.payload_length;
        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(header.payload_length);
        let mut message = self.pool.acquire(header.message_type);
        message.set_payload(&payload);
        Ok(Some(message))
    }
}

impl<'a> Encoder<&'a Message> for FrameCodec {
    type Error = NetError;

    fn encode(&mut self, message: &'a Message, dst: &mut BytesMut) -> Result<()> {
        self.encode_message(message, dst)
    }
}

impl Encoder<PooledMessage> for FrameCodec {
    type Error = NetError;

    fn encode(&mut self, message: PooledMessage, dst: &mut BytesMut) -> Result<()> {
        self.encode_message(&message, dst)
    }
}
