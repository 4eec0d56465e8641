//! # Discovery Datagrams
//!
//! Discovery traffic wraps the standard frame in an application header so
//! unrelated applications sharing the multicast group ignore each other:
//!
//! ```text
//! [Version(1)] [AppIdLen(1)] [AppId] [Type(1)] [Length(4)] [Payload] [Port(2), responses only]
//! ```
//!
//! Parsing is lenient by contract: every mismatch yields a
//! [`DiscoveryReject`] that the socket logs and drops.

use std::net::SocketAddr;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::error::{NetError, Result};
use crate::protocol::frame::{FrameHeader, HEADER_SIZE};
use crate::protocol::message::{Message, MessagePool, MessageType, PooledMessage};

/// Discovery header version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest datagram the discovery reader accepts.
pub const MAX_DATAGRAM_SIZE: usize = 1280;

/// Longest app identifier, in UTF-8 bytes.
pub const MAX_APP_ID_LENGTH: usize = 128;

/// Reasons an inbound datagram was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryReject {
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("wrong app id: {0}")]
    WrongAppId(String),

    #[error("not enough data: {0} bytes")]
    Truncated(usize),

    #[error("unexpected message type: {0}")]
    UnexpectedType(u8),

    #[error("message is too big: {0}")]
    TooBig(usize),
}

impl From<DiscoveryReject> for NetError {
    fn from(reject: DiscoveryReject) -> Self {
        NetError::Discovery(reject.to_string())
    }
}

/// Size on the wire of a discovery datagram carrying `payload_length`
/// bytes.
pub fn datagram_length(app_id: &str, message_type: MessageType, payload_length: usize) -> usize {
    let port = if message_type == MessageType::DiscoveryResponse { 2 } else { 0 };
    2 + app_id.len() + HEADER_SIZE + payload_length + port
}

/// Reject datagrams no receiver would accept.
pub fn check_datagram_length(
    app_id: &str,
    message_type: MessageType,
    payload_length: usize,
) -> Result<()> {
    let length = datagram_length(app_id, message_type, payload_length);
    if length > MAX_DATAGRAM_SIZE {
        return Err(NetError::InvalidArgument(format!(
            "Discovery datagram is {length} bytes, limit is {MAX_DATAGRAM_SIZE}"
        )));
    }
    Ok(())
}

/// Append the discovery encoding of `message` to `dst`.
///
/// `listening_port` is appended for responses and ignored otherwise.
pub fn encode_datagram(
    dst: &mut BytesMut,
    app_id: &str,
    message: &Message,
    listening_port: Option<u16>,
) -> Result<()> {
    let header = FrameHeader::for_message(message)?;
    if !header.message_type.is_discovery() {
        return Err(NetError::InvalidArgument(format!(
            "{} is not a discovery message",
            header.message_type
        )));
    }
    if app_id.len() > MAX_APP_ID_LENGTH {
        return Err(NetError::InvalidArgument(format!(
            "App identifier is {} bytes, limit is {MAX_APP_ID_LENGTH}",
            app_id.len()
        )));
    }

    check_datagram_length(app_id, header.message_type, header.payload_length)?;

    dst.reserve(datagram_length(app_id, header.message_type, header.payload_length));
    dst.put_u8(PROTOCOL_VERSION);
    dst.put_u8(app_id.len() as u8);
    dst.put_slice(app_id.as_bytes());
    dst.put_slice(&header.encode());
    dst.put_slice(message.as_slice());
    if header.message_type == MessageType::DiscoveryResponse {
        dst.put_u16(listening_port.unwrap_or(0));
    }
    Ok(())
}

/// Parse one datagram received from `source`.
///
/// For responses the returned message's remote address is `source`'s IP
/// with the advertised listening port; for requests it is `source`.
pub fn parse_datagram(
    datagram: &[u8],
    source: SocketAddr,
    app_id: &str,
    pool: &MessagePool,
) -> std::result::Result<PooledMessage, DiscoveryReject> {
    let mut buf = datagram;

    if buf.remaining() < 2 {
        return Err(DiscoveryReject::Truncated(buf.remaining()));
    }
    let version = buf.get_u8();
    if version != PROTOCOL_VERSION {
        return Err(DiscoveryReject::UnsupportedVersion(version));
    }

    let app_id_length = buf.get_u8() as usize;
    if buf.remaining() < app_id_length {
        return Err(DiscoveryReject::Truncated(buf.remaining()));
    }
    if &buf[..app_id_length] != app_id.as_bytes() {
        return Err(DiscoveryReject::WrongAppId(
            String::from_utf8_lossy(&buf[..app_id_length]).into_owned(),
        ));
    }
    buf.advance(app_id_length);

    if buf.remaining() < HEADER_SIZE {
        return Err(DiscoveryReject::Truncated(buf.remaining()));
    }
    let tag = buf.get_u8();
    let message_type = match MessageType::try_from(tag) {
        Ok(t) if t.is_discovery() => t,
        _ => return Err(DiscoveryReject::UnexpectedType(tag)),
    };
    let payload_length = buf.get_u32() as usize;

    let trailer = if message_type == MessageType::DiscoveryResponse {
        2
    } else {
        0
    };
    if payload_length.saturating_add(trailer) > buf.remaining() {
        return Err(DiscoveryReject::TooBig(payload_length));
    }

    let mut message = pool.acquire(message_type);
    message.set_payload(&buf[..payload_length]);
    buf.advance(payload_length);

    let remote = if trailer > 0 {
        SocketAddr::new(source.ip(), buf.get_u16())
    } else {
        source
    };
    message.set_remote_address(remote);
    Ok(message)
}
