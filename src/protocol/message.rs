//! Pooled message envelope.
//!
//! A [`Message`] is a [`NetBuffer`] payload plus a type tag and, for
//! datagrams, the remote endpoint. Messages are handed out by a
//! [`MessagePool`] as [`PooledMessage`] guards; dropping the guard resets
//! the message and returns it to the pool.

use std::fmt;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};

use crate::core::buffer::NetBuffer;
use crate::core::pool::{Pooled, Recycle, SyncPool};
use crate::error::NetError;

/// Frame type tags, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Data = 0,
    Error = 1,
    StatusChanged = 2,
    ConnectionRequest = 3,
    ConnectionResponse = 4,
    DiscoveryRequest = 5,
    DiscoveryResponse = 6,
}

impl MessageType {
    /// Wire value.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this type travels on the discovery channel.
    pub fn is_discovery(self) -> bool {
        matches!(
            self,
            MessageType::DiscoveryRequest | MessageType::DiscoveryResponse
        )
    }
}

impl TryFrom<u8> for MessageType {
    type Error = NetError;

    fn try_from(value: u8) -> Result<Self, NetError> {
        Ok(match value {
            0 => MessageType::Data,
            1 => MessageType::Error,
            2 => MessageType::StatusChanged,
            3 => MessageType::ConnectionRequest,
            4 => MessageType::ConnectionResponse,
            5 => MessageType::DiscoveryRequest,
            6 => MessageType::DiscoveryResponse,
            other => return Err(NetError::UnknownMessageType(other)),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Payload buffer with a type tag and an optional remote endpoint.
///
/// Derefs to its [`NetBuffer`] so fields are written and read directly on
/// the message.
#[derive(Debug, Default)]
pub struct Message {
    message_type: Option<MessageType>,
    remote_address: Option<SocketAddr>,
    buffer: NetBuffer,
}

impl Message {
    /// Tag a freshly acquired message.
    pub(crate) fn init(&mut self, message_type: MessageType) {
        self.message_type = Some(message_type);
    }

    /// Type tag; `None` only for a message sitting in its pool.
    pub fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }

    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_address
    }

    pub fn set_remote_address(&mut self, address: SocketAddr) {
        self.remote_address = Some(address);
    }

    pub fn buffer(&self) -> &NetBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut NetBuffer {
        &mut self.buffer
    }
}

impl Recycle for Message {
    fn recycle(&mut self) {
        self.message_type = None;
        self.remote_address = None;
        self.buffer.reset();
    }
}

impl Deref for Message {
    type Target = NetBuffer;

    fn deref(&self) -> &NetBuffer {
        &self.buffer
    }
}

impl DerefMut for Message {
    fn deref_mut(&mut self) -> &mut NetBuffer {
        &mut self.buffer
    }
}

/// A message on loan from a [`MessagePool`].
pub type PooledMessage = Pooled<Message>;

/// Cross-thread message pool.
///
/// Cloning is cheap and every clone shares one freelist.
#[derive(Debug, Clone, Default)]
pub struct MessagePool {
    pool: SyncPool<Message>,
}

impl MessagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool holding `count` ready messages.
    pub fn with_preallocated(count: usize) -> Self {
        Self {
            pool: SyncPool::with_preallocated(count),
        }
    }

    /// Acquire a message tagged `message_type`.
    pub fn acquire(&self, message_type: MessageType) -> PooledMessage {
        let mut message = self.pool.acquire();
        message.init(message_type);
        message
    }

    /// Acquire a message tagged `message_type` holding a copy of `payload`.
    pub fn acquire_with_payload(&self, message_type: MessageType, payload: &[u8]) -> PooledMessage {
        let mut message = self.acquire(message_type);
        message.set_payload(payload);
        message
    }

    /// Messages waiting in the freelist.
    pub fn available(&self) -> usize {
        self.pool.available()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn test_type_tags_follow_declaration_order() {
        for value in 0..=6u8 {
            assert_eq!(MessageType::try_from(value).unwrap().as_u8(), value);
        }
        assert!(matches!(
            MessageType::try_from(7),
            Err(NetError::UnknownMessageType(7))
        ));
        assert!(MessageType::DiscoveryResponse.is_discovery());
        assert!(!MessageType::Data.is_discovery());
    }

    #[test]
    fn test_recycled_message_is_blank() {
        let pool = MessagePool::new();
        {
            let mut message = pool.acquire(MessageType::DiscoveryResponse);
            message.write_i64(-1);
            message.read_i32().unwrap();
            message.set_remote_address(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                4000,
            )));
        }
        assert_eq!(pool.available(), 1);

        // Detach so the blank state can be inspected without re-tagging
        let message = pool.pool.acquire().detach();
        assert_eq!(message.message_type(), None);
        assert_eq!(message.remote_address(), None);
        assert_eq!(message.len(), 0);
        assert_eq!(message.read_position(), 0);
    }

    #[test]
    fn test_acquire_tags_message() {
        let pool = MessagePool::new();
        let message = pool.acquire_with_payload(MessageType::Error, b"oops");
        assert_eq!(message.message_type(), Some(MessageType::Error));
        assert_eq!(message.as_slice(), b"oops");
    }
}
