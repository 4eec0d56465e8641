//! Connection status values.
//!
//! [`ConnectionStatus`] is what the application sees: it travels as the
//! single payload byte of a `StatusChanged` message. [`PeerState`] is the
//! peer's private lifecycle state.

use std::fmt;

use crate::error::NetError;
use crate::protocol::message::{Message, MessageType};

/// Status reported to the application through `StatusChanged` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// No connection, or attempt, in place
    None = 0,
    /// Socket connected, transport workers running
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
    Disconnected = 4,
}

impl ConnectionStatus {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl ConnectionStatus {
    /// Status carried by a `StatusChanged` message, read without moving
    /// its cursor. `None` for any other message.
    pub fn from_message(message: &Message) -> Option<Self> {
        if message.message_type() != Some(MessageType::StatusChanged) {
            return None;
        }
        message
            .as_slice()
            .first()
            .and_then(|&b| ConnectionStatus::try_from(b).ok())
    }
}

impl TryFrom<u8> for ConnectionStatus {
    type Error = NetError;

    fn try_from(value: u8) -> Result<Self, NetError> {
        Ok(match value {
            0 => ConnectionStatus::None,
            1 => ConnectionStatus::Connecting,
            2 => ConnectionStatus::Connected,
            3 => ConnectionStatus::Disconnecting,
            4 => ConnectionStatus::Disconnected,
            other => {
                return Err(NetError::InvalidArgument(format!(
                    "Unknown connection status: {other}"
                )))
            }
        })
    }
}

/// Lifecycle of a peer.
///
/// Moves forward only, except that a fatal error drops any state straight
/// to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeerState {
    Created,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
