//! # Error Types
//!
//! Error handling for the peer engine.
//!
//! This module defines every error variant that can surface from the codec,
//! the framing layer, the transport workers and the peer state machine.
//!
//! ## Error Categories
//! - **Read errors**: buffer underruns and malformed encodings. Local and
//!   recoverable, they never touch connection state.
//! - **Frame errors**: unknown type tags, oversized payloads, truncated
//!   streams. Fatal to the TCP connection that produced them.
//! - **Lifecycle errors**: calls made in the wrong peer state, closed queues.
//! - **Configuration errors**: invalid or unreadable configuration.
//!
//! Writes never fail: buffers grow on demand.
//!
//! ## Example Usage
//! ```rust
//! use peerwire::core::buffer::NetBuffer;
//! use peerwire::error::NetError;
//!
//! let mut buffer = NetBuffer::new();
//! buffer.write_u8(7);
//! assert_eq!(buffer.read_u8().unwrap(), 7);
//! assert!(matches!(buffer.read_i32(), Err(NetError::ReadUnderrun { .. })));
//! ```

use std::io;
use thiserror::Error;

/// Static error messages so hot paths do not allocate.
pub mod constants {
    pub const ERR_END_OF_STREAM: &str = "End of stream reached";
    pub const ERR_QUEUE_CLOSED: &str = "Queue closed";
    pub const ERR_ALREADY_CONNECTING: &str = "Peer is not in the Created state";
    pub const ERR_NOT_STARTED: &str = "Discovery socket is not started";
    pub const ERR_EMPTY_APP_ID: &str = "App identifier is empty";
    pub const ERR_PORT_OUT_OF_RANGE: &str = "Port is out of range";
}

/// Primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Requested read amount: {requested} available: {available}")]
    ReadUnderrun { requested: usize, available: usize },

    #[error("Can't read variable length int")]
    InvalidVarint,

    #[error("String payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Unexpected message type: {0}")]
    UnknownMessageType(u8),

    #[error("Message is too big: {0} bytes")]
    OversizedPayload(usize),

    #[error("End of stream reached")]
    EndOfStream,

    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue closed")]
    QueueClosed,

    #[error("Discovery error: {0}")]
    Discovery(String),
}

impl NetError {
    /// Whether this error must tear the owning connection down.
    ///
    /// Read underruns and argument errors stay with the immediate caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NetError::Io(_)
                | NetError::UnknownMessageType(_)
                | NetError::OversizedPayload(_)
                | NetError::EndOfStream
        )
    }
}

/// Type alias for Results using NetError
pub type Result<T> = std::result::Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(NetError::EndOfStream.is_fatal());
        assert!(NetError::UnknownMessageType(42).is_fatal());
        assert!(NetError::OversizedPayload(usize::MAX).is_fatal());
        assert!(NetError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).is_fatal());

        assert!(!NetError::ReadUnderrun {
            requested: 4,
            available: 1
        }
        .is_fatal());
        assert!(!NetError::InvalidVarint.is_fatal());
        assert!(!NetError::QueueClosed.is_fatal());
    }

    #[test]
    fn test_underrun_message_names_amounts() {
        let err = NetError::ReadUnderrun {
            requested: 8,
            available: 3,
        };
        assert_eq!(err.to_string(), "Requested read amount: 8 available: 3");
    }
}
