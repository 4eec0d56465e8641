//! # Protocol Layer
//!
//! Wire formats and the message envelope.
//!
//! ## Components
//! - **message**: type tags, the pooled [`Message`](message::Message) and its pool
//! - **frame**: `[type][length][payload]` framing, blocking and `tokio-util` codecs
//! - **discovery**: application header for multicast discovery datagrams
//! - **status**: connection status payloads and peer lifecycle states
//!
//! ## Wire Format
//! ```text
//! TCP frame : [Type(1)] [Length(4, BE)] [Payload]
//! Datagram  : [Version(1)] [AppIdLen(1)] [AppId] [TCP frame] [Port(2, BE), responses]
//! ```

pub mod discovery;
pub mod frame;
pub mod message;
pub mod status;
