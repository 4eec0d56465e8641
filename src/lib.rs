//! # peerwire
//!
//! Lightweight peer-to-peer messaging for real-time applications.
//!
//! Messages travel as length-prefixed frames over TCP; peers find each other
//! through a multicast discovery channel. Every message is drawn from a pool
//! and handed between the application and the I/O threads through queues,
//! so the steady state allocates nothing.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use peerwire::{NetContext, Peer, PeerConfiguration};
//!
//! # fn main() -> peerwire::Result<()> {
//! let config = Arc::new(PeerConfiguration::new("com.example.game")?);
//! let peer = Peer::new(config, NetContext::shared()?);
//! peer.connect("127.0.0.1:9000".parse().map_err(|_| {
//!     peerwire::NetError::InvalidArgument("bad address".into())
//! })?)?;
//!
//! let mut message = peer.create_message();
//! message.write_i32(42);
//! message.write_str("hello");
//! peer.send_message(message)?;
//!
//! while let Some(mut incoming) = peer.read_message() {
//!     let _ = incoming.read_string()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::{LoggingConfig, PeerConfiguration};
pub use error::{NetError, Result};
pub use protocol::message::{Message, MessagePool, MessageType, PooledMessage};
pub use protocol::status::{ConnectionStatus, PeerState};
pub use transport::context::NetContext;
pub use transport::discovery::DiscoverySocket;
pub use transport::listener::PeerListener;
pub use transport::peer::Peer;
