//! Accepting side of a peer-to-peer connection.
//!
//! The listening socket is configured through `tokio::net::TcpSocket` so
//! buffer sizes and the backlog come from [`PeerConfiguration`]; accepted
//! connections inherit the buffer sizes and are served by the same blocking
//! workers as outbound peers.

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use tokio::net::TcpSocket;
use tracing::{debug, info, instrument};

use crate::config::PeerConfiguration;
use crate::error::Result;
use crate::transport::context::NetContext;
use crate::transport::peer::{buffer_size, Peer};

/// Listens for inbound peers.
#[derive(Debug)]
pub struct PeerListener {
    listener: TcpListener,
    config: Arc<PeerConfiguration>,
    context: Arc<NetContext>,
}

impl PeerListener {
    /// Bind `address` and start listening with the configured backlog.
    #[instrument(skip(config, context))]
    pub fn bind(
        address: SocketAddr,
        config: Arc<PeerConfiguration>,
        context: Arc<NetContext>,
    ) -> Result<Self> {
        let socket = match address {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.set_recv_buffer_size(buffer_size(config.receive_buffer_size))?;
        socket.set_send_buffer_size(buffer_size(config.send_buffer_size))?;
        socket.bind(address)?;

        // Registering with the reactor needs a runtime context
        let listener = {
            let _guard = context.handle().enter();
            socket.listen(config.backlog)?.into_std()?
        };
        listener.set_nonblocking(false)?;

        info!(local = %listener.local_addr()?, backlog = config.backlog, "Listening for peers");
        Ok(Self {
            listener,
            config,
            context,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Block until a peer connects and return it with its workers running.
    ///
    /// The returned peer is in the `Connecting` state with a
    /// `StatusChanged(Connecting)` message already queued.
    pub fn accept(&self) -> Result<Peer> {
        let (stream, remote) = self.listener.accept()?;
        debug!(%remote, "Accepted connection");
        Peer::from_stream(stream, Arc::clone(&self.config), Arc::clone(&self.context))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::status::PeerState;

    #[test]
    fn test_accepted_peer_is_running() {
        let config = Arc::new(PeerConfiguration::new("listener.test").unwrap());
        let context = Arc::new(NetContext::new().unwrap());
        let listener = PeerListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            Arc::clone(&config),
            Arc::clone(&context),
        )
        .unwrap();

        let _client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let peer = listener.accept().unwrap();
        assert_eq!(peer.state(), PeerState::Connecting);
        assert!(peer.remote_address().is_some());
        assert!(peer.read_message().is_some());
    }
}
