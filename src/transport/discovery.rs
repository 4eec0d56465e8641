//! # Discovery Socket
//!
//! UDP side channel used to find peers before any TCP connection exists.
//! Requests go to the configured multicast group; responses go straight
//! back to the requester and advertise the responder's listening port.
//!
//! The socket runs its own reader and writer workers. The reader drops
//! anything that is not a well-formed discovery datagram for this app,
//! logging at debug level, and keeps going: the group is shared with
//! unrelated traffic. Receive errors are logged and skipped the same way;
//! only cancellation stops the reader.
//!
//! A listening socket binds the group port with address reuse, so several
//! engine instances on one host can join the same group.

use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, info, trace, warn};

use crate::config::PeerConfiguration;
use crate::core::queue::ConcurrentQueue;
use crate::error::Result;
use crate::protocol::discovery::{
    check_datagram_length, encode_datagram, parse_datagram, MAX_DATAGRAM_SIZE,
};
use crate::protocol::message::{MessagePool, MessageType, PooledMessage};
use crate::transport::worker::{spawn_worker, FrameHandler, MessageQueue, WorkerHandle};

/// How long the reader blocks before re-checking for cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct OutgoingDatagram {
    address: SocketAddr,
    message: PooledMessage,
}

type DatagramQueue = Arc<ConcurrentQueue<OutgoingDatagram>>;

/// Where the reader pulls datagrams from.
trait DatagramSource: Send + Sync + 'static {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl DatagramSource for UdpSocket {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }
}

struct DatagramReader<S: DatagramSource = UdpSocket> {
    socket: Arc<S>,
    config: Arc<PeerConfiguration>,
    pool: MessagePool,
    sink: MessageQueue,
    buffer: Box<[u8; MAX_DATAGRAM_SIZE]>,
}

impl<S: DatagramSource> FrameHandler for DatagramReader<S> {
    fn step(&mut self) -> Result<ControlFlow<()>> {
        let (length, source) = match self.socket.recv_from(&mut self.buffer[..]) {
            Ok(received) => received,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                return Ok(ControlFlow::Continue(()));
            }
            Err(e) => {
                debug!(error = %e, "Discovery receive failed");
                return Ok(ControlFlow::Continue(()));
            }
        };

        match parse_datagram(
            &self.buffer[..length],
            source,
            &self.config.app_identifier,
            &self.pool,
        ) {
            Ok(message) => {
                trace!(%source, bytes = length, "Discovery datagram received");
                self.sink.enqueue(message);
            }
            Err(reject) => debug!(%source, reason = %reject, "Discovery datagram dropped"),
        }
        Ok(ControlFlow::Continue(()))
    }
}

struct DatagramWriter {
    socket: Arc<UdpSocket>,
    config: Arc<PeerConfiguration>,
    source: DatagramQueue,
    scratch: BytesMut,
}

impl FrameHandler for DatagramWriter {
    fn step(&mut self) -> Result<ControlFlow<()>> {
        let Some(datagram) = self.source.take() else {
            return Ok(ControlFlow::Break(()));
        };

        self.scratch.clear();
        if let Err(e) = encode_datagram(
            &mut self.scratch,
            &self.config.app_identifier,
            &datagram.message,
            Some(self.config.listening_port),
        ) {
            warn!(address = %datagram.address, error = %e, "Discovery datagram not encodable");
            return Ok(ControlFlow::Continue(()));
        }

        // Best effort: an unreachable group must not stop later sends
        match self.socket.send_to(&self.scratch, datagram.address) {
            Ok(sent) => trace!(address = %datagram.address, bytes = sent, "Discovery datagram sent"),
            Err(e) => warn!(address = %datagram.address, error = %e, "Discovery send failed"),
        }
        Ok(ControlFlow::Continue(()))
    }
}

/// Bind a UDP socket on `port`. A `shared` socket allows other sockets on
/// the same port.
fn bind_socket(port: u16, shared: bool) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    if shared {
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
    }
    socket.bind(&SockAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))?;
    Ok(socket.into())
}

/// Multicast discovery endpoint with its own I/O threads.
pub struct DiscoverySocket {
    config: Arc<PeerConfiguration>,
    pool: MessagePool,
    socket: Arc<UdpSocket>,
    outgoing: DatagramQueue,
    workers: Vec<WorkerHandle>,
}

impl DiscoverySocket {
    /// Bind the socket and start its workers.
    ///
    /// Received discovery messages are pushed onto `sink`. With
    /// `multicast_listen` set the socket binds the group port with address
    /// reuse and joins the group; otherwise it binds an ephemeral port and
    /// only sends to the group.
    pub fn start(
        config: Arc<PeerConfiguration>,
        pool: MessagePool,
        sink: MessageQueue,
    ) -> Result<Self> {
        let group = config.multicast_address;
        let bind_port = if config.multicast_listen { group.port() } else { 0 };
        let socket = bind_socket(bind_port, config.multicast_listen)?;
        if config.multicast_listen {
            socket.join_multicast_v4(group.ip(), &Ipv4Addr::UNSPECIFIED)?;
        }
        socket.set_multicast_loop_v4(true)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let local = socket.local_addr()?;
        let socket = Arc::new(socket);

        info!(
            %local,
            %group,
            joined = config.multicast_listen,
            "Discovery socket started"
        );

        let outgoing: DatagramQueue = Arc::new(ConcurrentQueue::new());
        let reader = spawn_worker(
            format!("{}-discovery-reader", config.network_thread_name),
            DatagramReader {
                socket: Arc::clone(&socket),
                config: Arc::clone(&config),
                pool: pool.clone(),
                sink,
                buffer: Box::new([0u8; MAX_DATAGRAM_SIZE]),
            },
            |e| warn!(error = %e, "Discovery reader stopped"),
        )?;
        let writer = spawn_worker(
            format!("{}-discovery-writer", config.network_thread_name),
            DatagramWriter {
                socket: Arc::clone(&socket),
                config: Arc::clone(&config),
                source: Arc::clone(&outgoing),
                scratch: BytesMut::with_capacity(MAX_DATAGRAM_SIZE),
            },
            |e| warn!(error = %e, "Discovery writer stopped"),
        );
        let writer = match writer {
            Ok(writer) => writer,
            Err(e) => {
                reader.cancel();
                return Err(e);
            }
        };

        Ok(Self {
            config,
            pool,
            socket,
            outgoing,
            workers: vec![reader, writer],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Queue a request to the multicast group.
    ///
    /// Fails with `InvalidArgument` if the datagram would exceed
    /// [`MAX_DATAGRAM_SIZE`].
    pub fn send_discovery_request(&self, payload: Option<&[u8]>) -> Result<()> {
        let address = self.config.multicast_socket_addr();
        self.enqueue(MessageType::DiscoveryRequest, address, payload)
    }

    /// Queue a response to `remote`, advertising the configured listening
    /// port.
    pub fn send_discovery_response(&self, remote: SocketAddr, payload: Option<&[u8]>) -> Result<()> {
        self.enqueue(MessageType::DiscoveryResponse, remote, payload)
    }

    fn enqueue(
        &self,
        message_type: MessageType,
        address: SocketAddr,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        let payload = payload.unwrap_or_default();
        check_datagram_length(&self.config.app_identifier, message_type, payload.len())?;
        let message = self.pool.acquire_with_payload(message_type, payload);
        self.outgoing.enqueue(OutgoingDatagram { address, message });
        Ok(())
    }

    /// Stop both workers and wait for them to exit.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for worker in &self.workers {
            worker.cancel();
        }
        self.outgoing.close();
        for worker in &mut self.workers {
            worker.join();
        }
        self.workers.clear();
        self.outgoing.clear();
        debug!("Discovery socket stopped");
    }
}

impl Drop for DiscoverySocket {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DiscoverySocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoverySocket")
            .field("local", &self.socket.local_addr().ok())
            .field("group", &self.config.multicast_address)
            .field("running", &!self.workers.is_empty())
            .finish()
    }
}
