//! # Peer
//!
//! One endpoint of a framed TCP connection plus an optional discovery
//! socket.
//!
//! ## Lifecycle
//! ```text
//! Created --connect--> Connecting --close--> Disconnecting --reader exits--> Disconnected
//!            any state --fatal error--> Disconnected
//! ```
//!
//! `connect` returns at once; the socket connect runs on the context's
//! dispatcher. Once connected, a reader and a writer thread share the
//! peer's queues and a `StatusChanged(Connecting)` message is delivered
//! ahead of any data. The first fatal worker error moves the peer to
//! `Disconnected` and delivers `StatusChanged(Disconnected)`; later errors
//! are ignored.
//!
//! The application polls [`Peer::read_message`]. Discovery messages arrive
//! on the same queue as stream messages.

use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::net::TcpSocket;
use tracing::{debug, error, info, instrument, trace};

use crate::config::PeerConfiguration;
use crate::core::queue::ConcurrentQueue;
use crate::error::{constants, NetError, Result};
use crate::protocol::message::{Message, MessagePool, MessageType, PooledMessage};
use crate::protocol::status::{ConnectionStatus, PeerState};
use crate::transport::context::NetContext;
use crate::transport::discovery::DiscoverySocket;
use crate::transport::worker::{
    spawn_worker, MessageQueue, StreamReader, StreamWriter, WorkerHandle,
};

struct PeerInner {
    state: PeerState,
    stream: Option<TcpStream>,
    remote_address: Option<SocketAddr>,
    last_error: Option<String>,
    workers: Vec<WorkerHandle>,
    discovery: Option<DiscoverySocket>,
}

/// State reachable from worker threads and the connect task.
struct PeerShared {
    config: Arc<PeerConfiguration>,
    pool: MessagePool,
    incoming: MessageQueue,
    outgoing: MessageQueue,
    inner: Mutex<PeerInner>,
}

impl PeerShared {
    fn lock(&self) -> MutexGuard<'_, PeerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status_message(&self, status: ConnectionStatus) -> PooledMessage {
        let mut message = self.pool.acquire(MessageType::StatusChanged);
        message.write_u8(status.as_u8());
        message
    }

    /// Wire a connected stream to fresh reader and writer workers.
    fn attach(self: &Arc<Self>, stream: TcpStream) -> Result<()> {
        let remote = stream.peer_addr().ok();
        let reader_stream = stream.try_clone()?;
        let writer_stream = stream.try_clone()?;

        let mut inner = self.lock();
        if inner.state != PeerState::Connecting {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(NetError::InvalidState("peer closed while connecting"));
        }
        inner.stream = Some(stream);
        inner.remote_address = remote;
        self.incoming
            .enqueue(self.status_message(ConnectionStatus::Connecting));

        let prefix = &self.config.network_thread_name;
        let workers = spawn_worker(
            format!("{prefix}-reader"),
            StreamReader::new(reader_stream, self.pool.clone(), Arc::clone(&self.incoming)),
            self.error_sink(),
        )
        .and_then(|reader| {
            inner.workers.push(reader);
            spawn_worker(
                format!("{prefix}-writer"),
                StreamWriter::new(writer_stream, self.pool.clone(), Arc::clone(&self.outgoing)),
                self.error_sink(),
            )
        });
        match workers {
            Ok(writer) => inner.workers.push(writer),
            Err(e) => {
                drop(inner);
                self.handle_error(NetError::InvalidState("can't start transport workers"));
                return Err(e);
            }
        }

        info!(peer = ?remote, "Transport workers started");
        Ok(())
    }

    fn error_sink(self: &Arc<Self>) -> impl FnOnce(NetError) + Send + 'static {
        let shared: Weak<Self> = Arc::downgrade(self);
        move |error| {
            if let Some(shared) = shared.upgrade() {
                shared.handle_error(error);
            }
        }
    }

    fn connect_failed(&self, address: SocketAddr, error: std::io::Error) {
        error!(peer = %address, error = %error, "Can't connect to peer");
        let mut inner = self.lock();
        inner.state = PeerState::Disconnected;
        inner.last_error = Some(error.to_string());
        self.outgoing.close();
    }

    /// Drive the peer to `Disconnected` and notify the application, once.
    fn handle_error(&self, error: NetError) {
        let mut inner = self.lock();
        match inner.state {
            PeerState::Disconnected => {
                trace!(error = %error, "Error after disconnect ignored");
                return;
            }
            PeerState::Disconnecting => info!(reason = %error, "Connection closed"),
            _ => error!(error = %error, "Connection failed"),
        }

        inner.state = PeerState::Disconnected;
        inner.last_error = Some(error.to_string());
        Self::shutdown_locked(&mut inner);
        self.outgoing.close();
        self.incoming
            .enqueue(self.status_message(ConnectionStatus::Disconnected));
    }

    fn shutdown_locked(inner: &mut PeerInner) {
        for worker in &inner.workers {
            worker.cancel();
        }
        if let Some(stream) = inner.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Connect `address` with the configured socket buffer sizes and hand back
/// a blocking stream for the worker threads.
async fn open_stream(address: SocketAddr, config: &PeerConfiguration) -> std::io::Result<TcpStream> {
    let socket = match address {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_recv_buffer_size(buffer_size(config.receive_buffer_size))?;
    socket.set_send_buffer_size(buffer_size(config.send_buffer_size))?;

    let stream = socket.connect(address).await?.into_std()?;
    stream.set_nonblocking(false)?;
    Ok(stream)
}

pub(crate) fn buffer_size(size: usize) -> u32 {
    u32::try_from(size).unwrap_or(u32::MAX)
}

/// A connection endpoint owned by the application.
pub struct Peer {
    context: Arc<NetContext>,
    shared: Arc<PeerShared>,
}

impl Peer {
    /// New peer in the `Created` state.
    pub fn new(config: Arc<PeerConfiguration>, context: Arc<NetContext>) -> Self {
        let shared = PeerShared {
            config,
            pool: context.pool().clone(),
            incoming: Arc::new(ConcurrentQueue::new()),
            outgoing: Arc::new(ConcurrentQueue::new()),
            inner: Mutex::new(PeerInner {
                state: PeerState::Created,
                stream: None,
                remote_address: None,
                last_error: None,
                workers: Vec::new(),
                discovery: None,
            }),
        };
        Self {
            context,
            shared: Arc::new(shared),
        }
    }

    /// Peer for a stream accepted by a listener.
    pub(crate) fn from_stream(
        stream: TcpStream,
        config: Arc<PeerConfiguration>,
        context: Arc<NetContext>,
    ) -> Result<Self> {
        let peer = Self::new(config, context);
        peer.shared.lock().state = PeerState::Connecting;
        peer.shared.attach(stream)?;
        Ok(peer)
    }

    /// Start the discovery socket. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.shared.lock();
        if inner.discovery.is_none() {
            inner.discovery = Some(DiscoverySocket::start(
                Arc::clone(&self.shared.config),
                self.shared.pool.clone(),
                Arc::clone(&self.shared.incoming),
            )?);
        }
        Ok(())
    }

    /// Begin connecting to `address` and return immediately.
    ///
    /// Only valid from `Created`. A failed connect leaves the peer in
    /// `Disconnected` with [`last_error`](Self::last_error) set.
    #[instrument(skip(self))]
    pub fn connect(&self, address: SocketAddr) -> Result<()> {
        {
            let mut inner = self.shared.lock();
            if inner.state != PeerState::Created {
                return Err(NetError::InvalidState(constants::ERR_ALREADY_CONNECTING));
            }
            inner.state = PeerState::Connecting;
        }
        info!("Connecting");

        let shared = Arc::clone(&self.shared);
        self.context.dispatch(async move {
            match open_stream(address, &shared.config).await {
                Ok(stream) => {
                    if let Err(e) = shared.attach(stream) {
                        debug!(error = %e, "Connected stream discarded");
                    }
                }
                Err(e) => shared.connect_failed(address, e),
            }
        });
        Ok(())
    }

    /// Close the connection and stop discovery.
    ///
    /// With a live socket the peer moves to `Disconnecting` and the reader's
    /// exit completes the move to `Disconnected`, delivering the status
    /// message. Without one it moves straight to `Disconnected`.
    pub fn close(&self) {
        let discovery = {
            let mut inner = self.shared.lock();
            match inner.state {
                PeerState::Disconnecting | PeerState::Disconnected => {}
                _ if inner.stream.is_some() => {
                    info!("Closing connection");
                    inner.state = PeerState::Disconnecting;
                    PeerShared::shutdown_locked(&mut inner);
                    self.shared.outgoing.close();
                }
                _ => {
                    debug!(state = %inner.state, "Closing unconnected peer");
                    inner.state = PeerState::Disconnected;
                    self.shared.outgoing.close();
                }
            }
            inner.discovery.take()
        };
        // Joins the discovery threads, so done outside the lock
        drop(discovery);
    }

    /// Queue `message` for sending. Messages queued before the connection
    /// is up are sent once it is.
    pub fn send_message(&self, message: PooledMessage) -> Result<()> {
        self.shared
            .outgoing
            .try_enqueue(message)
            .map_err(|_| NetError::QueueClosed)
    }

    /// Next received message, if any. Never blocks.
    pub fn read_message(&self) -> Option<PooledMessage> {
        self.shared.incoming.dequeue()
    }

    /// Inspect the next received message without removing it.
    pub fn peek_message_with<R>(&self, f: impl FnOnce(&Message) -> R) -> Option<R> {
        self.shared.incoming.peek_with(|message| f(message))
    }

    /// Pooled `Data` message ready for writing.
    pub fn create_message(&self) -> PooledMessage {
        self.create_message_of(MessageType::Data)
    }

    pub fn create_message_of(&self, message_type: MessageType) -> PooledMessage {
        self.shared.pool.acquire(message_type)
    }

    /// Multicast a discovery request. Requires [`start`](Self::start).
    pub fn send_discovery_request(&self, payload: Option<&[u8]>) -> Result<()> {
        let inner = self.shared.lock();
        let discovery = inner
            .discovery
            .as_ref()
            .ok_or(NetError::InvalidState(constants::ERR_NOT_STARTED))?;
        discovery.send_discovery_request(payload)
    }

    /// Answer a discovery request from `remote`, advertising the configured
    /// listening port. Requires [`start`](Self::start).
    pub fn send_discovery_response(&self, remote: SocketAddr, payload: Option<&[u8]>) -> Result<()> {
        let inner = self.shared.lock();
        let discovery = inner
            .discovery
            .as_ref()
            .ok_or(NetError::InvalidState(constants::ERR_NOT_STARTED))?;
        discovery.send_discovery_response(remote, payload)
    }

    /// Local address of the discovery socket, once started.
    pub fn discovery_address(&self) -> Option<SocketAddr> {
        let inner = self.shared.lock();
        inner.discovery.as_ref().and_then(|d| d.local_addr().ok())
    }

    pub fn state(&self) -> PeerState {
        self.shared.lock().state
    }

    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.shared.lock().remote_address
    }

    /// Text of the error that disconnected the peer, for diagnostics.
    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    pub fn config(&self) -> &PeerConfiguration {
        &self.shared.config
    }

    pub fn context(&self) -> &Arc<NetContext> {
        &self.context
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.close();
        let mut workers = std::mem::take(&mut self.shared.lock().workers);
        for worker in &mut workers {
            worker.join();
        }
        if !workers.is_empty() {
            debug!(count = workers.len(), "Peer workers joined");
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Peer")
            .field("state", &inner.state)
            .field("remote_address", &inner.remote_address)
            .field("app", &self.shared.config.app_identifier)
            .finish()
    }
}

impl PeerShared {
    #[cfg(test)]
    fn worker_count(&self) -> usize {
        self.lock().workers.len()
    }
}
