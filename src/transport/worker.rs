//! # Transport Workers
//!
//! One OS thread per I/O direction. A worker repeatedly calls
//! [`FrameHandler::step`] until cancellation is requested, the handler
//! finishes, or the handler fails. A failure ends the thread and is handed
//! to the worker's error callback exactly once; workers never restart.
//!
//! Cancellation is cooperative: the flag is checked between steps, so a
//! step blocked in socket I/O only returns once the owner shuts the socket
//! down or closes the queue the step is waiting on.

use std::io::Write;
use std::net::TcpStream;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::{debug, error, instrument, trace};

use crate::core::queue::ConcurrentQueue;
use crate::error::{NetError, Result};
use crate::protocol::frame::{read_frame, FrameCodec};
use crate::protocol::message::{MessagePool, PooledMessage};

/// Queue shared between a worker and the peer that owns it.
pub type MessageQueue = Arc<ConcurrentQueue<PooledMessage>>;

/// One unit of directional I/O.
pub trait FrameHandler: Send + 'static {
    /// Move one frame. `Break` ends the worker without an error.
    fn step(&mut self) -> Result<ControlFlow<()>>;
}

/// Reads frames from a stream into a queue.
pub struct StreamReader {
    stream: TcpStream,
    pool: MessagePool,
    sink: MessageQueue,
}

impl StreamReader {
    pub fn new(stream: TcpStream, pool: MessagePool, sink: MessageQueue) -> Self {
        Self { stream, pool, sink }
    }
}

impl FrameHandler for StreamReader {
    fn step(&mut self) -> Result<ControlFlow<()>> {
        let message = read_frame(&mut self.stream, &self.pool)?;
        self.sink.enqueue(message);
        Ok(ControlFlow::Continue(()))
    }
}

/// Drains a queue into a stream.
///
/// Each message is encoded into a reused buffer and written with one
/// `write_all`; the message goes back to its pool when dropped.
pub struct StreamWriter {
    stream: TcpStream,
    source: MessageQueue,
    codec: FrameCodec,
    scratch: BytesMut,
}

impl StreamWriter {
    pub fn new(stream: TcpStream, pool: MessagePool, source: MessageQueue) -> Self {
        Self {
            stream,
            source,
            codec: FrameCodec::new(pool),
            scratch: BytesMut::new(),
        }
    }
}

impl FrameHandler for StreamWriter {
    fn step(&mut self) -> Result<ControlFlow<()>> {
        let Some(message) = self.source.take() else {
            return Ok(ControlFlow::Break(()));
        };

        self.scratch.clear();
        self.codec.encode(message, &mut self.scratch)?;
        self.stream.write_all(&self.scratch)?;
        trace!(bytes = self.scratch.len(), "Frame written");
        Ok(ControlFlow::Continue(()))
    }
}

/// Handle to a running worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the worker to stop before its next step.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the thread to exit. Joining from the worker's own thread is
    /// a no-op.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                error!(worker = %self.name, "Worker thread panicked");
            }
        }
    }
}

/// Start `handler` on a new thread named `name`.
///
/// `on_error` runs on the worker thread if a step fails.
pub fn spawn_worker<H, F>(name: String, handler: H, on_error: F) -> Result<WorkerHandle>
where
    H: FrameHandler,
    F: FnOnce(NetError) + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let worker_name = name.clone();
    let thread = thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_worker(&worker_name, handler, flag, on_error))?;

    Ok(WorkerHandle {
        name,
        cancel,
        thread: Some(thread),
    })
}

#[instrument(skip(handler, cancel, on_error))]
fn run_worker<H, F>(worker: &str, mut handler: H, cancel: Arc<AtomicBool>, on_error: F)
where
    H: FrameHandler,
    F: FnOnce(NetError),
{
    debug!("Worker started");
    while !cancel.load(Ordering::Acquire) {
        match handler.step() {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(())) => break,
            Err(e) => {
                if cancel.load(Ordering::Acquire) {
                    debug!(error = %e, "Worker stopped by cancellation");
                } else {
                    error!(error = %e, "Worker failed");
                }
                on_error(e);
                return;
            }
        }
    }
    debug!("Worker finished");
}
