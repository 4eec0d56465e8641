//! # Network Context
//!
//! Owns what peers share: the message pool and the dispatcher that runs
//! asynchronous connect tasks. Peers take the context by `Arc`, so a single
//! process-wide instance ([`NetContext::shared`]) and isolated per-test
//! instances are both possible.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

use crate::error::Result;
use crate::protocol::message::MessagePool;

/// Threads in an owned dispatch runtime. Connect tasks are short-lived.
const DISPATCH_THREADS: usize = 2;

static SHARED: OnceLock<Arc<NetContext>> = OnceLock::new();

/// Shared pool plus connect dispatcher.
#[derive(Debug)]
pub struct NetContext {
    pool: MessagePool,
    runtime: Option<Runtime>,
    handle: Handle,
}

impl NetContext {
    /// Context with its own dispatch runtime.
    pub fn new() -> Result<Self> {
        Self::with_pool(MessagePool::new())
    }

    /// Context with its own dispatch runtime and the given pool.
    pub fn with_pool(pool: MessagePool) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(DISPATCH_THREADS)
            .thread_name("peerwire-dispatch")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            pool,
            runtime: Some(runtime),
            handle,
        })
    }

    /// Context that dispatches onto an existing runtime.
    pub fn with_handle(handle: Handle, pool: MessagePool) -> Self {
        Self {
            pool,
            runtime: None,
            handle,
        }
    }

    /// Process-wide context, created on first use.
    pub fn shared() -> Result<Arc<NetContext>> {
        if let Some(context) = SHARED.get() {
            return Ok(Arc::clone(context));
        }
        let context = Arc::new(NetContext::new()?);
        Ok(Arc::clone(SHARED.get_or_init(|| context)))
    }

    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Run `task` on the dispatcher.
    pub(crate) fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.handle.spawn(task));
    }
}

impl Drop for NetContext {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            debug!("Shutting down dispatch runtime");
            runtime.shutdown_background();
        }
    }
}
