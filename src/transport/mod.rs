//! # Transport Layer
//!
//! Sockets, threads and the peer state machine.
//!
//! ## Threading
//! - One reader and one writer thread per connected [`Peer`](peer::Peer)
//! - One reader and one writer thread per [`DiscoverySocket`](discovery::DiscoverySocket)
//! - A small dispatch runtime in [`NetContext`](context::NetContext) for connects
//!
//! Threads meet only at the internally synchronized message queues.

pub mod context;
pub mod discovery;
pub mod listener;
pub mod peer;
pub mod worker;
