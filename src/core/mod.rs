//! # Core Components
//!
//! Allocation-light building blocks shared by every layer above.
//!
//! ## Components
//! - **buffer**: growable byte codec with independent read/write cursors
//! - **bits**: sub-byte bit packing at arbitrary bit offsets
//! - **pool**: recycling allocators, unlocked and cross-thread
//! - **list**: arena-backed intrusive doubly linked list with owner tags
//! - **queue**: FIFO with non-blocking dequeue and blocking take
//!
//! ## Encoding
//! ```text
//! int16/32/64 : big-endian
//! bool        : 1 byte (0 | 1)
//! varint      : 7 bits per byte, low group first, high bit = continuation, <= 4 bytes
//! string      : [present][varint length][UTF-8]
//! ```

pub mod bits;
pub mod buffer;
pub mod list;
pub mod pool;
pub mod queue;
