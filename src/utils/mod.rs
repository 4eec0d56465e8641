//! # Utility Modules
//!
//! Supporting helpers that sit outside the protocol stack.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Address**: packed IPv4 conversions for embedding bridges

pub mod address;
pub mod logging;

pub use address::{host_string, ipv4_from_u32};
pub use logging::init_logging;
