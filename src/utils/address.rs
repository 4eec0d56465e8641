//! Packed IPv4 address helpers.
//!
//! Embedding bridges pass addresses as a host-order `u32` with the first
//! octet in the most significant byte.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Socket address from a packed IPv4 address and a port.
pub fn ipv4_from_u32(address: u32, port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(address), port))
}

/// Dotted-quad text for a packed IPv4 address.
pub fn host_string(address: u32) -> String {
    Ipv4Addr::from(address).to_string()
}
