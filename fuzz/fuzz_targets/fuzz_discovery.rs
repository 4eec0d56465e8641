#![no_main]

use libfuzzer_sys::fuzz_target;
use peerwire::protocol::discovery::parse_datagram;
use peerwire::protocol::message::MessagePool;

fuzz_target!(|data: &[u8]| {
    let pool = MessagePool::new();
    let source = std::net::SocketAddr::from(([127, 0, 0, 1], 10600));
    let _ = parse_datagram(data, source, "fuzz.app", &pool);
});
