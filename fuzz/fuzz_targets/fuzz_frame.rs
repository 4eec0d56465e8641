#![no_main]

use libfuzzer_sys::fuzz_target;
use peerwire::protocol::frame::read_frame;
use peerwire::protocol::message::MessagePool;

fuzz_target!(|data: &[u8]| {
    // Frame parsing must reject or accept, never panic or over-allocate
    let pool = MessagePool::new();
    let mut stream = data;
    while let Ok(mut message) = read_frame(&mut stream, &pool) {
        while message.remaining() > 0 {
            if message.read_string().is_err() && message.read_u8().is_err() {
                break;
            }
        }
    }
});
