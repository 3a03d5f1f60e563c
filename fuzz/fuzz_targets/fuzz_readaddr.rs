#![no_main]

use knxroute_core::readaddr;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(addr) = readaddr(text) {
        assert_eq!(readaddr(&addr.to_string()).ok(), Some(addr));
    }
});
