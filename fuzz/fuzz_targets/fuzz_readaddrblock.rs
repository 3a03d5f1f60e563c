#![no_main]

use knxroute_core::readaddrblock;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok((start, len)) = readaddrblock(text) {
        assert!(len >= 1);
        assert!(u16::from(start.device()) + len <= 0x100);
    }
});
