#![no_main]

use knxroute_core::read_group_addr;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(group) = read_group_addr(text) {
        assert_eq!(read_group_addr(&group.to_string()).ok(), Some(group));
    }
});
