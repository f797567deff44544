#![no_main]

use iso14b_rs::card::parse_atqb;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(atqb) = parse_atqb(data) {
        // whatever parsed must stay inside the coding tables
        assert!(atqb.max_frame_size() <= 257);
        assert!(atqb.fwi() <= 15);
    }
});
