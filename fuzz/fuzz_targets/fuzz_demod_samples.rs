#![no_main]

use iso14b_rs::phy::Demod;
use libfuzzer_sys::fuzz_target;

// Arbitrary I/Q streams: frames may be empty (SOF-only) or partial, but the
// length cap and the overflow flag must stay coherent.
fuzz_target!(|data: &[u8]| {
    let mut demod = Demod::with_max_len(32);
    for pair in data.chunks_exact(2) {
        if demod.sample(pair[0] as i8, pair[1] as i8) {
            assert!(demod.len() <= 32);
            let _ = demod.overflowed();
            demod.take_frame();
        }
    }
});
