//! Frame-to-bit encoders for both transmit directions
//!
//! The reader encoder produces one modulation bit per ETU: SOF (ten zeros,
//! two ones), each byte as a 10-bit character (start 0, data LSB-first,
//! stop 1), EOF (ten zeros). The unframed variant emits the raw data bits
//! alone and exists for the Xerox slot markers, which go on the air without
//! delimiters.
//!
//! The tag encoder produces the 4×-oversampled load-modulation pattern: each
//! logical bit becomes four identical stuff bits of the *inverted* value,
//! since tag simulation acts inverted on the reader antenna. The pattern
//! leads with 10 ETU of ones (TR1) so the reader can train its phase
//! reference before the SOF arrives.

use super::tosend::ToSend;

/// Encode a reader→tag frame into `ts`, one bit per ETU.
pub fn code_as_reader(ts: &mut ToSend, data: &[u8], framing: bool) {
    ts.reset();

    if framing {
        for _ in 0..10 {
            ts.stuff_bit(false);
        }
        ts.stuff_bit(true);
        ts.stuff_bit(true);
    }

    for &byte in data {
        if framing {
            ts.stuff_bit(false);
        }
        for bit in 0..8 {
            ts.stuff_bit(byte & (1 << bit) != 0);
        }
        if framing {
            ts.stuff_bit(true);
        }
    }

    if framing {
        for _ in 0..10 {
            ts.stuff_bit(false);
        }
    }
}

fn stuff4_inverted(ts: &mut ToSend, bit: bool) {
    for _ in 0..4 {
        ts.stuff_bit(!bit);
    }
}

/// Encode a tag→reader frame into `ts`, four stuff bits per ETU.
pub fn code_as_tag(ts: &mut ToSend, data: &[u8]) {
    ts.reset();

    // TR1 synchronization preamble
    for _ in 0..10 {
        stuff4_inverted(ts, true);
    }

    // SOF
    for _ in 0..10 {
        stuff4_inverted(ts, false);
    }
    for _ in 0..2 {
        stuff4_inverted(ts, true);
    }

    for &byte in data {
        stuff4_inverted(ts, false);
        for bit in 0..8 {
            stuff4_inverted(ts, byte & (1 << bit) != 0);
        }
        stuff4_inverted(ts, true);
    }

    // EOF
    for _ in 0..10 {
        stuff4_inverted(ts, false);
    }
}
