//! # Framed-Transfer Trace Log
//!
//! Every framed transfer the reader or sniffer sees is recorded as
//! `(bytes, sof_tick, eof_tick, direction)` with timestamps in SSP ticks.
//! When only the EOF tick is observed (reception paths), the SOF tick is
//! derived by subtracting the frame's transfer time: SOF + characters + EOF
//! lengths in ETU.

use serde::{Deserialize, Serialize};

use crate::logging::log_frame_hex;
use crate::timing::etu_to_ticks;

/// Who drove the frame onto the air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Reader,
    Tag,
}

/// One framed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub data: Vec<u8>,
    pub sof_tick: u32,
    pub eof_tick: u32,
    pub direction: Direction,
}

/// Ticks a frame of `len` bytes occupies on the air: 12 ETU SOF, ten-bit
/// characters, 10 ETU EOF.
pub fn frame_transfer_ticks(len: usize) -> u32 {
    etu_to_ticks(12 + 10 * len as u32 + 10)
}

/// Append-only trace of framed transfers
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TraceLog {
    entries: Vec<TraceEntry>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a transfer with both timestamps known
    pub fn push(&mut self, data: &[u8], sof_tick: u32, eof_tick: u32, direction: Direction) {
        log_frame_hex(
            match direction {
                Direction::Reader => "rdr",
                Direction::Tag => "tag",
            },
            data,
        );
        self.entries.push(TraceEntry {
            data: data.to_vec(),
            sof_tick,
            eof_tick,
            direction,
        });
    }

    /// Record a received transfer from its EOF timestamp; the SOF timestamp
    /// is derived from the frame length.
    pub fn push_from_eof(&mut self, data: &[u8], eof_tick: u32, direction: Direction) {
        let sof_tick = eof_tick.wrapping_sub(frame_transfer_ticks(data.len()));
        self.push(data, sof_tick, eof_tick, direction);
    }

    /// Serialize the whole trace as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}
