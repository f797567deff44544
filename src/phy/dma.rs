//! DMA ring view over the AFE sample stream
//!
//! The baseband writes one 16-bit word per sample into a circular buffer
//! shared with the CPU; the CPU reads behind the hardware write position with
//! a power-of-two modulo and reloads whichever descriptor half has drained.
//! This module owns the read cursor and the start-timestamp capture; the
//! receive loops in `reader` and `sniffer` drive it.

use crate::afe::Afe;
use crate::error::Iso14bError;

/// Read-side view of the shared I/Q ring.
#[derive(Debug)]
pub struct DmaRing {
    len: usize,
    cursor: usize,
    start_time: Option<u32>,
    arm_time: u32,
}

impl DmaRing {
    /// Arm the DMA engine over a ring of `len` words.
    pub fn start<A: Afe>(afe: &mut A, len: usize) -> Result<Self, Iso14bError> {
        if !len.is_power_of_two() {
            return Err(Iso14bError::DmaSetup);
        }
        afe.dma_start(len).map_err(|_| Iso14bError::DmaSetup)?;
        Ok(DmaRing {
            len,
            cursor: 0,
            start_time: None,
            arm_time: afe.ssp_tick(),
        })
    }

    /// SSP tick of the first sample, masked to a 16-sample boundary.
    /// Falls back to the arm time while no sample has arrived yet, so
    /// timeout arithmetic always has a base.
    pub fn start_time(&self) -> u32 {
        self.start_time.unwrap_or(self.arm_time)
    }

    /// Words consumed so far
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// True when the cursor just crossed a half-buffer boundary; callers use
    /// this to bound their button/watchdog polling.
    pub fn at_wrap(&self) -> bool {
        self.cursor > 0 && self.cursor % (self.len / 2) == 0
    }

    /// Pop the next sample as a signed I/Q pair, or `None` when the read
    /// cursor has caught up with the hardware.
    pub fn next_sample<A: Afe>(&mut self, afe: &mut A) -> Option<(i8, i8)> {
        if self.cursor >= afe.dma_written() {
            return None;
        }
        if self.start_time.is_none() {
            self.start_time = Some(afe.ssp_tick() & !0xF);
        }
        let word = afe.dma_word(self.cursor);
        self.cursor += 1;

        // a drained half must be handed back to the hardware before the
        // write pointer laps it
        let half = self.len / 2;
        if self.cursor % half == 0 {
            let drained_first = (self.cursor / half) % 2 == 1;
            afe.dma_rearm(drained_first);
        }

        Some(((word >> 8) as i8, word as i8))
    }

    /// Disable the DMA engine.
    pub fn stop<A: Afe>(self, afe: &mut A) {
        afe.dma_stop();
    }
}
