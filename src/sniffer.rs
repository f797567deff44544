//! # Passive Dual-Direction Sniffer
//!
//! Demodulates both halves of a reader↔card dialogue from one I/Q sample
//! stream. The reader's ASK modulation arrives pre-sliced on the least
//! significant bits of the I and Q bytes (two quarter-ETU samples per word);
//! the card's subcarrier answer is recovered from the full-resolution pair.
//! The two decoders gate each other: card demodulation only runs while the
//! reader is quiet and an answer is plausible, and the reader UART is ignored
//! while a card is driving the subcarrier.
//!
//! The sniffer never transmits. Completed frames land in the trace with
//! SSP-tick timestamps; malformed ones are counted and logged through a
//! throttle so a noisy capture cannot flood the journal.

use log::warn;

use crate::afe::{Afe, AfeMode};
use crate::constants::{DELAY_READER_TO_ARM_SNIFF, DELAY_TAG_TO_ARM_SNIFF, DMA_BUFFER_SIZE};
use crate::crc::crc_b_verify;
use crate::error::Iso14bError;
use crate::phy::{Demod, DmaRing, Uart};
use crate::trace::{Direction, TraceLog};
use crate::util::logging::LogThrottle;

/// Counters describing one sniffing session
#[derive(Debug, Default, Clone, Copy)]
pub struct SnifferStats {
    pub reader_frames: u64,
    pub tag_frames: u64,
    pub crc_errors: u64,
}

/// The passive sniffing engine, generic over the AFE it reads.
pub struct Sniffer<A: Afe> {
    afe: A,
    uart: Uart,
    demod: Demod,
    trace: TraceLog,
    stats: SnifferStats,
    expect_tag_answer: bool,
    throttle: LogThrottle,
}

impl<A: Afe> Sniffer<A> {
    pub fn new(afe: A) -> Self {
        Sniffer {
            afe,
            uart: Uart::new(),
            demod: Demod::new(),
            trace: TraceLog::new(),
            stats: SnifferStats::default(),
            expect_tag_answer: false,
            throttle: LogThrottle::new(1000, 5),
        }
    }

    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    pub fn stats(&self) -> SnifferStats {
        self.stats
    }

    pub fn afe_mut(&mut self) -> &mut A {
        &mut self.afe
    }

    fn log_reader_frame(&mut self) {
        let frame = self.uart.take_frame();
        if !crc_b_verify(&frame) {
            self.stats.crc_errors += 1;
            if self.throttle.allow() {
                warn!("sniffed reader frame with bad checksum ({} bytes)", frame.len());
            }
        }
        let eof = self.afe.ssp_tick().wrapping_sub(DELAY_READER_TO_ARM_SNIFF);
        self.trace.push_from_eof(&frame, eof, Direction::Reader);
        self.stats.reader_frames += 1;
        self.expect_tag_answer = true;
    }

    fn log_tag_frame(&mut self) {
        let frame = self.demod.take_frame();
        if !crc_b_verify(&frame) {
            self.stats.crc_errors += 1;
            if self.throttle.allow() {
                warn!("sniffed tag frame with bad checksum ({} bytes)", frame.len());
            }
        }
        let eof = self.afe.ssp_tick().wrapping_sub(DELAY_TAG_TO_ARM_SNIFF);
        self.trace.push_from_eof(&frame, eof, Direction::Tag);
        self.stats.tag_frames += 1;
        self.expect_tag_answer = false;
    }

    /// Feed one I/Q word to both decoders with the direction gating applied.
    fn process_word(&mut self, ci: i8, cq: i8) {
        if !self.demod.tag_is_active() {
            // reader channel: quarter-ETU samples on the LSBs, I first
            if self.uart.sample(ci & 1 != 0) {
                self.log_reader_frame();
            }
            if self.uart.sample(cq & 1 != 0) {
                self.log_reader_frame();
            }
        }
        if !self.uart.in_frame() && self.expect_tag_answer {
            // card channel at half resolution
            if self.demod.sample(ci >> 1, cq >> 1) {
                self.log_tag_frame();
            }
        }
    }

    /// Sniff until the operator button is pressed.
    pub fn run(&mut self) -> Result<(), Iso14bError> {
        self.afe.set_mode(AfeMode::SniffIq)?;
        let mut ring = DmaRing::start(&mut self.afe, DMA_BUFFER_SIZE)?;
        loop {
            self.afe.watchdog_pet();
            match ring.next_sample(&mut self.afe) {
                Some((ci, cq)) => self.process_word(ci, cq),
                None => {
                    if self.afe.button_pressed() {
                        self.afe.dma_stop();
                        self.afe.field_off()?;
                        return Ok(());
                    }
                }
            }
        }
    }
}
