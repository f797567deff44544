//! Mock analog front-end for hardware-free testing
//!
//! This module provides a scripted AFE that the whole protocol stack can run
//! against without radio hardware. Transmitted FIFO words are recorded,
//! response bursts are queued ahead of time and served through the DMA ring,
//! and the SSP tick counter advances deterministically on every read.
//!
//! The synthesis helpers build the exact sample streams the real baseband
//! would deliver: 848 kHz subcarrier I/Q pairs at two samples per ETU for a
//! tag answer, and quarter-ETU demodulated reader bits for the simulator and
//! sniffer paths.

use std::cell::Cell;
use std::collections::VecDeque;

use super::{Afe, AfeError, AfeMode};

/// I/Q vector used for a logical one; odd components keep the LSBs high so a
/// sniffed reader UART sees idle carrier during tag answers.
const IQ_ONE: (i8, i8) = (31, 11);

/// I/Q vector used for a logical zero (phase-inverted one)
const IQ_ZERO: (i8, i8) = (-29, -9);

fn iq_word(ci: i8, cq: i8) -> u16 {
    ((ci as u8 as u16) << 8) | cq as u8 as u16
}

/// Scripted mock front-end.
///
/// Response bursts queued with [`queue_iq_burst`](MockAfe::queue_iq_burst)
/// (or the higher-level `queue_tag_frame`) are handed out one per
/// `dma_start`, mirroring one card answer per armed receive window.
pub struct MockAfe {
    tick: Cell<u32>,
    /// Ticks added on every `ssp_tick` read
    pub tick_step: u32,
    /// Every word pushed into the TX FIFO, in order
    pub tx_words: Vec<u16>,
    /// Every mode change requested by the core
    pub mode_log: Vec<AfeMode>,
    /// Descriptor-half reloads observed (`true` = primary)
    pub rearm_log: Vec<bool>,
    rx_bursts: VecDeque<Vec<u16>>,
    current_burst: Vec<u16>,
    dma_armed: bool,
    rx_fifo: VecDeque<u16>,
    hf_mv: u32,
    button: bool,
    /// Report the button as pressed once the current burst has drained;
    /// lets polling loops without a frame end deterministically.
    pub press_button_when_drained: bool,
    tearoff: bool,
}

impl Default for MockAfe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAfe {
    pub fn new() -> Self {
        MockAfe {
            tick: Cell::new(0),
            tick_step: 8,
            tx_words: Vec::new(),
            mode_log: Vec::new(),
            rearm_log: Vec::new(),
            rx_bursts: VecDeque::new(),
            current_burst: Vec::new(),
            dma_armed: false,
            rx_fifo: VecDeque::new(),
            hf_mv: 3300,
            button: false,
            press_button_when_drained: false,
            tearoff: false,
        }
    }

    /// Queue a raw I/Q burst for the next armed receive window
    pub fn queue_iq_burst(&mut self, words: Vec<u16>) {
        self.rx_bursts.push_back(words);
    }

    /// Queue a complete tag answer: TR1, SOF, characters, EOF as subcarrier
    /// I/Q samples at two per ETU.
    pub fn queue_tag_frame(&mut self, data: &[u8]) {
        self.queue_iq_burst(encode_tag_iq(data));
    }

    /// Queue a tag answer that stops dead after its last character (no EOF),
    /// the way an ASK CTS credential ends its frames.
    pub fn queue_tag_frame_unterminated(&mut self, data: &[u8]) {
        self.queue_iq_burst(encode_tag_iq_unterminated(data));
    }

    /// Queue a SOF-only answer (Picopass ACTALL acknowledgement)
    pub fn queue_tag_sof_only(&mut self) {
        self.queue_iq_burst(encode_tag_sof_only());
    }

    /// Push a reader frame into the RX FIFO as the demodulated bit stream the
    /// tag-simulation baseband delivers (four samples per bit, MSB first).
    pub fn queue_reader_frame_bits(&mut self, data: &[u8]) {
        for byte in pack_bits(&reader_bit_samples(data)) {
            self.rx_fifo.push_back(byte as u16);
        }
    }

    /// Press the operator button
    pub fn press_button(&mut self) {
        self.button = true;
    }

    /// Arm the one-shot tearoff signal
    pub fn arm_tearoff(&mut self) {
        self.tearoff = true;
    }

    /// Set the sampled HF field voltage
    pub fn set_hf_voltage_mv(&mut self, mv: u32) {
        self.hf_mv = mv;
    }
}

impl Afe for MockAfe {
    fn set_mode(&mut self, mode: AfeMode) -> Result<(), AfeError> {
        self.mode_log.push(mode);
        Ok(())
    }

    fn field_off(&mut self) -> Result<(), AfeError> {
        self.mode_log.push(AfeMode::Off);
        Ok(())
    }

    fn ssp_tick(&self) -> u32 {
        let now = self.tick.get();
        self.tick.set(now.wrapping_add(self.tick_step));
        now
    }

    fn tx_ready(&self) -> bool {
        true
    }

    fn tx_empty(&self) -> bool {
        true
    }

    fn tx_write(&mut self, word: u16) {
        self.tx_words.push(word);
    }

    fn rx_ready(&self) -> bool {
        !self.rx_fifo.is_empty()
    }

    fn rx_read(&mut self) -> u16 {
        self.rx_fifo.pop_front().unwrap_or(0)
    }

    fn dma_start(&mut self, len: usize) -> Result<(), AfeError> {
        if !len.is_power_of_two() {
            return Err(AfeError::Dma);
        }
        self.current_burst = self.rx_bursts.pop_front().unwrap_or_default();
        self.dma_armed = true;
        Ok(())
    }

    fn dma_stop(&mut self) {
        self.dma_armed = false;
    }

    fn dma_written(&self) -> usize {
        if self.dma_armed {
            self.current_burst.len()
        } else {
            0
        }
    }

    fn dma_word(&self, pos: usize) -> u16 {
        // one consumed word covers half an ETU of air time (16 reader ticks),
        // so the tick counter tracks the sample stream like real hardware
        self.tick.set(self.tick.get().wrapping_add(16));
        self.current_burst[pos]
    }

    fn dma_rearm(&mut self, first: bool) {
        self.rearm_log.push(first);
    }

    fn hf_voltage_mv(&mut self) -> u32 {
        self.hf_mv
    }

    fn button_pressed(&mut self) -> bool {
        if self.button {
            return true;
        }
        self.press_button_when_drained && self.rx_fifo.is_empty() && self.rx_bursts.is_empty()
    }

    fn tearoff_pending(&mut self) -> bool {
        std::mem::take(&mut self.tearoff)
    }
}

fn push_iq_etu(out: &mut Vec<u16>, bit: bool) {
    let (ci, cq) = if bit { IQ_ONE } else { IQ_ZERO };
    let w = iq_word(ci, cq);
    out.push(w);
    out.push(w);
}

fn encode_tag_body(out: &mut Vec<u16>, data: &[u8]) {
    // TR1: 10 ETU of subcarrier at the reference phase
    for _ in 0..10 {
        push_iq_etu(out, true);
    }
    // SOF: 10 ETU inverted, 2 ETU reference
    for _ in 0..10 {
        push_iq_etu(out, false);
    }
    for _ in 0..2 {
        push_iq_etu(out, true);
    }
    for &byte in data {
        push_iq_etu(out, false);
        for bit in 0..8 {
            push_iq_etu(out, byte & (1 << bit) != 0);
        }
        push_iq_etu(out, true);
    }
}

/// Subcarrier I/Q sample stream for a full tag frame, EOF included
pub fn encode_tag_iq(data: &[u8]) -> Vec<u16> {
    let mut out = Vec::new();
    encode_tag_body(&mut out, data);
    for _ in 0..10 {
        push_iq_etu(&mut out, false);
    }
    // subcarrier off
    for _ in 0..8 {
        out.push(0);
    }
    out
}

/// Same as [`encode_tag_iq`] but the subcarrier dies right after the last
/// character instead of sending an EOF
pub fn encode_tag_iq_unterminated(data: &[u8]) -> Vec<u16> {
    let mut out = Vec::new();
    encode_tag_body(&mut out, data);
    for _ in 0..8 {
        out.push(0);
    }
    out
}

/// TR1 + SOF and then silence: the Picopass ACTALL acknowledgement
pub fn encode_tag_sof_only() -> Vec<u16> {
    let mut out = Vec::new();
    for _ in 0..10 {
        push_iq_etu(&mut out, true);
    }
    for _ in 0..10 {
        push_iq_etu(&mut out, false);
    }
    for _ in 0..2 {
        push_iq_etu(&mut out, true);
    }
    // a couple of idle-high ETUs, then carrier only
    for _ in 0..4 {
        push_iq_etu(&mut out, true);
    }
    for _ in 0..8 {
        out.push(0);
    }
    out
}

/// Quarter-ETU demodulated bit stream for a reader frame (SOF, characters
/// LSB-first, EOF), with idle carrier padding on both sides.
pub fn reader_bit_samples(data: &[u8]) -> Vec<bool> {
    let mut bits = Vec::new();
    let mut push_etu = |bits: &mut Vec<bool>, b: bool| {
        for _ in 0..4 {
            bits.push(b);
        }
    };
    for _ in 0..4 {
        push_etu(&mut bits, true);
    }
    for _ in 0..10 {
        push_etu(&mut bits, false);
    }
    for _ in 0..2 {
        push_etu(&mut bits, true);
    }
    for &byte in data {
        push_etu(&mut bits, false);
        for bit in 0..8 {
            push_etu(&mut bits, byte & (1 << bit) != 0);
        }
        push_etu(&mut bits, true);
    }
    for _ in 0..10 {
        push_etu(&mut bits, false);
    }
    for _ in 0..8 {
        push_etu(&mut bits, true);
    }
    bits
}

/// Pack a bit stream MSB-first into bytes, padding the tail with idle ones
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            let mut byte = 0u8;
            for (i, &b) in chunk.iter().enumerate() {
                if b {
                    byte |= 0x80 >> i;
                }
            }
            // missing tail samples read as idle carrier
            for i in chunk.len()..8 {
                byte |= 0x80 >> i;
            }
            byte
        })
        .collect()
}

/// Sniffer sample stream: a reader frame carried on the LSBs of I and Q with
/// no subcarrier, followed by a tag frame as full I/Q words.
pub fn encode_sniff_exchange(reader_frame: &[u8], tag_frame: &[u8]) -> Vec<u16> {
    let mut out = Vec::new();
    let bits = reader_bit_samples(reader_frame);
    for pair in bits.chunks(2) {
        let ci = pair[0] as u8;
        let cq = *pair.get(1).unwrap_or(&true) as u8;
        out.push(((ci as u16) << 8) | cq as u16);
    }
    out.extend(encode_tag_iq(tag_frame));
    out
}
