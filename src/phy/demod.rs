//! Tag-direction BPSK demodulator
//!
//! Consumes signed I/Q pairs from the 848 kHz subcarrier correlator, one pair
//! per half-ETU, and recovers the load-modulated answer of a card. Subcarrier
//! presence is judged on the cheap amplitude approximation
//! `max(|I|,|Q|) + min(|I|,|Q|)/2` against a fixed threshold.
//!
//! On first subcarrier the demodulator trains a phase reference by averaging
//! the first ten samples of constant polarity (the tag's TR1 preamble); every
//! later sample is projected onto the sign of that reference, giving a signed
//! soft decision per half-bit. Two half-bits make a bit; ten bits make a
//! character or, when the register stays all-zero, the SOF low period or the
//! EOF.
//!
//! Two non-14443-3 quirks are handled on purpose: a subcarrier that dies with
//! data already received completes the frame without an EOF (ASK CTS ends its
//! answers that way), and a SOF followed by silence is reported as an empty
//! frame (the Picopass ACTALL acknowledgement).

use crate::constants::{MAX_FRAME_SIZE, SUBCARRIER_DETECT_THRESHOLD};

/// Decoder states for the tag-direction demodulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemodState {
    Unsyncd,
    PhaseRefTraining,
    WaitForRisingEdgeOfSof,
    AwaitingStartBit,
    ReceivingData,
}

/// Counters for monitoring reception quality
#[derive(Debug, Default, Clone, Copy)]
pub struct DemodStats {
    pub frames_received: u64,
    pub sof_only_frames: u64,
    pub partial_frames: u64,
    pub training_aborts: u64,
    pub corrupt_characters: u64,
}

#[derive(Debug)]
pub struct Demod {
    state: DemodState,
    sum_i: i32,
    sum_q: i32,
    pos_count: u32,
    this_bit: i32,
    shift_reg: u16,
    bit_count: u32,
    output: Vec<u8>,
    max_len: usize,
    overflow: bool,
    stats: DemodStats,
}

fn amplitude(ci: i8, cq: i8) -> i32 {
    let ai = (ci as i32).abs();
    let aq = (cq as i32).abs();
    ai.max(aq) + ai.min(aq) / 2
}

impl Demod {
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_SIZE)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Demod {
            state: DemodState::Unsyncd,
            sum_i: 0,
            sum_q: 0,
            pos_count: 0,
            this_bit: 0,
            shift_reg: 0,
            bit_count: 0,
            output: Vec::with_capacity(max_len),
            max_len,
            overflow: false,
            stats: DemodStats::default(),
        }
    }

    /// Re-hunt the next frame
    pub fn reset(&mut self) {
        self.state = DemodState::Unsyncd;
        self.sum_i = 0;
        self.sum_q = 0;
        self.pos_count = 0;
        self.this_bit = 0;
        self.shift_reg = 0;
        self.bit_count = 0;
        self.output.clear();
        self.overflow = false;
    }

    pub fn state(&self) -> DemodState {
        self.state
    }

    /// True while no response is committed; the receive window may still
    /// time out in these states.
    pub fn may_time_out(&self) -> bool {
        matches!(
            self.state,
            DemodState::Unsyncd | DemodState::PhaseRefTraining
        )
    }

    /// True once the demodulator is past training, i.e. a tag is driving the
    /// subcarrier. The sniffer uses this to gate the reader channel.
    pub fn tag_is_active(&self) -> bool {
        !self.may_time_out()
    }

    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn frame(&self) -> &[u8] {
        &self.output
    }

    /// Phase reference accumulators, exposed for tests
    pub fn phase_ref(&self) -> (i32, i32) {
        (self.sum_i, self.sum_q)
    }

    pub fn stats(&self) -> DemodStats {
        self.stats
    }

    /// Hand the completed frame out and re-arm for the next one
    pub fn take_frame(&mut self) -> Vec<u8> {
        let frame = std::mem::take(&mut self.output);
        self.reset();
        frame
    }

    fn soft_decision(&self, ci: i8, cq: i8) -> i32 {
        let vi = if self.sum_i > 0 { ci as i32 } else { -(ci as i32) };
        let vq = if self.sum_q > 0 { cq as i32 } else { -(cq as i32) };
        vi + vq
    }

    /// Polarity of the dominant axis matches the running reference
    fn same_polarity(&self, ci: i8, cq: i8) -> bool {
        if self.sum_i.abs() > self.sum_q.abs() {
            (ci as i32 > 0) == (self.sum_i > 0)
        } else {
            (cq as i32 > 0) == (self.sum_q > 0)
        }
    }

    /// Feed one half-ETU I/Q pair. Returns true when a frame is complete;
    /// the frame may be empty (SOF-only answer) or partial (subcarrier died
    /// mid-frame with data already collected).
    pub fn sample(&mut self, ci: i8, cq: i8) -> bool {
        match self.state {
            DemodState::Unsyncd => {
                if amplitude(ci, cq) > SUBCARRIER_DETECT_THRESHOLD {
                    self.state = DemodState::PhaseRefTraining;
                    self.sum_i = ci as i32;
                    self.sum_q = cq as i32;
                    self.pos_count = 1;
                }
                false
            }

            DemodState::PhaseRefTraining => {
                if amplitude(ci, cq) <= SUBCARRIER_DETECT_THRESHOLD {
                    self.stats.training_aborts += 1;
                    self.state = DemodState::Unsyncd;
                    return false;
                }
                if self.same_polarity(ci, cq) {
                    // refine the reference over the first ten samples, hold after
                    if self.pos_count < 10 {
                        self.sum_i += ci as i32;
                        self.sum_q += cq as i32;
                    }
                    self.pos_count += 1;
                } else if self.pos_count < 10 {
                    self.stats.training_aborts += 1;
                    self.state = DemodState::Unsyncd;
                } else {
                    // phase flip after a solid reference: first half of the
                    // first SOF zero
                    self.this_bit = self.soft_decision(ci, cq);
                    self.pos_count = 1;
                    self.shift_reg = 0;
                    self.bit_count = 0;
                    self.state = DemodState::ReceivingData;
                }
                false
            }

            DemodState::WaitForRisingEdgeOfSof => {
                let v = self.soft_decision(ci, cq);
                if v > 0 {
                    if self.pos_count < 9 * 2 {
                        // rose again before a plausible SOF low period
                        self.state = DemodState::Unsyncd;
                    } else {
                        self.pos_count = 0;
                        self.bit_count = 0;
                        self.state = DemodState::AwaitingStartBit;
                    }
                } else {
                    self.pos_count += 1;
                    if self.pos_count > 12 * 2 {
                        self.state = DemodState::Unsyncd;
                    }
                }
                false
            }

            DemodState::AwaitingStartBit => {
                if amplitude(ci, cq) <= SUBCARRIER_DETECT_THRESHOLD {
                    return self.subcarrier_lost();
                }
                let v = self.soft_decision(ci, cq);
                if v > 0 {
                    self.pos_count += 1;
                    if self.pos_count > 3 * 2 {
                        // idle high past the inter-character window
                        self.state = DemodState::Unsyncd;
                        if self.bit_count == 0 && self.output.is_empty() {
                            // SOF-only answer (iCLASS/Picopass)
                            self.stats.sof_only_frames += 1;
                            return true;
                        }
                    }
                    false
                } else {
                    self.this_bit = v;
                    self.pos_count = 1;
                    self.bit_count = 0;
                    self.shift_reg = 0;
                    self.state = DemodState::ReceivingData;
                    false
                }
            }

            DemodState::ReceivingData => {
                if amplitude(ci, cq) <= SUBCARRIER_DETECT_THRESHOLD {
                    return self.subcarrier_lost();
                }
                let v = self.soft_decision(ci, cq);
                if self.pos_count == 0 {
                    self.this_bit = v;
                    self.pos_count = 1;
                    false
                } else {
                    self.this_bit += v;
                    self.shift_reg >>= 1;
                    if self.this_bit > 0 {
                        self.shift_reg |= 0x200;
                    }
                    self.bit_count += 1;
                    self.pos_count = 0;
                    if self.bit_count == 10 {
                        self.commit_character()
                    } else {
                        false
                    }
                }
            }
        }
    }

    fn subcarrier_lost(&mut self) -> bool {
        if self.output.is_empty() {
            self.state = DemodState::Unsyncd;
            false
        } else {
            // unterminated frame (ASK CTS): accept what we have
            self.stats.partial_frames += 1;
            self.state = DemodState::Unsyncd;
            true
        }
    }

    fn commit_character(&mut self) -> bool {
        let reg = self.shift_reg;
        self.bit_count = 0;
        if reg & 0x200 != 0 && reg & 0x001 == 0 {
            if self.output.len() >= self.max_len {
                self.overflow = true;
                self.state = DemodState::Unsyncd;
                return !self.output.is_empty();
            }
            self.output.push((reg >> 1) as u8);
            self.pos_count = 0;
            self.shift_reg = 0;
            self.state = DemodState::AwaitingStartBit;
            false
        } else if reg == 0 {
            if self.output.is_empty() {
                // ten zero bits with nothing received: still inside the SOF
                // low period, which this state entered after consuming
                // 10 ETU worth of half-samples
                self.pos_count = 10 * 2;
                self.state = DemodState::WaitForRisingEdgeOfSof;
                false
            } else {
                // EOF
                self.stats.frames_received += 1;
                self.state = DemodState::Unsyncd;
                true
            }
        } else {
            self.stats.corrupt_characters += 1;
            self.state = DemodState::Unsyncd;
            false
        }
    }
}

impl Default for Demod {
    fn default() -> Self {
        Self::new()
    }
}
