//! # Type B Tag Simulator
//!
//! Answers a reader the way a standard 14443-3 Type B card would: the
//! IDLE/READY/ACTIVE/HALT card state machine driven by WUPB, REQB, HLTB and
//! ATTRIB frames, with a POWER_OFF super-state tied to the measured HF field
//! voltage.
//!
//! Both possible answers (the ATQB and the 3-byte OK) are encoded into
//! load-modulation patterns once at startup; responding is re-transmitting a
//! pre-built pattern after the TR0 guard, never re-encoding.

use log::{debug, info};

use crate::afe::{Afe, AfeMode};
use crate::constants::{
    ISO14443B_ATQB, ISO14443B_ATTRIB, ISO14443B_HALT, ISO14443B_REQB, ISO14443B_WUPB_PARAM,
    MF_MINFIELDV, TAG_SIM_TR0_GUARD_US,
};
use crate::crc::crc_b_append;
use crate::error::Iso14bError;
use crate::phy::{encode, ToSend, Uart};
use crate::timing::{ticks_elapsed, us_to_ticks_tag};

/// Card activation states per 14443-3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    PowerOff,
    Idle,
    Ready,
    Active,
    Halt,
}

/// Commands the simulator distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCommand {
    Wupb,
    Reqb,
    Hltb,
    Attrib,
    Other,
}

/// Answer patterns the simulator can replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Atqb,
    Ok,
}

/// Identity the simulated card announces
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub pupi: [u8; 4],
    pub app_data: [u8; 4],
    pub protocol_info: [u8; 3],
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            pupi: [0x82, 0x0D, 0xE1, 0x74],
            app_data: [0x20, 0x38, 0x19, 0x22],
            // 106 kbit/s only, max frame 32, 14443-4, FWI 8
            protocol_info: [0x00, 0x21, 0x85],
        }
    }
}

/// Counters exposed for tests and status reporting
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatorStats {
    pub atqb_sent: u64,
    pub ok_sent: u64,
    pub frames_ignored: u64,
    pub crc_rejects: u64,
}

/// The tag-simulation engine, generic over the AFE it drives.
pub struct Simulator<A: Afe> {
    afe: A,
    state: TagState,
    uart: Uart,
    atqb_pattern: ToSend,
    ok_pattern: ToSend,
    power_window: [u32; 32],
    power_idx: usize,
    power_sum: u32,
    stats: SimulatorStats,
}

impl<A: Afe> Simulator<A> {
    pub fn new(afe: A, config: SimulatorConfig) -> Self {
        let mut atqb = vec![ISO14443B_ATQB];
        atqb.extend_from_slice(&config.pupi);
        atqb.extend_from_slice(&config.app_data);
        atqb.extend_from_slice(&config.protocol_info);
        crc_b_append(&mut atqb);

        let mut ok = vec![0x00];
        crc_b_append(&mut ok);

        let mut atqb_pattern = ToSend::new();
        encode::code_as_tag(&mut atqb_pattern, &atqb);
        let mut ok_pattern = ToSend::new();
        encode::code_as_tag(&mut ok_pattern, &ok);

        Simulator {
            afe,
            state: TagState::PowerOff,
            uart: Uart::new(),
            atqb_pattern,
            ok_pattern,
            power_window: [0; 32],
            power_idx: 0,
            power_sum: 0,
            stats: SimulatorStats::default(),
        }
    }

    pub fn state(&self) -> TagState {
        self.state
    }

    pub fn stats(&self) -> SimulatorStats {
        self.stats
    }

    pub fn afe_mut(&mut self) -> &mut A {
        &mut self.afe
    }

    /// Sort an incoming frame into the command classes of the transition
    /// table. Length and command byte decide; the WUPB bit of the PARAM byte
    /// separates WUPB from REQB.
    pub fn classify(frame: &[u8]) -> TagCommand {
        match (frame.len(), frame.first()) {
            (5, Some(&ISO14443B_REQB)) => {
                if frame[2] & ISO14443B_WUPB_PARAM != 0 {
                    TagCommand::Wupb
                } else {
                    TagCommand::Reqb
                }
            }
            (7, Some(&ISO14443B_HALT)) => TagCommand::Hltb,
            (11, Some(&ISO14443B_ATTRIB)) => TagCommand::Attrib,
            _ => TagCommand::Other,
        }
    }

    /// Apply one frame to the card state machine; the returned answer (if
    /// any) has already been chosen but not transmitted.
    fn transition(&mut self, cmd: TagCommand) -> Option<Answer> {
        use TagCommand::*;
        use TagState::*;

        let (answer, next) = match (self.state, cmd) {
            (PowerOff, _) => (None, PowerOff),

            (Idle, Wupb) | (Idle, Reqb) => (Some(Answer::Atqb), Ready),
            (Idle, Hltb) => (Some(Answer::Ok), Idle),

            (Ready, Wupb) | (Ready, Reqb) => (Some(Answer::Atqb), Ready),
            (Ready, Hltb) => (Some(Answer::Ok), Halt),
            (Ready, Attrib) => (Some(Answer::Ok), Active),

            (Active, Wupb) | (Active, Reqb) => (Some(Answer::Atqb), Active),
            (Active, Hltb) => (Some(Answer::Ok), Active),
            (Active, Attrib) => (Some(Answer::Ok), Active),

            (Halt, Wupb) => (Some(Answer::Atqb), Ready),

            (state, _) => (None, state),
        };

        if next != self.state {
            debug!("tag state {:?} -> {next:?} on {cmd:?}", self.state);
        }
        self.state = next;
        if answer.is_none() {
            self.stats.frames_ignored += 1;
        }
        answer
    }

    /// Feed one received frame through the state machine and send the chosen
    /// answer. Exposed so tests can drive the table without a bit stream.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Result<(), Iso14bError> {
        if !crate::crc::crc_b_verify(frame) {
            self.stats.crc_rejects += 1;
            debug!("dropping frame with bad checksum ({} bytes)", frame.len());
            return Ok(());
        }
        match self.transition(Self::classify(frame)) {
            Some(Answer::Atqb) => {
                self.stats.atqb_sent += 1;
                self.respond(Answer::Atqb)
            }
            Some(Answer::Ok) => {
                self.stats.ok_sent += 1;
                self.respond(Answer::Ok)
            }
            None => Ok(()),
        }
    }

    /// Replay a pre-encoded pattern: TR0 guard in no-modulation mode, then
    /// BPSK until the pattern has drained.
    fn respond(&mut self, answer: Answer) -> Result<(), Iso14bError> {
        let guard = us_to_ticks_tag(TAG_SIM_TR0_GUARD_US);
        let t0 = self.afe.ssp_tick();
        while ticks_elapsed(self.afe.ssp_tick(), t0) < guard {
            self.afe.watchdog_pet();
        }

        self.afe.set_mode(AfeMode::SimBpsk)?;
        let pattern = match answer {
            Answer::Atqb => &self.atqb_pattern,
            Answer::Ok => &self.ok_pattern,
        };
        for &byte in pattern.bytes() {
            while !self.afe.tx_ready() {
                self.afe.watchdog_pet();
            }
            self.afe.tx_write(byte as u16);
        }
        while !self.afe.tx_empty() {
            self.afe.watchdog_pet();
        }
        self.afe.set_mode(AfeMode::SimNoMod)?;
        Ok(())
    }

    /// Track the HF field with a rolling 32-sample voltage sum; dropping
    /// under the threshold resets the card to POWER_OFF, recovering raises it
    /// into IDLE.
    fn update_power(&mut self) {
        let v = self.afe.hf_voltage_mv();
        self.power_sum = self.power_sum - self.power_window[self.power_idx] + v;
        self.power_window[self.power_idx] = v;
        self.power_idx = (self.power_idx + 1) % self.power_window.len();

        let avg = self.power_sum / self.power_window.len() as u32;
        if avg < MF_MINFIELDV {
            if self.state != TagState::PowerOff {
                info!("field lost, tag to POWER_OFF");
                self.state = TagState::PowerOff;
                self.uart.reset();
            }
        } else if self.state == TagState::PowerOff {
            debug!("field detected, tag to IDLE");
            self.state = TagState::Idle;
        }
    }

    /// Main polling loop: power detection, reader UART, state machine,
    /// response replay. Returns when the operator button is pressed.
    pub fn run(&mut self) -> Result<(), Iso14bError> {
        self.afe.set_mode(AfeMode::SimNoMod)?;
        loop {
            self.afe.watchdog_pet();
            if self.afe.button_pressed() {
                self.afe.field_off()?;
                return Ok(());
            }
            self.update_power();
            if self.state == TagState::PowerOff {
                continue;
            }
            if !self.afe.rx_ready() {
                continue;
            }
            let word = self.afe.rx_read() as u8;
            for shift in (0..8).rev() {
                if self.uart.sample(word & (1 << shift) != 0) {
                    let frame = self.uart.take_frame();
                    self.handle_frame(&frame)?;
                }
            }
        }
    }
}
