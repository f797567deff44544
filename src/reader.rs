//! # Reader Layer-2/3 Engine
//!
//! Drives the RF field, schedules frame transmission against the TR0/TR2
//! guard times, receives card answers through the DMA ring and implements the
//! activation flows of the supported card families: standard 14443-3 Type B
//! (REQB/ATTRIB), ST SR-X, Xerox slotted anticollision, ASK CTS and
//! HID Picopass.
//!
//! All session state that the original firmware kept in module-level
//! singletons (PCB block number, FWI and derived timeout, field flag) lives
//! in [`Session`], owned by [`Reader`] and threaded through every entry
//! point. A mode change is a hard boundary: dropping the reader and building
//! a simulator or sniffer starts from scratch.

use log::debug;

use crate::afe::{Afe, AfeMode};
use crate::card::{parse_atqb, CardDescriptor};
use crate::constants::{
    CTS_GET_UID, CTS_REQT, DEFAULT_FRAME_SIZE, DELAY_ISO14443B_PCD_TO_PICC_READER,
    DELAY_TAG_TO_ARM, DMA_BUFFER_SIZE, FWI_DEFAULT, FWT_TIMEOUT_14B, ISO14443B_ATTRIB,
    ISO14B_TR0, ISO14B_TR2, MAX_14B_TIMEOUT, MAX_FRAME_SIZE, PICOPASS_ACTALL,
    PICOPASS_BLOCK_AIA, PICOPASS_BLOCK_CONF, PICOPASS_BLOCK_EPURSE, PICOPASS_IDENTIFY,
    PICOPASS_READ, PICOPASS_SELECT, SRX_GET_UID, SRX_INITIATE, SRX_SELECT, XRX_SLOT_COUNT,
    XRX_SLOT_MARKER, XRX_WAKEUP,
};
use crate::crc::{
    crc_b_append, crc_b_verify, crc_picopass_append, crc_picopass_verify,
};
use crate::error::Iso14bError;
use crate::phy::{encode, Demod, DmaRing, ToSend};
use crate::timing::{etu_to_ticks, fwi_to_timeout_ticks, tick_before, ticks_elapsed};
use crate::trace::{Direction, TraceLog};

/// Which checksum family terminates frames on the air right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcFamily {
    Iso14443b,
    Picopass,
}

/// Static configuration of a reader instance
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// FWI assumed until an ATQB announces one
    pub fwi_default: u8,
    /// Maximum frame size assumed until an ATQB announces one
    pub max_frame_size: usize,
    /// Receive DMA ring length in words (power of two)
    pub dma_ring_len: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            fwi_default: FWI_DEFAULT,
            max_frame_size: DEFAULT_FRAME_SIZE,
            dma_ring_len: DMA_BUFFER_SIZE,
        }
    }
}

/// Per-activation session state
#[derive(Debug, Clone)]
pub struct Session {
    /// ISO 14443-4 PCB block number, toggled per exchanged I-block
    pub pcb_blocknum: u8,
    /// Current Frame Waiting time Integer
    pub fwi: u8,
    /// Receive timeout in reader SSP ticks, derived from `fwi` unless the
    /// host overrode it
    pub timeout: u32,
    /// Negotiated maximum frame size in bytes
    pub max_frame_size: usize,
    /// RF field state
    pub field_on: bool,
    /// Checksum family of the selected card
    pub crc_family: CrcFamily,
}

impl Session {
    fn new(config: &ReaderConfig) -> Self {
        Session {
            pcb_blocknum: 0,
            fwi: config.fwi_default,
            timeout: fwi_to_timeout_ticks(config.fwi_default),
            max_frame_size: config.max_frame_size.clamp(1, MAX_FRAME_SIZE),
            field_on: false,
            crc_family: CrcFamily::Iso14443b,
        }
    }

    /// Install a new FWI; the derived timeout changes in the same call.
    pub fn set_fwi(&mut self, fwi: u8) {
        self.fwi = fwi;
        self.timeout = fwi_to_timeout_ticks(fwi);
    }

    /// Override the receive timeout, given in ETUs.
    pub fn set_timeout_etu(&mut self, etu: u32) {
        self.timeout = etu_to_ticks(etu).min(MAX_14B_TIMEOUT);
    }

    /// Install the negotiated maximum frame size, clamped into [1, 256].
    pub fn set_max_frame_size(&mut self, size: usize) {
        self.max_frame_size = size.clamp(1, MAX_FRAME_SIZE);
    }
}

/// The reader-mode protocol engine, generic over the AFE it drives.
pub struct Reader<A: Afe> {
    pub(crate) afe: A,
    pub(crate) session: Session,
    pub(crate) trace: TraceLog,
    tosend: ToSend,
    /// EOF tick of the last frame, on the PICC timeline
    eof_time: u32,
    config: ReaderConfig,
}

impl<A: Afe> Reader<A> {
    pub fn new(afe: A, config: ReaderConfig) -> Self {
        let session = Session::new(&config);
        Reader {
            afe,
            session,
            trace: TraceLog::new(),
            tosend: ToSend::new(),
            eof_time: 0,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    pub fn afe_mut(&mut self) -> &mut A {
        &mut self.afe
    }

    /// Raise the RF field and reset the session.
    pub fn field_on(&mut self) -> Result<(), Iso14bError> {
        self.afe.set_mode(AfeMode::ReaderTxAsk10)?;
        self.session = Session::new(&self.config);
        self.session.field_on = true;
        self.eof_time = self.afe.ssp_tick();
        Ok(())
    }

    /// Drop the RF field; the card loses state.
    pub fn switch_off(&mut self) -> Result<(), Iso14bError> {
        self.afe.dma_stop();
        self.afe.field_off()?;
        self.session.field_on = false;
        Ok(())
    }

    pub fn is_field_on(&self) -> bool {
        self.session.field_on
    }

    fn require_field(&self) -> Result<(), Iso14bError> {
        if self.session.field_on {
            Ok(())
        } else {
            Err(Iso14bError::FieldOff)
        }
    }

    /// Earliest legal transmit slot: past the TR2 frame delay (and the wider
    /// TR0 guard) since the last EOF, aligned down to a 16-tick boundary. A
    /// missed slot moves to the next reachable one.
    fn next_tx_slot(&self) -> u32 {
        let mut start = self.eof_time.wrapping_add(ISO14B_TR2);
        let tr0_slot = self.eof_time.wrapping_add(ISO14B_TR0);
        if tick_before(start, tr0_slot) {
            start = tr0_slot;
        }
        start &= !0xF;
        let now = self.afe.ssp_tick();
        if tick_before(start, now) {
            start = now.wrapping_add(32) & !0xF;
        }
        start
    }

    fn wait_until(&mut self, t: u32) -> Result<(), Iso14bError> {
        while tick_before(self.afe.ssp_tick(), t) {
            self.afe.watchdog_pet();
            if self.afe.button_pressed() {
                return Err(Iso14bError::Cancelled);
            }
        }
        Ok(())
    }

    /// Encode and transmit one frame. Each logical bit becomes two 16-bit
    /// modulation words (bit 1 = carrier, bit 0 = modulated gap).
    pub(crate) fn transmit(&mut self, data: &[u8], framing: bool) -> Result<(), Iso14bError> {
        encode::code_as_reader(&mut self.tosend, data, framing);
        let start = self.next_tx_slot();
        self.wait_until(start)?;
        self.afe.set_mode(AfeMode::ReaderTxAsk10)?;

        let total = self.tosend.total_bits();
        let bulk = total & !7;
        for i in 0..bulk {
            self.clock_bit(self.tosend.bit_at(i));
        }
        // residual sub-byte bits go out the same way
        for i in bulk..total {
            self.clock_bit(self.tosend.bit_at(i));
        }
        while !self.afe.tx_empty() {
            self.afe.watchdog_pet();
        }

        let tx_eof = start.wrapping_add(etu_to_ticks(total as u32));
        self.trace.push(data, start, tx_eof, Direction::Reader);
        // place the EOF on the PICC timeline
        self.eof_time = tx_eof.wrapping_add(DELAY_ISO14443B_PCD_TO_PICC_READER);
        Ok(())
    }

    fn clock_bit(&mut self, bit: bool) {
        let word = if bit { 0x0000 } else { 0xFFFF };
        for _ in 0..2 {
            while !self.afe.tx_ready() {
                self.afe.watchdog_pet();
            }
            self.afe.tx_write(word);
        }
    }

    /// Receive one frame through the DMA ring.
    ///
    /// Returns the raw frame (checksum included); an empty frame is a
    /// SOF-only answer. Times out per the session timeout, but only while the
    /// demodulator has not committed to a response in progress.
    pub(crate) fn receive(&mut self) -> Result<Vec<u8>, Iso14bError> {
        self.afe.set_mode(AfeMode::ReaderRxSubcarrierIq)?;
        let mut demod = Demod::with_max_len(self.session.max_frame_size);
        let mut ring = DmaRing::start(&mut self.afe, self.config.dma_ring_len)?;
        let timeout = self.session.timeout;

        loop {
            self.afe.watchdog_pet();
            match ring.next_sample(&mut self.afe) {
                Some((ci, cq)) => {
                    if ring.at_wrap() && self.afe.button_pressed() {
                        self.afe.dma_stop();
                        return Err(Iso14bError::Cancelled);
                    }
                    if demod.sample(ci, cq) {
                        let eof = self.afe.ssp_tick().wrapping_sub(DELAY_TAG_TO_ARM);
                        self.afe.dma_stop();
                        if demod.overflowed() {
                            return Err(Iso14bError::Overflow {
                                max: self.session.max_frame_size,
                            });
                        }
                        let frame = demod.take_frame();
                        self.eof_time = eof;
                        if !frame.is_empty() {
                            self.trace.push_from_eof(&frame, eof, Direction::Tag);
                        }
                        return Ok(frame);
                    }
                }
                None => {
                    if self.afe.button_pressed() {
                        self.afe.dma_stop();
                        return Err(Iso14bError::Cancelled);
                    }
                    let now = self.afe.ssp_tick();
                    if demod.may_time_out() && ticks_elapsed(now, ring.start_time()) > timeout {
                        self.afe.dma_stop();
                        return Err(Iso14bError::Timeout);
                    }
                }
            }
        }
    }

    /// Transmit `cmd` and receive the answer.
    pub(crate) fn exchange(&mut self, cmd: &[u8], framing: bool) -> Result<Vec<u8>, Iso14bError> {
        self.transmit(cmd, framing)?;
        self.receive()
    }

    /// Host RAW path: optional checksum append per the selected family, then
    /// a tearoff-aware exchange.
    pub fn send_raw(&mut self, data: &[u8], append_crc: bool) -> Result<Vec<u8>, Iso14bError> {
        self.require_field()?;
        let mut frame = data.to_vec();
        if append_crc {
            match self.session.crc_family {
                CrcFamily::Iso14443b => crc_b_append(&mut frame),
                CrcFamily::Picopass => crc_picopass_append(&mut frame),
            }
        }
        self.transmit(&frame, true)?;
        if self.afe.tearoff_pending() {
            return Err(Iso14bError::Tearoff);
        }
        self.receive()
    }

    // ------------------------------------------------------------------
    // Activation flows
    // ------------------------------------------------------------------

    /// Standard 14443-3 Type B activation: wake, parse ATQB, ATTRIB.
    pub fn select_std(&mut self) -> Result<CardDescriptor, Iso14bError> {
        self.require_field()?;
        self.session.crc_family = CrcFamily::Iso14443b;

        let resp = self.exchange(&[0x05, 0x00, 0x00, 0x71, 0xFF], true)?;
        if resp.len() < 14 {
            return Err(Iso14bError::Length {
                expected: ">= 14",
                actual: resp.len(),
            });
        }
        if !crc_b_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let atqb = parse_atqb(&resp[..resp.len() - 2])?;

        let max_frame = atqb.max_frame_size();
        self.session.set_max_frame_size(max_frame as usize);
        let fwi = atqb.fwi();
        if fwi < 15 {
            self.session.set_fwi(fwi);
        }
        debug!(
            "ATQB: pupi {:02x?}, max frame {max_frame}, fwi {fwi}",
            atqb.pupi
        );

        let mut attrib = vec![ISO14443B_ATTRIB];
        attrib.extend_from_slice(&atqb.pupi);
        attrib.extend_from_slice(&[0x00, 0x08, atqb.protocol_type(), 0x00]);
        crc_b_append(&mut attrib);

        let resp = self.exchange(&attrib, true)?;
        if resp.len() != 3 {
            return Err(Iso14bError::Length {
                expected: "3",
                actual: resp.len(),
            });
        }
        if !crc_b_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let cid = resp[0] & 0x0F;
        self.session.pcb_blocknum = 0;

        Ok(CardDescriptor::Std14b {
            uid: atqb.pupi,
            atqb: atqb.descriptor_bytes(),
            cid,
            max_frame,
            fwi,
        })
    }

    /// ST SR-X activation: initiate, chip-ID select with echo check, UID read.
    pub fn select_srx(&mut self) -> Result<CardDescriptor, Iso14bError> {
        self.require_field()?;
        self.session.crc_family = CrcFamily::Iso14443b;

        let resp = self.exchange(&[SRX_INITIATE, 0x00, 0x97, 0x5B], true)?;
        if resp.len() != 3 {
            return Err(Iso14bError::Length {
                expected: "3",
                actual: resp.len(),
            });
        }
        // checksum first, chip-ID only from a proven frame
        if !crc_b_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let chipid = resp[0];

        let mut select = vec![SRX_SELECT, chipid];
        crc_b_append(&mut select);
        let resp = self.exchange(&select, true)?;
        if resp.len() != 3 {
            return Err(Iso14bError::Length {
                expected: "3",
                actual: resp.len(),
            });
        }
        if !crc_b_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        if resp[0] != chipid {
            return Err(Iso14bError::WrongAnswer(format!(
                "chip-ID echo {:02x}, expected {chipid:02x}",
                resp[0]
            )));
        }

        let resp = self.exchange(&[SRX_GET_UID, 0xAB, 0x4E], true)?;
        if resp.len() != 10 {
            return Err(Iso14bError::Length {
                expected: "10",
                actual: resp.len(),
            });
        }
        if !crc_b_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let uid: [u8; 8] = resp[..8].try_into().unwrap();

        Ok(CardDescriptor::SrX { chipid, uid })
    }

    /// Xerox consumable activation: framed wake, then unframed slot markers
    /// until one slot answers with a UID.
    pub fn select_xerox(&mut self) -> Result<CardDescriptor, Iso14bError> {
        self.require_field()?;
        self.session.crc_family = CrcFamily::Iso14443b;

        let mut wake = vec![XRX_WAKEUP, 0x00, 0x00];
        crc_b_append(&mut wake);
        let resp = self.exchange(&wake, true)?;
        if resp.len() < 14 {
            return Err(Iso14bError::Length {
                expected: ">= 14",
                actual: resp.len(),
            });
        }
        if !crc_b_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let atqb = parse_atqb(&resp[..resp.len() - 2])?;

        // slot markers go out unframed; a silent slot times out quickly
        let saved_timeout = self.session.timeout;
        self.session.timeout = FWT_TIMEOUT_14B;
        let mut uid = None;
        for slot in 0..XRX_SLOT_COUNT {
            match self.exchange(&[XRX_SLOT_MARKER + slot], false) {
                Ok(resp) if resp.len() == 10 && crc_b_verify(&resp) => {
                    uid = Some(<[u8; 8]>::try_from(&resp[..8]).unwrap());
                    break;
                }
                Ok(_) | Err(Iso14bError::Timeout) => continue,
                Err(e) => {
                    self.session.timeout = saved_timeout;
                    return Err(e);
                }
            }
        }
        self.session.timeout = saved_timeout;

        match uid {
            Some(uid) => Ok(CardDescriptor::Xerox {
                uid,
                atqb: atqb.descriptor_bytes(),
            }),
            None => Err(Iso14bError::AntiCollision(
                "xerox slotted loop exhausted".into(),
            )),
        }
    }

    /// ASK CTS activation. CTS answers may stop dead without an EOF; the
    /// demodulator accepts those as partial frames.
    pub fn select_cts(&mut self) -> Result<CardDescriptor, Iso14bError> {
        self.require_field()?;
        self.session.crc_family = CrcFamily::Iso14443b;

        let mut req = vec![CTS_REQT, 0x00];
        crc_b_append(&mut req);
        let resp = self.exchange(&req, true)?;
        if resp.len() != 4 {
            return Err(Iso14bError::Length {
                expected: "4",
                actual: resp.len(),
            });
        }
        if !crc_b_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let (pc, fc) = (resp[0], resp[1]);

        let mut get = vec![CTS_GET_UID];
        crc_b_append(&mut get);
        let resp = self.exchange(&get, true)?;
        if resp.len() != 6 {
            return Err(Iso14bError::Length {
                expected: "6",
                actual: resp.len(),
            });
        }
        if !crc_b_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let uid: [u8; 4] = resp[..4].try_into().unwrap();

        Ok(CardDescriptor::CtsAsk { pc, fc, uid })
    }

    fn picopass_read_block(&mut self, block: u8) -> Result<[u8; 8], Iso14bError> {
        let mut cmd = vec![PICOPASS_READ, block];
        crc_picopass_append(&mut cmd);
        let resp = self.exchange(&cmd, true)?;
        if resp.len() != 10 {
            return Err(Iso14bError::Length {
                expected: "10",
                actual: resp.len(),
            });
        }
        if !crc_picopass_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        Ok(resp[..8].try_into().unwrap())
    }

    /// Picopass/iCLASS selection under the Picopass checksum family.
    pub fn select_picopass(&mut self) -> Result<CardDescriptor, Iso14bError> {
        self.require_field()?;
        self.session.crc_family = CrcFamily::Picopass;

        // ACTALL is acknowledged by a bare SOF
        let resp = self.exchange(&[PICOPASS_ACTALL], true)?;
        if !resp.is_empty() {
            debug!("actall answered {} bytes, expected SOF only", resp.len());
        }

        let mut identify = vec![PICOPASS_IDENTIFY];
        crc_picopass_append(&mut identify);
        let resp = self.exchange(&identify, true)?;
        if resp.len() != 10 {
            return Err(Iso14bError::Length {
                expected: "10",
                actual: resp.len(),
            });
        }
        if !crc_picopass_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let anticoll_csn: [u8; 8] = resp[..8].try_into().unwrap();

        let mut select = vec![PICOPASS_SELECT];
        select.extend_from_slice(&anticoll_csn);
        crc_picopass_append(&mut select);
        let resp = self.exchange(&select, true)?;
        if resp.len() != 10 {
            return Err(Iso14bError::Length {
                expected: "10",
                actual: resp.len(),
            });
        }
        if !crc_picopass_verify(&resp) {
            return Err(Iso14bError::Crc);
        }
        let csn: [u8; 8] = resp[..8].try_into().unwrap();

        let conf = self.picopass_read_block(PICOPASS_BLOCK_CONF)?;
        let epurse = self.picopass_read_block(PICOPASS_BLOCK_EPURSE)?;
        let app_issuer = self.picopass_read_block(PICOPASS_BLOCK_AIA)?;

        Ok(CardDescriptor::Picopass {
            csn,
            conf,
            app_issuer,
            epurse,
        })
    }
}
