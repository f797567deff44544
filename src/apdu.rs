//! # ISO 14443-4 Block Exchange
//!
//! Layer-4 framing on top of the reader engine: I-blocks with the session
//! block number and optional chaining bit, R(ACK) construction, and the
//! S(WTX) waiting-time-extension dance. A card may answer any I-block with
//! S(WTX) requests; each one is echoed back while the frame waiting time is
//! temporarily multiplied by the requested WTXM, then restored.
//!
//! Block-number bookkeeping follows 14443-4 §7.5.4: the PCD toggles its block
//! number when the received I-block or R(ACK) carries the number it used.

use log::debug;

use crate::afe::Afe;
use crate::constants::MAX_14B_TIMEOUT;
use crate::crc::{crc_b_append, crc_b_verify};
use crate::error::Iso14bError;
use crate::reader::Reader;

/// I-block PCB base
const PCB_I_BLOCK: u8 = 0x02;

/// Chaining bit within an I-block PCB
const PCB_CHAINING: u8 = 0x10;

/// R(ACK) PCB base
const PCB_R_ACK: u8 = 0xA2;

/// Stripped layer-4 answer to an APDU exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// The leading PCB byte of the card's answer
    pub response_byte: u8,
    /// Payload with PCB and checksum removed
    pub data: Vec<u8>,
}

/// True for an S(WTX) request/response PCB
pub fn is_s_wtx(pcb: u8) -> bool {
    pcb & 0xF2 == 0xF2
}

/// PCB of the R(ACK) the PCD would send at the current block number
pub fn r_ack_pcb(blocknum: u8) -> u8 {
    PCB_R_ACK | blocknum
}

impl<A: Afe> Reader<A> {
    /// Exchange one APDU as an I-block and return the stripped answer.
    pub fn apdu(&mut self, payload: &[u8], chaining: bool) -> Result<ApduResponse, Iso14bError> {
        if !self.is_field_on() {
            return Err(Iso14bError::FieldOff);
        }

        let chain_bit = if chaining { PCB_CHAINING } else { 0 };
        let pcb = PCB_I_BLOCK | chain_bit | self.session.pcb_blocknum;
        let mut frame = vec![pcb];
        frame.extend_from_slice(payload);
        crc_b_append(&mut frame);

        self.transmit(&frame, true)?;
        if self.afe_mut().tearoff_pending() {
            return Err(Iso14bError::Tearoff);
        }
        let mut resp = self.receive()?;

        // keep answering waiting-time extensions until real data arrives
        while resp.len() >= 2 && is_s_wtx(resp[0]) {
            let wtxm = resp[1] & 0x3F;
            debug!("S(WTX) requested, wtxm {wtxm}");
            let saved_timeout = self.session.timeout;
            self.session.timeout = saved_timeout
                .saturating_mul(wtxm.max(1) as u32)
                .min(MAX_14B_TIMEOUT);

            let mut echo = vec![resp[0], wtxm];
            crc_b_append(&mut echo);
            self.transmit(&echo, true)?;
            let replied = self.receive();
            self.session.timeout = saved_timeout;
            resp = replied?;
        }

        if resp.is_empty() {
            return Err(Iso14bError::CardExchange("empty layer-4 answer".into()));
        }

        let resp_pcb = resp[0];
        let is_i_block = resp_pcb & 0xC0 == 0;
        let is_r_ack = resp_pcb & 0xD0 == 0x80;
        if (is_i_block || is_r_ack) && resp_pcb & 0x01 == self.session.pcb_blocknum {
            self.session.pcb_blocknum ^= 1;
        }

        let data = if resp.len() >= 3 {
            if !crc_b_verify(&resp) {
                return Err(Iso14bError::Crc);
            }
            resp[1..resp.len() - 2].to_vec()
        } else {
            resp[1..].to_vec()
        };

        Ok(ApduResponse {
            response_byte: resp_pcb,
            data,
        })
    }
}
