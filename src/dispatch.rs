//! # Host Command Dispatcher
//!
//! One host command carries a flag word plus an optional raw payload; the
//! dispatcher sequences the requested steps in a fixed order of honour:
//! trigger-on, connect, set-timeout, clear-trace, select, APDU, raw,
//! trigger-off, disconnect. The first failing step short-circuits the rest,
//! except that the trigger line is always dropped and a requested disconnect
//! is still performed so the field never stays up by accident.

use bitflags::bitflags;
use log::debug;

use crate::afe::Afe;
use crate::apdu::ApduResponse;
use crate::card::CardDescriptor;
use crate::error::Iso14bError;
use crate::reader::Reader;

bitflags! {
    /// Request bits of the host command word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Iso14bFlags: u32 {
        const CONNECT         = 0x0001;
        const DISCONNECT      = 0x0002;
        const APDU            = 0x0004;
        const RAW             = 0x0008;
        const REQUEST_TRIGGER = 0x0010;
        const APPEND_CRC      = 0x0020;
        const SELECT_STD      = 0x0040;
        const SELECT_SR       = 0x0080;
        const SET_TIMEOUT     = 0x0100;
        const SEND_CHAINING   = 0x0200;
        const SELECT_CTS      = 0x0400;
        const CLEARTRACE      = 0x0800;
        const SELECT_XRX      = 0x1000;
        const SELECT_PICOPASS = 0x2000;
    }
}

/// One host command
#[derive(Debug, Clone)]
pub struct RawCommand {
    pub flags: Iso14bFlags,
    /// Receive timeout in ETUs, applied when `SET_TIMEOUT` is set
    pub timeout_etu: u32,
    /// Payload for the APDU and RAW steps
    pub raw: Vec<u8>,
}

/// Payloads the dispatcher emits back to the host, in step order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    Card(CardDescriptor),
    Apdu(ApduResponse),
    Raw(Vec<u8>),
}

/// Run one host command against the reader.
///
/// Returns the payloads produced by the executed steps. On error the
/// trigger is dropped and, when `DISCONNECT` was requested, the field goes
/// down before the error is surfaced.
pub fn run_command<A: Afe>(
    reader: &mut Reader<A>,
    cmd: &RawCommand,
) -> Result<Vec<CommandResponse>, Iso14bError> {
    let flags = cmd.flags;
    debug!("dispatch {flags:?}");

    if flags.contains(Iso14bFlags::REQUEST_TRIGGER) {
        reader.afe_mut().set_trigger(true);
    }

    let result = run_steps(reader, cmd);

    if flags.contains(Iso14bFlags::REQUEST_TRIGGER) {
        reader.afe_mut().set_trigger(false);
    }
    if flags.contains(Iso14bFlags::DISCONNECT) {
        reader.switch_off()?;
    }

    result
}

fn run_steps<A: Afe>(
    reader: &mut Reader<A>,
    cmd: &RawCommand,
) -> Result<Vec<CommandResponse>, Iso14bError> {
    let flags = cmd.flags;
    let mut responses = Vec::new();

    if flags.contains(Iso14bFlags::CONNECT) {
        reader.field_on()?;
    }

    if flags.contains(Iso14bFlags::SET_TIMEOUT) {
        reader.session_mut().set_timeout_etu(cmd.timeout_etu);
    }

    if flags.contains(Iso14bFlags::CLEARTRACE) {
        reader.clear_trace();
    }

    if flags.contains(Iso14bFlags::SELECT_STD) {
        responses.push(CommandResponse::Card(reader.select_std()?));
    }
    if flags.contains(Iso14bFlags::SELECT_SR) {
        responses.push(CommandResponse::Card(reader.select_srx()?));
    }
    if flags.contains(Iso14bFlags::SELECT_XRX) {
        responses.push(CommandResponse::Card(reader.select_xerox()?));
    }
    if flags.contains(Iso14bFlags::SELECT_CTS) {
        responses.push(CommandResponse::Card(reader.select_cts()?));
    }
    if flags.contains(Iso14bFlags::SELECT_PICOPASS) {
        responses.push(CommandResponse::Card(reader.select_picopass()?));
    }

    if flags.contains(Iso14bFlags::APDU) {
        let chaining = flags.contains(Iso14bFlags::SEND_CHAINING);
        responses.push(CommandResponse::Apdu(reader.apdu(&cmd.raw, chaining)?));
    }

    if flags.contains(Iso14bFlags::RAW) {
        let append_crc = flags.contains(Iso14bFlags::APPEND_CRC);
        responses.push(CommandResponse::Raw(
            reader.send_raw(&cmd.raw, append_crc)?,
        ));
    }

    Ok(responses)
}
