//! # Card Descriptors and Activation-Response Parsing
//!
//! This module defines the descriptor emitted for each supported card family
//! after a successful selection, and the parsers for the activation responses
//! the layer-2/3 engine receives. It leverages the `nom` crate for parsing
//! the binary ATQB, mirroring how the rest of the workspace parses wire
//! frames.

use crate::error::Iso14bError;
use nom::bytes::complete::{tag, take};
use nom::IResult;
use serde::{Deserialize, Serialize};

/// Descriptor returned to the host after a successful selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardDescriptor {
    /// Standard ISO 14443-3 Type B card
    Std14b {
        uid: [u8; 4],
        atqb: [u8; 7],
        cid: u8,
        max_frame: u16,
        fwi: u8,
    },
    /// ST SR-X (SRI/SRT family)
    SrX { chipid: u8, uid: [u8; 8] },
    /// Xerox printer consumable tag
    Xerox { uid: [u8; 8], atqb: [u8; 7] },
    /// ASK CTS ticket
    CtsAsk { pc: u8, fc: u8, uid: [u8; 4] },
    /// HID iCLASS / Picopass credential
    Picopass {
        csn: [u8; 8],
        conf: [u8; 8],
        app_issuer: [u8; 8],
        epurse: [u8; 8],
    },
}

/// Fields of a parsed ATQB (CRC already stripped by the caller)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atqb {
    pub pupi: [u8; 4],
    pub app_data: [u8; 4],
    pub protocol_info: [u8; 3],
}

impl Atqb {
    /// The seven bytes the host sees as "the ATQB": application data plus
    /// protocol info.
    pub fn descriptor_bytes(&self) -> [u8; 7] {
        let mut out = [0u8; 7];
        out[..4].copy_from_slice(&self.app_data);
        out[4..].copy_from_slice(&self.protocol_info);
        out
    }

    /// Maximum frame size announced by the card, in bytes
    pub fn max_frame_size(&self) -> u16 {
        max_frame_from_code(self.protocol_info[1] >> 4)
    }

    /// Protocol type nibble (bit 0 set means ISO 14443-4 support)
    pub fn protocol_type(&self) -> u8 {
        self.protocol_info[1] & 0x0F
    }

    /// Frame Waiting time Integer announced by the card
    pub fn fwi(&self) -> u8 {
        self.protocol_info[2] >> 4
    }
}

fn atqb_fields(input: &[u8]) -> IResult<&[u8], Atqb> {
    let (input, _) = tag(&[0x50][..])(input)?;
    let (input, pupi) = take(4usize)(input)?;
    let (input, app_data) = take(4usize)(input)?;
    let (input, protocol_info) = take(3usize)(input)?;
    Ok((
        input,
        Atqb {
            pupi: pupi.try_into().unwrap(),
            app_data: app_data.try_into().unwrap(),
            protocol_info: protocol_info.try_into().unwrap(),
        },
    ))
}

/// Parse an ATQB (without CRC). Trailing extended-ATQB bytes are accepted and
/// ignored.
pub fn parse_atqb(input: &[u8]) -> Result<Atqb, Iso14bError> {
    match atqb_fields(input) {
        Ok((_, atqb)) => Ok(atqb),
        Err(_) => Err(Iso14bError::WrongAnswer(format!(
            "malformed ATQB ({} bytes)",
            input.len()
        ))),
    }
}

/// ISO 14443-3 maximum frame size coding
pub fn max_frame_from_code(code: u8) -> u16 {
    match code {
        0..=4 => 8 * code as u16 + 16,
        5 => 64,
        6 => 96,
        7 => 128,
        8 => 256,
        _ => 257,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATQB: [u8; 12] = [
        0x50, 0x82, 0x0D, 0xE1, 0x74, 0x20, 0x38, 0x19, 0x22, 0x00, 0x21, 0x85,
    ];

    #[test]
    fn parses_atqb_fields() {
        let atqb = parse_atqb(&ATQB).unwrap();
        assert_eq!(atqb.pupi, [0x82, 0x0D, 0xE1, 0x74]);
        assert_eq!(
            atqb.descriptor_bytes(),
            [0x20, 0x38, 0x19, 0x22, 0x00, 0x21, 0x85]
        );
        assert_eq!(atqb.max_frame_size(), 32);
        assert_eq!(atqb.protocol_type(), 1);
        assert_eq!(atqb.fwi(), 8);
    }

    #[test]
    fn rejects_wrong_answer_byte() {
        let mut bad = ATQB;
        bad[0] = 0x51;
        assert!(parse_atqb(&bad).is_err());
    }

    #[test]
    fn rejects_short_input() {
        assert!(parse_atqb(&ATQB[..9]).is_err());
    }

    #[test]
    fn frame_size_table() {
        let sizes: Vec<u16> = (0..=9).map(max_frame_from_code).collect();
        assert_eq!(sizes, vec![16, 24, 32, 40, 48, 64, 96, 128, 256, 257]);
    }

    #[test]
    fn descriptor_serializes() {
        let card = CardDescriptor::SrX {
            chipid: 0x33,
            uid: [1, 2, 3, 4, 5, 6, 7, 8],
        };
        let json = serde_json::to_string(&card).unwrap();
        let back: CardDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(card, back);
    }
}
