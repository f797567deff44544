//! ISO 14443 Type B Protocol Constants
//!
//! This module defines constants used in the ISO/IEC 14443-2/-3/-4 Type B
//! implementation: SSP clock domains, guard times, frame delimiters and the
//! command bytes of the supported card families.

use crate::timing::TICKS_PER_ETU_READER;

/// SSP clock frequency while acting as reader (13.56 MHz / 4)
pub const SSP_CLK_READER_HZ: u32 = 3_390_000;

/// SSP clock frequency while simulating a tag (13.56 MHz / 32)
pub const SSP_CLK_TAG_HZ: u32 = 423_750;

/// Largest Frame Waiting Time the session will accept, in reader SSP ticks.
///
/// FWT(max) = FWT(14) ≈ 4949 ms; 4 949 000 µs × 3.39 ticks/µs.
pub const MAX_14B_TIMEOUT: u32 = 16_777_120;

/// Activation frame waiting time in reader SSP ticks (≈ 4.833 ms).
pub const FWT_TIMEOUT_14B: u32 = 16_384;

/// Default Frame Waiting time Integer until ATQB says otherwise
pub const FWI_DEFAULT: u8 = 9;

/// Maximum layer-2 frame size in bytes (ISO 14443-3 code 8)
pub const MAX_FRAME_SIZE: usize = 256;

/// Default maximum frame size before ATQB negotiation
pub const DEFAULT_FRAME_SIZE: usize = 32;

/// Number of 16-bit I/Q words in the receive DMA ring. Must be a power of two.
pub const DMA_BUFFER_SIZE: usize = 4096;

// Latencies of the sample path, in SSP ticks of the respective clock domain.
pub const DELAY_READER_TO_ARM: u32 = 8;
pub const DELAY_ARM_TO_READER: u32 = 0;
pub const DELAY_ARM_TO_TAG: u32 = 16;
pub const DELAY_TAG_TO_ARM: u32 = 32;
pub const DELAY_TAG_TO_ARM_SNIFF: u32 = 32;
pub const DELAY_READER_TO_ARM_SNIFF: u32 = 32;

/// TR0 guard time: earliest PCD transmit slot, 16 ETU in reader ticks.
pub const ISO14B_TR0: u32 = 16 * TICKS_PER_ETU_READER;

/// TR2 frame delay, PICC EOF to next PCD SOF, 14 ETU (14443-3 Amendment 1).
pub const ISO14B_TR2: u32 = 14 * TICKS_PER_ETU_READER;

/// Correction placing a recorded PCD EOF on the PICC timeline, 15 ETU.
///
/// Distinct from [`ISO14B_TR2`]; the two are never interchangeable.
pub const DELAY_ISO14443B_PCD_TO_PICC_READER: u32 = 15 * TICKS_PER_ETU_READER;

/// TR0 guard observed by the tag simulator before load-modulating, in µs.
pub const TAG_SIM_TR0_GUARD_US: u32 = 76;

/// Subcarrier presence threshold for the I/Q demodulator
pub const SUBCARRIER_DETECT_THRESHOLD: i32 = 8;

/// Minimum HF field voltage (mV) for the simulator to consider itself powered
pub const MF_MINFIELDV: u32 = 1500;

// ----------------------------------------------------------------------------
// Command bytes (14443-3 and the supported proprietary families)
// ----------------------------------------------------------------------------

/// REQB/WUPB command byte; bit 3 of the PARAM byte selects WUPB
pub const ISO14443B_REQB: u8 = 0x05;

/// PARAM bit distinguishing WUPB from REQB
pub const ISO14443B_WUPB_PARAM: u8 = 0x08;

/// ATQB answer byte from the PICC
pub const ISO14443B_ATQB: u8 = 0x50;

/// ATTRIB (attribute select)
pub const ISO14443B_ATTRIB: u8 = 0x1D;

/// HLTB (halt)
pub const ISO14443B_HALT: u8 = 0x50;

/// SR-X initiate (followed by a 0x00 parameter byte)
pub const SRX_INITIATE: u8 = 0x06;

/// SR-X chip-ID select
pub const SRX_SELECT: u8 = 0x0E;

/// SR-X UID read
pub const SRX_GET_UID: u8 = 0x0B;

/// Xerox slotted-anticollision wakeup
pub const XRX_WAKEUP: u8 = 0x0D;

/// Xerox slot-marker base; the slot number is added to this byte
pub const XRX_SLOT_MARKER: u8 = 0xB1;

/// Number of anticollision slots walked before giving up on a Xerox tag
pub const XRX_SLOT_COUNT: u8 = 8;

/// ASK CTS request
pub const CTS_REQT: u8 = 0x10;

/// ASK CTS UID read
pub const CTS_GET_UID: u8 = 0xB0;

/// Picopass activate-all (answered by a SOF-only frame)
pub const PICOPASS_ACTALL: u8 = 0x0A;

/// Picopass anticollision identify
pub const PICOPASS_IDENTIFY: u8 = 0x0C;

/// Picopass select
pub const PICOPASS_SELECT: u8 = 0x81;

/// Picopass block read
pub const PICOPASS_READ: u8 = 0x0C;

/// Picopass block holding the configuration bytes
pub const PICOPASS_BLOCK_CONF: u8 = 0x01;

/// Picopass block holding the e-purse
pub const PICOPASS_BLOCK_EPURSE: u8 = 0x02;

/// Picopass block holding the application issuer area
pub const PICOPASS_BLOCK_AIA: u8 = 0x05;
