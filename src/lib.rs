//! # iso14b-rs - A Rust Crate for ISO/IEC 14443 Type B Communication
//!
//! The iso14b-rs crate implements the firmware core of an RFID research
//! device speaking ISO/IEC 14443 Type B: a software (de)modulator over a
//! stream of I/Q correlation samples, the framing state machines of both
//! transfer directions, a frame-accurate timing scheduler and the
//! ISO 14443-4 layer-4 engine.
//!
//! ## Features
//!
//! - Reader mode: field control, REQB/ATTRIB activation, SR-X, Xerox,
//!   ASK CTS and Picopass selection flows, raw frame and APDU exchange with
//!   S(WTX) handling
//! - Tag-simulation mode: software UART over the reader's ASK modulation and
//!   a pre-encoded BPSK responder behind the IDLE/READY/ACTIVE/HALT card
//!   state machine
//! - Sniff mode: concurrent demodulation of both directions from one I/Q
//!   stream into a tick-stamped trace
//! - CRC-B and Picopass frame checksums
//! - Hardware access through a narrow AFE trait, with a scripted mock for
//!   hardware-free testing
//!
//! ## Usage
//!
//! ```rust
//! use iso14b_rs::{
//!     dispatch::{run_command, Iso14bFlags, RawCommand},
//!     MockAfe, Reader, ReaderConfig,
//! };
//!
//! let mut reader = Reader::new(MockAfe::new(), ReaderConfig::default());
//! let cmd = RawCommand {
//!     flags: Iso14bFlags::CONNECT | Iso14bFlags::DISCONNECT,
//!     timeout_etu: 0,
//!     raw: vec![],
//! };
//! run_command(&mut reader, &cmd).unwrap();
//! ```

pub mod afe;
pub mod apdu;
pub mod card;
pub mod constants;
pub mod crc;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod phy;
pub mod reader;
pub mod simulator;
pub mod sniffer;
pub mod timing;
pub mod trace;
pub mod util;

pub use crate::error::Iso14bError;
pub use crate::logging::{init_logger, log_info};

// Core protocol types
pub use afe::{Afe, AfeMode, MockAfe};
pub use apdu::ApduResponse;
pub use card::CardDescriptor;
pub use dispatch::{run_command, CommandResponse, Iso14bFlags, RawCommand};
pub use reader::{Reader, ReaderConfig, Session};
pub use simulator::{Simulator, SimulatorConfig, TagState};
pub use sniffer::Sniffer;
pub use trace::{Direction, TraceEntry, TraceLog};
