//! # ISO 14443 Type B Error Handling
//!
//! This module defines the Iso14bError enum, which represents the different
//! error types that can occur in the iso14b-rs crate. The layer-2/3/4 engines
//! short-circuit on the first error; the dispatcher surfaces it to the host
//! verbatim. The simulator and sniffer log and continue instead of raising.

use crate::afe::AfeError;
use thiserror::Error;

/// Represents the different error types that can occur in the Type B core.
#[derive(Debug, Error)]
pub enum Iso14bError {
    /// No response from the card within the frame waiting time.
    #[error("No response within the frame waiting time")]
    Timeout,

    /// General card exchange failure.
    #[error("Card exchange failed: {0}")]
    CardExchange(String),

    /// The card answered, but not with what the flow requires.
    #[error("Unexpected answer from card: {0}")]
    WrongAnswer(String),

    /// Response length outside the allowed set for this command.
    #[error("Response length {actual} outside allowed set ({expected})")]
    Length {
        expected: &'static str,
        actual: usize,
    },

    /// CRC check on a received frame failed.
    #[error("CRC check failed")]
    Crc,

    /// Demodulated more bytes than the receive buffer holds.
    #[error("Demodulated frame longer than {max} bytes")]
    Overflow { max: usize },

    /// DMA ring setup failed.
    #[error("DMA setup failed")]
    DmaSetup,

    /// An operation that needs the RF field found it switched off.
    #[error("RF field is off")]
    FieldOff,

    /// The injected tearoff signal fired after transmit.
    #[error("Tearoff triggered before the response")]
    Tearoff,

    /// Anti-collision gave up without isolating a tag.
    #[error("Anti-collision failed: {0}")]
    AntiCollision(String),

    /// The operator button ended the current mode.
    #[error("Operation cancelled by operator")]
    Cancelled,

    /// Fault reported by the analog front-end.
    #[error(transparent)]
    Afe(#[from] AfeError),
}
