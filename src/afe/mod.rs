//! # Analog Front-End Abstraction
//!
//! This module defines the [`Afe`] trait, the hardware seam between the
//! protocol core and the radio analog front-end with its programmable
//! baseband. The baseband delivers a stream of I/Q correlation samples into a
//! DMA ring for reception and accepts modulation words through a TX FIFO for
//! transmission; a free-running 32-bit SSP tick counter is the single time
//! base. Everything above this trait is hardware-agnostic, which is what lets
//! the whole protocol stack run against [`mock::MockAfe`] in tests.

use thiserror::Error;

pub mod mock;

pub use mock::MockAfe;

/// Errors reported by the front-end
#[derive(Debug, Error)]
pub enum AfeError {
    #[error("baseband rejected mode change")]
    Mode,

    #[error("DMA engine unavailable")]
    Dma,

    #[error("ADC sampling failed")]
    Adc,
}

/// Baseband operating modes the core switches between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfeMode {
    /// Carrier on, 10 % ASK reader transmit
    ReaderTxAsk10,
    /// 848 kHz subcarrier I/Q correlator receive
    ReaderRxSubcarrierIq,
    /// Tag simulation, antenna load released (no modulation)
    SimNoMod,
    /// Tag simulation, BPSK load modulation
    SimBpsk,
    /// Passive dual-direction I/Q sampling
    SniffIq,
    /// Field off
    Off,
}

/// Contract the protocol core consumes from the radio front-end.
///
/// All calls are non-blocking; the core polls. The DMA ring is shared with
/// hardware: the CPU reads behind the hardware write position and re-arms the
/// descriptor halves once they have drained.
pub trait Afe {
    /// Switch the baseband into `mode`.
    fn set_mode(&mut self, mode: AfeMode) -> Result<(), AfeError>;

    /// Drop the RF field and release the baseband.
    fn field_off(&mut self) -> Result<(), AfeError>;

    /// Free-running 32-bit SSP tick counter.
    fn ssp_tick(&self) -> u32;

    /// TX FIFO can accept another word.
    fn tx_ready(&self) -> bool;

    /// TX FIFO has fully drained onto the air.
    fn tx_empty(&self) -> bool;

    /// Push one modulation word into the TX FIFO.
    fn tx_write(&mut self, word: u16);

    /// RX FIFO holds a word (tag-simulation bit stream).
    fn rx_ready(&self) -> bool;

    /// Pop one word from the RX FIFO.
    fn rx_read(&mut self) -> u16;

    /// Arm the DMA engine over a ring of `len` 16-bit words.
    ///
    /// `len` must be a power of two; both descriptor halves are loaded.
    fn dma_start(&mut self, len: usize) -> Result<(), AfeError>;

    /// Disable the DMA engine.
    fn dma_stop(&mut self);

    /// Total number of words the hardware has written since `dma_start`.
    ///
    /// Monotonic; implementations mask into the ring internally.
    fn dma_written(&self) -> usize;

    /// Read the word at monotonic position `pos` (`pos < dma_written()`).
    fn dma_word(&self, pos: usize) -> u16;

    /// Reload the primary (`first`) or secondary descriptor half.
    fn dma_rearm(&mut self, first: bool);

    /// Sample the HF field voltage in millivolts.
    fn hf_voltage_mv(&mut self) -> u32;

    /// Operator abort button state.
    fn button_pressed(&mut self) -> bool;

    /// Injected tearoff signal (fires once, after a transmit).
    fn tearoff_pending(&mut self) -> bool {
        false
    }

    /// Pet the hardware watchdog; called inside every polling loop.
    fn watchdog_pet(&mut self) {}

    /// Raise or drop the external trigger line (scope sync).
    fn set_trigger(&mut self, _on: bool) {}
}
