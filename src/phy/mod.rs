//! Software modem for the 14443 Type B air interface
//!
//! Everything between raw AFE samples and framed bytes lives here: the
//! bit-pattern scratch buffer, the two direction-specific encoders, the two
//! direction-specific decoder state machines, and the DMA ring view that
//! feeds them.

pub mod demod;
pub mod dma;
pub mod encode;
pub mod tosend;
pub mod uart;

pub use demod::{Demod, DemodState};
pub use dma::DmaRing;
pub use tosend::ToSend;
pub use uart::{Uart, UartState};
