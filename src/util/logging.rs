//! # Rate-Limited Logging
//!
//! The demodulator and sniffer paths run once per sample; a broken antenna or
//! a noisy bench can make them emit the same warning thousands of times per
//! second. [`LogThrottle`] caps how many messages pass per time window.
//!
//! ## Usage
//!
//! ```rust
//! use iso14b_rs::util::logging::LogThrottle;
//!
//! let mut throttle = LogThrottle::new(1000, 5); // 5 messages per second
//! if throttle.allow() {
//!     log::warn!("CRC error on sniffed frame");
//! }
//! ```

use std::time::Instant;

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    /// Current message count in window
    count: u32,
    /// Start time of current window
    t0: Instant,
}

impl LogThrottle {
    /// Create a new throttle with a time window and message cap
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            t0: Instant::now(),
        }
    }

    /// Check if logging is allowed (resets the counter after the window
    /// expires). Returns `true` if the message should be logged.
    pub fn allow(&mut self) -> bool {
        let elapsed_ms = self.t0.elapsed().as_millis() as u64;

        if elapsed_ms > self.window_ms {
            self.t0 = Instant::now();
            self.count = 0;
        }

        self.count += 1;
        self.count <= self.cap
    }

    /// Start a new window immediately
    pub fn reset(&mut self) {
        self.t0 = Instant::now();
        self.count = 0;
    }
}
