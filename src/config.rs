//! Station configuration.
//!
//! # Example
//!
//! ```rust
//! use xpressnet::{config::Config, protocol::SpeedSteps};
//!
//! // esp boards run the bus through a software serial, needing a longer window
//! let config = Config::soft_serial()
//!     .with_speed_steps(SpeedSteps::Steps128)
//!     .with_auto_mode(false);
//! assert_eq!(config.window, 3000);
//! ```

use crate::{
    protocol::{SpeedSteps, WINDOW_UART, WINDOW_SOFT_SERIAL, SLAVE_CYCLES},
    role::Policy,
    };


#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    /// speed steps reported when the host does not give any
    pub speed_steps: SpeedSteps,
    /// take the bus as master when no other master is heard, otherwise stay slave forever
    pub auto_mode: bool,
    /// our bus address when working as slave
    pub address: u8,
    /// microseconds a device has to start answering after its call
    pub window: u32,
    /// silent windows before switching to master
    pub slave_cycles: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed_steps: SpeedSteps::default(),
            auto_mode: true,
            address: 31,
            window: WINDOW_UART,
            slave_cycles: SLAVE_CYCLES,
        }
    }
}

impl Config {
    /// hardware uart link
    pub fn uart() -> Self {
        Self::default()
    }
    /// software emulated serial link, with a larger interrupt latency
    pub fn soft_serial() -> Self {
        Self {window: WINDOW_SOFT_SERIAL, .. Self::default()}
    }

    pub fn with_speed_steps(mut self, steps: SpeedSteps) -> Self {
        self.speed_steps = steps;
        self
    }
    pub fn with_auto_mode(mut self, auto: bool) -> Self {
        self.auto_mode = auto;
        self
    }
    /// bus address, truncated to the 5 bits available
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address & 0x1f;
        self
    }
    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }
    pub fn with_slave_cycles(mut self, cycles: u8) -> Self {
        self.slave_cycles = cycles;
        self
    }

    pub(crate) fn policy(&self) -> Policy {
        Policy {auto: self.auto_mode, threshold: self.slave_cycles}
    }
}
