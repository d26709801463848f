use std::time::Duration;

use crate::bbio::Peripherals;

/// Serial line and timing settings for talking to the Bus Pirate.
#[derive(Debug, Clone, bon::Builder)]
pub struct Config {
    #[builder(default = 115_200)]
    pub baud_rate: u32,
    /// How long one read may block before it counts as a stall.
    #[builder(default = Duration::from_millis(100))]
    pub timeout: Duration,
    /// Stalls tolerated while waiting for an echo before giving up.
    #[builder(default = 5)]
    pub read_retries: u32,
    /// Pause after each stall.
    #[builder(default = Duration::from_millis(10))]
    pub retry_delay: Duration,
    /// Power and pull-up state applied on every I2C mode entry.
    #[builder(default)]
    pub peripherals: Peripherals,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}
