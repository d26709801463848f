//! Read and write a 24xx I2C EEPROM through a Bus Pirate's binary bitbang
//! mode.
//!
//! [`BusPirate`] owns the serial channel and the device's mode state. Every
//! round of work enters binary mode, then I2C mode, switches on power and
//! pull-ups, does its I2C business and resets the device to its user
//! terminal. [`Eeprom`] builds on it with an address cursor and two engines:
//! a careful one-session-per-byte engine and a batched writer that fuses a
//! whole round into a single write.
//!
//! `BusPirate` also implements [`embedded_hal::i2c::I2c`], so other drivers
//! can use it as a plain I2C bus.
//!
//! ```no_run
//! use buspirate_eeprom::{open, Config, Eeprom, EepromConfig};
//!
//! # fn main() -> buspirate_eeprom::Result<()> {
//! let bus = open("/dev/ttyUSB0", &Config::default())?;
//! let mut eeprom = Eeprom::new(bus, EepromConfig::default());
//! eeprom.write(b"hello")?;
//! eeprom.mark_end()?;
//! eeprom.seek(0)?;
//! let outcome = eeprom.read(256)?;
//! assert_eq!(outcome.data, b"hello");
//! # Ok(())
//! # }
//! ```
pub mod bbio;
mod buspirate;
pub mod config;
pub mod eeprom;
mod eh_i2c;
mod error;
pub mod modes;
pub mod sim;
mod transfer;

pub use bbio::{Command, DataPhase, Echo, Frame, Peripherals};
pub use buspirate::{open, BusPirate};
pub use config::Config;
pub use eeprom::{
    AddressCursor, BatchPolicy, Eeprom, EepromConfig, Ending, ReadOutcome, Terminator,
    WriteOutcome,
};
pub use error::{Error, Result};
pub use modes::{SessionState, Stage};
