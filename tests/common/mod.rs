#![allow(dead_code)]

use std::time::Duration;

use buspirate_eeprom::sim::SimulatedBusPirate;
use buspirate_eeprom::{BusPirate, Config, Eeprom, EepromConfig};

pub fn config() -> Config {
    Config::builder()
        .read_retries(3)
        .retry_delay(Duration::ZERO)
        .build()
}

/// Default EEPROM settings without the write-cycle pause.
pub fn eeprom_config() -> EepromConfig {
    EepromConfig::builder().write_cycle(Duration::ZERO).build()
}

pub fn bus(sim: SimulatedBusPirate) -> BusPirate<SimulatedBusPirate> {
    BusPirate::new(sim, &config())
}

pub fn eeprom(sim: SimulatedBusPirate) -> Eeprom<SimulatedBusPirate> {
    Eeprom::new(bus(sim), eeprom_config())
}

pub fn sim(eeprom: &Eeprom<SimulatedBusPirate>) -> &SimulatedBusPirate {
    eeprom.bus().port()
}

/// `len` bytes of printable data with no newline in it.
pub fn text(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}
