//! A 24xx I2C EEPROM (24LC08B block 0 by default) behind a Bus Pirate.
//!
//! Two engines share one address cursor:
//!
//! - the single-byte engine spends one full session (handshake, one I2C
//!   transaction, reset) per byte, checking every echo as it goes;
//! - the batched engine ([`Eeprom::write`]) sends one fused frame per batch of
//!   up to half a page.
//!
//! A terminator byte (newline by default) marks the end of data in both
//! directions. It is never written by the engines and ends a read when the
//! device produces it.
mod batch;
mod cursor;

use std::io::{Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::SerialPort;

use crate::bbio::{self, DataPhase};
use crate::buspirate::BusPirate;
use crate::error::Result;

pub use batch::{fused_frame, Batch, BatchPolicy, Batches, MAX_BATCH};
pub use cursor::AddressCursor;

pub const NEWLINE: u8 = 10;

/// End-of-data marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Byte(u8),
    Disabled,
}

impl Terminator {
    pub fn byte(self) -> Option<u8> {
        match self {
            Terminator::Byte(byte) => Some(byte),
            Terminator::Disabled => None,
        }
    }

    fn matches(self, byte: u8) -> bool {
        self.byte() == Some(byte)
    }
}

impl Default for Terminator {
    fn default() -> Self {
        Terminator::Byte(NEWLINE)
    }
}

#[derive(Debug, Clone, bon::Builder)]
pub struct EepromConfig {
    /// 7-bit I2C address; 0x50 puts 0xA0/0xA1 on the wire.
    #[builder(default = 0x50)]
    pub address: u8,
    #[builder(default = 16)]
    pub page_size: usize,
    /// Addressable bytes; one 256-byte block.
    #[builder(default = 256)]
    pub capacity: usize,
    #[builder(default)]
    pub terminator: Terminator,
    #[builder(default)]
    pub batching: BatchPolicy,
    /// Pause after each write round for the internal write cycle.
    #[builder(default = Duration::from_millis(5))]
    pub write_cycle: Duration,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Why a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// A terminator byte was reached.
    Terminator,
    /// The input, the requested length or the block ran out.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes read, without the terminator.
    pub data: Vec<u8>,
    pub ending: Ending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub written: usize,
    /// Round trips spent: one per byte or one per batch.
    pub rounds: usize,
    pub ending: Ending,
}

pub struct Eeprom<P = Box<dyn SerialPort>> {
    bus: BusPirate<P>,
    config: EepromConfig,
    cursor: AddressCursor,
}

impl<P: Read + Write> Eeprom<P> {
    pub fn new(bus: BusPirate<P>, config: EepromConfig) -> Self {
        let cursor = AddressCursor::new(config.capacity);
        Self {
            bus,
            config,
            cursor,
        }
    }

    pub fn config(&self) -> &EepromConfig {
        &self.config
    }

    pub fn cursor(&self) -> AddressCursor {
        self.cursor
    }

    pub fn seek(&mut self, address: usize) -> Result<()> {
        self.cursor.seek(address)
    }

    pub fn bus(&self) -> &BusPirate<P> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut BusPirate<P> {
        &mut self.bus
    }

    pub fn into_inner(self) -> BusPirate<P> {
        self.bus
    }

    /// Read the byte at the cursor in one session and advance past it.
    ///
    /// The terminator byte is returned like any other.
    pub fn read_byte(&mut self) -> Result<u8> {
        let address = self.cursor.address_for(1)?;
        let device = self.config.address;
        let terminator = self.config.terminator;
        let value = self.bus.session(|bus| {
            // Set the word address, then repeated start to read from it.
            bus.i2c_start()?;
            bus.i2c_bulk_write(&[
                (DataPhase::DeviceAddress, bbio::write_address(device)),
                (DataPhase::WordAddress, address),
            ])?;
            bus.i2c_start()?;
            bus.i2c_bulk_write(&[(DataPhase::DeviceAddress, bbio::read_address(device))])?;
            let value = bus.i2c_read_byte()?;
            // The end marker goes straight to stop.
            if !terminator.matches(value) {
                bus.i2c_nack()?;
            }
            bus.i2c_stop()?;
            Ok(value)
        })?;
        self.cursor.advance(1)?;
        debug!("Read 0x{value:02X} from 0x{address:02X}");
        Ok(value)
    }

    /// Read from the cursor until the terminator, `limit` bytes, or the end
    /// of the block, whichever comes first.
    pub fn read(&mut self, limit: usize) -> Result<ReadOutcome> {
        let limit = limit.min(self.cursor.remaining());
        let mut data = Vec::with_capacity(limit);
        while data.len() < limit {
            let value = self.read_byte()?;
            if self.config.terminator.matches(value) {
                info!("Read {} bytes, stopped at terminator", data.len());
                return Ok(ReadOutcome {
                    data,
                    ending: Ending::Terminator,
                });
            }
            data.push(value);
        }
        info!("Read {} bytes", data.len());
        Ok(ReadOutcome {
            data,
            ending: Ending::Exhausted,
        })
    }

    /// Write one byte at the cursor in one session and advance past it.
    ///
    /// No terminator check: this is how an end marker gets stored.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        let address = self.cursor.address_for(1)?;
        let device = self.config.address;
        self.bus.session(|bus| {
            bus.i2c_start()?;
            bus.i2c_bulk_write(&[
                (DataPhase::DeviceAddress, bbio::write_address(device)),
                (DataPhase::WordAddress, address),
                (DataPhase::Data(0), byte),
            ])?;
            bus.i2c_stop()
        })?;
        self.cursor.advance(1)?;
        std::thread::sleep(self.config.write_cycle);
        debug!("Wrote 0x{byte:02X} to 0x{address:02X}");
        Ok(())
    }

    /// Write `data` one byte per session, stopping before a terminator.
    ///
    /// Nothing is sent if the data would run past the end of the block.
    pub fn write_bytewise(&mut self, data: &[u8]) -> Result<WriteOutcome> {
        let planned = data
            .iter()
            .position(|&byte| self.config.terminator.matches(byte))
            .unwrap_or(data.len());
        self.check_room(planned)?;
        let mut written = 0;
        for &byte in data {
            if self.config.terminator.matches(byte) {
                info!("Wrote {written} bytes bytewise, stopped at terminator");
                return Ok(WriteOutcome {
                    written,
                    rounds: written,
                    ending: Ending::Terminator,
                });
            }
            self.write_byte(byte)?;
            written += 1;
        }
        info!("Wrote {written} bytes bytewise");
        Ok(WriteOutcome {
            written,
            rounds: written,
            ending: Ending::Exhausted,
        })
    }

    /// Write `data` in page-safe batches, one fused round trip per batch,
    /// stopping before a terminator.
    ///
    /// Nothing is sent if the data would run past the end of the block.
    pub fn write(&mut self, data: &[u8]) -> Result<WriteOutcome> {
        let mut batches = Batches::new(
            data,
            self.cursor.position(),
            self.config.page_size,
            self.config.batching,
            self.config.terminator.byte(),
        );
        self.check_room(batches.clone().map(|batch| batch.data.len()).sum())?;
        let mut written = 0;
        let mut rounds = 0;
        for batch in batches.by_ref() {
            let address = self.cursor.address_for(batch.data.len())?;
            let frame = fused_frame(
                self.config.address,
                address,
                batch.data,
                self.bus.peripherals(),
            )?;
            self.bus.transact_round(&frame)?;
            self.cursor.advance(batch.data.len())?;
            std::thread::sleep(self.config.write_cycle);
            written += batch.data.len();
            rounds += 1;
            debug!(
                "Batch {rounds}: {} bytes at 0x{address:02X}",
                batch.data.len()
            );
        }
        let ending = if batches.terminated() {
            Ending::Terminator
        } else {
            Ending::Exhausted
        };
        info!("Wrote {written} bytes in {rounds} batches");
        Ok(WriteOutcome {
            written,
            rounds,
            ending,
        })
    }

    fn check_room(&self, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        self.cursor.address_for(len).map(drop)
    }

    /// Store the terminator byte at the cursor so a later [`Eeprom::read`]
    /// knows where the data ends. Does nothing without a terminator.
    pub fn mark_end(&mut self) -> Result<()> {
        match self.config.terminator.byte() {
            Some(byte) => self.write_byte(byte),
            None => Ok(()),
        }
    }
}
