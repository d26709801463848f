//! An in-process stand-in for a Bus Pirate with a 24xx EEPROM on its I2C bus.
//!
//! Implements the channel side (`Read + Write`) of the binary bitbang
//! protocol: the 20-zero binary mode entry, the I2C command set, and the
//! version banner printed on reset. The EEPROM answers at one 7-bit address,
//! buffers page writes until the stop condition (rolling over within the
//! page like the real part) and reads sequentially.
//!
//! Faults can be injected to exercise the error paths.
use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::bbio::{
    BINARY_ANNOUNCEMENT, CONTROL_ACK, DATA_ACK, DATA_NACK, ENTER_BINARY_LEN, I2C_ACK,
    I2C_ANNOUNCEMENT, I2C_BULK_WRITE, I2C_NACK, I2C_PERIPHERALS, I2C_READ_BYTE, I2C_START,
    I2C_STOP, RESET,
};

/// Printed after every reset to user mode.
pub const BANNER: &[u8] = b"\r\nBus Pirate v3.5\r\n\
Firmware v6.1 r1676  Bootloader v4.4\r\n\
DEVID:0x0447 REVID:0x3046 (24FJ64GA002 B8)\r\n\
http://dangerousprototypes.com\r\n\
HiZ>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Never answer anything.
    Unresponsive,
    /// Refuse the peripheral configuration (echo 0x00).
    RejectPeripherals,
    /// Announce something other than "I2C1".
    WrongI2cAnnouncement,
    /// Answer a control command other than the mode switches with 0x00.
    RejectControl(u8),
    /// No EEPROM at the configured address.
    NackDeviceAddress,
    /// NACK any data byte written to this memory address.
    NackDataAt(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Counting consecutive zero bytes towards binary mode.
    User { zeros: usize },
    Binary,
    I2c,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Bus {
    Idle,
    /// After a start condition, waiting for the device address byte.
    Addressing,
    /// Addressed for writing, waiting for the word address.
    WordAddress,
    /// Collecting a page write.
    Writing { pending: Vec<(usize, u8)>, next: usize },
    Reading,
    /// Some other device was addressed.
    Ignored,
}

pub struct SimulatedBusPirate {
    mode: Mode,
    bus: Bus,
    bulk_remaining: usize,
    memory: Vec<u8>,
    page_size: usize,
    device_address: u8,
    pointer: usize,
    output: VecDeque<u8>,
    sent: Vec<u8>,
    write_calls: usize,
    read_chunk: Option<usize>,
    fault: Option<Fault>,
}

impl SimulatedBusPirate {
    /// A device with a blank (0xFF) 256-byte, 16-byte-page EEPROM at 0x50.
    pub fn new() -> Self {
        Self::with_memory(vec![0xFF; 256])
    }

    pub fn with_memory(memory: Vec<u8>) -> Self {
        Self {
            mode: Mode::User { zeros: 0 },
            bus: Bus::Idle,
            bulk_remaining: 0,
            memory,
            page_size: 16,
            device_address: 0x50,
            pointer: 0,
            output: VecDeque::new(),
            sent: Vec::new(),
            write_calls: 0,
            read_chunk: None,
            fault: None,
        }
    }

    pub fn fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Deliver at most `n` bytes per read.
    pub fn read_chunk(mut self, n: usize) -> Self {
        self.read_chunk = Some(n.max(1));
        self
    }

    pub fn set_fault(&mut self, fault: Option<Fault>) {
        self.fault = fault;
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Every byte the host has written, in order.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Number of `write` calls the host has made.
    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    /// Whether the device is back at the user terminal.
    pub fn in_user_mode(&self) -> bool {
        matches!(self.mode, Mode::User { .. })
    }

    /// Bytes queued for the host but not read yet.
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    fn reply(&mut self, bytes: &[u8]) {
        if self.fault != Some(Fault::Unresponsive) {
            self.output.extend(bytes);
        }
    }

    fn control(&mut self, opcode: u8) {
        if self.fault == Some(Fault::RejectControl(opcode)) {
            self.reply(&[0x00]);
        } else {
            self.reply(&[CONTROL_ACK]);
        }
    }

    fn process(&mut self, byte: u8) {
        match self.mode {
            Mode::User { zeros } => {
                let zeros = if byte == 0x00 { zeros + 1 } else { 0 };
                if zeros == ENTER_BINARY_LEN {
                    self.mode = Mode::Binary;
                    self.reply(BINARY_ANNOUNCEMENT);
                } else {
                    self.mode = Mode::User { zeros };
                }
            }
            Mode::Binary => match byte {
                0x00 => self.reply(BINARY_ANNOUNCEMENT),
                0x02 if self.fault == Some(Fault::WrongI2cAnnouncement) => self.reply(b"SPI1"),
                0x02 => {
                    self.mode = Mode::I2c;
                    self.bus = Bus::Idle;
                    self.reply(I2C_ANNOUNCEMENT);
                }
                RESET => {
                    self.mode = Mode::User { zeros: 0 };
                    self.reply(&[CONTROL_ACK]);
                    self.reply(BANNER);
                }
                _ => self.reply(&[0x00]),
            },
            Mode::I2c if self.bulk_remaining > 0 => {
                self.bulk_remaining -= 1;
                let ack = self.bus_byte(byte);
                self.reply(&[ack]);
            }
            Mode::I2c => self.i2c_command(byte),
        }
    }

    fn i2c_command(&mut self, byte: u8) {
        match byte {
            0x00 => {
                self.mode = Mode::Binary;
                self.reply(BINARY_ANNOUNCEMENT);
            }
            I2C_START => {
                // A repeated start keeps the word address pointer.
                self.bus = Bus::Addressing;
                self.control(byte);
            }
            I2C_STOP => {
                if let Bus::Writing { pending, .. } = std::mem::replace(&mut self.bus, Bus::Idle) {
                    for (address, value) in pending {
                        self.memory[address] = value;
                    }
                }
                self.control(byte);
            }
            I2C_READ_BYTE => {
                let value = if self.bus == Bus::Reading {
                    let value = self.memory[self.pointer];
                    self.pointer = (self.pointer + 1) % self.memory.len();
                    value
                } else {
                    0xFF
                };
                self.reply(&[value]);
            }
            I2C_ACK | I2C_NACK => self.control(byte),
            b if b & 0xF0 == I2C_BULK_WRITE => {
                self.bulk_remaining = usize::from(b & 0x0F) + 1;
                self.control(b);
            }
            b if b & 0xF0 == I2C_PERIPHERALS => {
                if self.fault == Some(Fault::RejectPeripherals) {
                    self.reply(&[0x00]);
                } else {
                    self.reply(&[CONTROL_ACK]);
                }
            }
            // Speed settings and anything else the EEPROM does not care about.
            _ => self.reply(&[CONTROL_ACK]),
        }
    }

    /// One byte clocked onto the bus; returns the Bus Pirate's ACK echo.
    fn bus_byte(&mut self, byte: u8) -> u8 {
        match std::mem::replace(&mut self.bus, Bus::Idle) {
            Bus::Addressing => {
                if byte >> 1 != self.device_address || self.fault == Some(Fault::NackDeviceAddress)
                {
                    self.bus = Bus::Ignored;
                    return DATA_NACK;
                }
                self.bus = if byte & 1 == 1 {
                    Bus::Reading
                } else {
                    Bus::WordAddress
                };
                DATA_ACK
            }
            Bus::WordAddress => {
                self.pointer = usize::from(byte) % self.memory.len();
                self.bus = Bus::Writing {
                    pending: Vec::new(),
                    next: self.pointer,
                };
                DATA_ACK
            }
            Bus::Writing { mut pending, next } => {
                if self.fault == Some(Fault::NackDataAt(next as u8)) {
                    self.bus = Bus::Writing { pending, next };
                    return DATA_NACK;
                }
                pending.push((next, byte));
                let page = next - next % self.page_size;
                let following = page + (next + 1 - page) % self.page_size;
                self.bus = Bus::Writing {
                    pending,
                    next: following,
                };
                DATA_ACK
            }
            other => {
                self.bus = other;
                DATA_NACK
            }
        }
    }
}

impl Default for SimulatedBusPirate {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for SimulatedBusPirate {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_calls += 1;
        self.sent.extend_from_slice(buf);
        for &byte in buf {
            self.process(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedBusPirate {
    /// Times out like a serial port when nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.output.is_empty() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf
            .len()
            .min(self.output.len())
            .min(self.read_chunk.unwrap_or(usize::MAX));
        for slot in &mut buf[..n] {
            if let Some(byte) = self.output.pop_front() {
                *slot = byte;
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(sim: &mut SimulatedBusPirate, bytes: &[u8]) -> Vec<u8> {
        sim.write_all(bytes).unwrap();
        let mut out = vec![0u8; sim.pending_output()];
        if !out.is_empty() {
            sim.read_exact(&mut out).unwrap();
        }
        out
    }

    #[test]
    fn twenty_zeros_enter_binary_mode() {
        let mut sim = SimulatedBusPirate::new();
        assert!(exchange(&mut sim, &[0u8; 19]).is_empty());
        assert_eq!(exchange(&mut sim, &[0]), b"BBIO1");
        assert_eq!(exchange(&mut sim, &[0x02]), b"I2C1");
        assert_eq!(exchange(&mut sim, &[0x4C]), [0x01]);
    }

    #[test]
    fn page_write_rolls_over_within_the_page() {
        let mut sim = SimulatedBusPirate::new();
        exchange(&mut sim, &[0u8; 20]);
        exchange(&mut sim, &[0x02, 0x4C]);
        let acks = exchange(&mut sim, &[0x02, 0x13, 0xA0, 0x0F, 0x41, 0x42, 0x03]);
        assert_eq!(acks, [0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(sim.memory()[0x0F], 0x41);
        // The second byte wrapped to the start of page 0, not into page 1.
        assert_eq!(sim.memory()[0x00], 0x42);
        assert_eq!(sim.memory()[0x10], 0xFF);
    }

    #[test]
    fn reset_prints_the_banner() {
        let mut sim = SimulatedBusPirate::new();
        exchange(&mut sim, &[0u8; 20]);
        let out = exchange(&mut sim, &[0x0F]);
        assert_eq!(out[0], 0x01);
        assert_eq!(&out[1..], BANNER);
        assert!(sim.in_user_mode());
    }

    #[test]
    fn reads_time_out_when_idle() {
        let mut sim = SimulatedBusPirate::new();
        let err = sim.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
