//! The Bus Pirate's binary bitbang ("BBIO") protocol, I2C flavour.
//!
//! Every command is answered by an echo whose shape depends on the command:
//! an ASCII mode announcement, a single control acknowledgement, an I2C
//! data-phase acknowledgement, or a raw byte read from the bus.
mod frame;
pub(crate) mod validate;

use bit_field::BitField;

use crate::error::Error;
use crate::modes::{SessionState, Stage};

pub use frame::Frame;

/// Sent [`ENTER_BINARY_LEN`] times to reach binary mode from user mode.
pub const ENTER_BINARY: u8 = 0x00;
pub const ENTER_BINARY_LEN: usize = 20;
/// Binary mode: switch to the I2C command set.
pub const ENTER_I2C: u8 = 0x02;
/// Binary mode: leave binary mode and reset to the user terminal.
pub const RESET: u8 = 0x0F;

/// I2C mode: return to plain binary mode.
pub const LEAVE_I2C: u8 = 0x00;
pub const I2C_START: u8 = 0x02;
pub const I2C_STOP: u8 = 0x03;
pub const I2C_READ_BYTE: u8 = 0x04;
pub const I2C_ACK: u8 = 0x06;
pub const I2C_NACK: u8 = 0x07;
/// Low nibble holds the byte count minus one.
pub const I2C_BULK_WRITE: u8 = 0x10;
/// Low nibble holds the power, pull-up, AUX and CS flags.
pub const I2C_PERIPHERALS: u8 = 0x40;

/// Largest burst one bulk write header can announce.
pub const BULK_WRITE_MAX: usize = 16;

pub const BINARY_ANNOUNCEMENT: &[u8] = b"BBIO1";
pub const I2C_ANNOUNCEMENT: &[u8] = b"I2C1";

/// Control commands echo this on success.
pub const CONTROL_ACK: u8 = 0x01;
/// Data-phase echo: the addressed device acknowledged the byte.
pub const DATA_ACK: u8 = 0x00;
/// Data-phase echo: the addressed device did not acknowledge the byte.
pub const DATA_NACK: u8 = 0x01;

/// Size of one read of the version banner printed after a reset.
pub const BANNER_CHUNK: usize = 132;
pub const BANNER_READS: usize = 2;

/// Power supply, pull-up, AUX and CS pin state, sent as `0100wxyz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bon::Builder)]
pub struct Peripherals {
    #[builder(default = true)]
    pub power: bool,
    #[builder(default = true)]
    pub pullups: bool,
    #[builder(default)]
    pub aux: bool,
    #[builder(default)]
    pub chip_select: bool,
}

impl Peripherals {
    pub fn to_byte(self) -> u8 {
        let mut byte = I2C_PERIPHERALS;
        byte.set_bit(3, self.power);
        byte.set_bit(2, self.pullups);
        byte.set_bit(1, self.aux);
        byte.set_bit(0, self.chip_select);
        byte
    }
}

impl Default for Peripherals {
    /// Power and pull-ups on.
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Which byte of an I2C write burst an acknowledgement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPhase {
    /// The 8-bit device address (7-bit address plus R/W bit).
    DeviceAddress,
    /// The EEPROM memory address.
    WordAddress,
    /// The n-th data byte of the burst.
    Data(usize),
}

impl std::fmt::Display for DataPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataPhase::DeviceAddress => f.write_str("device address"),
            DataPhase::WordAddress => f.write_str("word address"),
            DataPhase::Data(index) => write!(f, "data byte {index}"),
        }
    }
}

/// What the device sends back for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    /// A fixed ASCII mode announcement, compared over its full length.
    Announcement(&'static [u8]),
    /// One byte, `0x01` on success.
    Control,
    /// One byte, `0x00` for ACK and `0x01` for NACK.
    DataAck(DataPhase),
    /// One byte of bus data.
    Value,
}

impl Echo {
    pub fn arity(&self) -> usize {
        match self {
            Echo::Announcement(text) => text.len(),
            Echo::Control | Echo::DataAck(_) | Echo::Value => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    EnterBinary,
    EnterI2c,
    Peripherals(Peripherals),
    Start,
    Stop,
    /// Announces a burst of `n` raw bytes, `1..=16`.
    BulkWrite(u8),
    /// One raw byte of a bulk write burst.
    Byte(DataPhase, u8),
    ReadByte,
    Ack,
    Nack,
    LeaveI2c,
    Reset,
}

impl Command {
    pub fn bulk_write(count: usize) -> Result<Self, Error> {
        match count {
            1..=BULK_WRITE_MAX => Ok(Command::BulkWrite(count as u8)),
            other => Err(Error::BulkWriteLength(other)),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match *self {
            Command::EnterBinary => out.extend_from_slice(&[ENTER_BINARY; ENTER_BINARY_LEN]),
            Command::EnterI2c => out.push(ENTER_I2C),
            Command::Peripherals(peripherals) => out.push(peripherals.to_byte()),
            Command::Start => out.push(I2C_START),
            Command::Stop => out.push(I2C_STOP),
            Command::BulkWrite(count) => out.push(I2C_BULK_WRITE | (count.saturating_sub(1) & 0x0F)),
            Command::Byte(_, byte) => out.push(byte),
            Command::ReadByte => out.push(I2C_READ_BYTE),
            Command::Ack => out.push(I2C_ACK),
            Command::Nack => out.push(I2C_NACK),
            Command::LeaveI2c => out.push(LEAVE_I2C),
            Command::Reset => out.push(RESET),
        }
    }

    pub fn echo(&self) -> Echo {
        match self {
            Command::EnterBinary | Command::LeaveI2c => Echo::Announcement(BINARY_ANNOUNCEMENT),
            Command::EnterI2c => Echo::Announcement(I2C_ANNOUNCEMENT),
            Command::Byte(phase, _) => Echo::DataAck(*phase),
            Command::ReadByte => Echo::Value,
            Command::Peripherals(_)
            | Command::Start
            | Command::Stop
            | Command::BulkWrite(_)
            | Command::Ack
            | Command::Nack
            | Command::Reset => Echo::Control,
        }
    }

    /// The handshake step this command performs, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Command::EnterBinary => Some(Stage::Binary),
            Command::EnterI2c => Some(Stage::I2c),
            Command::Peripherals(_) => Some(Stage::Peripherals),
            Command::LeaveI2c => Some(Stage::LeaveI2c),
            Command::Reset => Some(Stage::Reset),
            _ => None,
        }
    }

    pub fn required_state(&self) -> SessionState {
        match self {
            Command::EnterBinary => SessionState::UserMode,
            Command::EnterI2c | Command::Reset => SessionState::BinaryMode,
            _ => SessionState::I2cMode,
        }
    }

    /// The session state once the device has acknowledged this command.
    pub fn next_state(&self) -> SessionState {
        match self {
            Command::EnterBinary | Command::LeaveI2c => SessionState::BinaryMode,
            Command::Reset => SessionState::UserMode,
            _ => SessionState::I2cMode,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::EnterBinary => f.write_str("binary mode enable"),
            Command::EnterI2c => f.write_str("I2C mode enable"),
            Command::Peripherals(p) => write!(f, "peripheral configuration 0x{:02X}", p.to_byte()),
            Command::Start => f.write_str("start bit"),
            Command::Stop => f.write_str("stop bit"),
            Command::BulkWrite(count) => write!(f, "bulk write header ({count} bytes)"),
            Command::Byte(phase, byte) => write!(f, "{phase} 0x{byte:02X}"),
            Command::ReadByte => f.write_str("read byte"),
            Command::Ack => f.write_str("ACK"),
            Command::Nack => f.write_str("NACK"),
            Command::LeaveI2c => f.write_str("I2C mode disable"),
            Command::Reset => f.write_str("binary mode disable"),
        }
    }
}

/// The 8-bit write address of a 7-bit I2C address.
pub fn write_address(address: u8) -> u8 {
    address << 1
}

/// The 8-bit read address of a 7-bit I2C address.
pub fn read_address(address: u8) -> u8 {
    (address << 1) | 1
}
