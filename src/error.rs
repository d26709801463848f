use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

use crate::bbio::{Command, DataPhase};
use crate::modes::{SessionState, Stage};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device went quiet before echoing everything a command declares.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    #[error("could not {stage}: device answered {received:02X?}")]
    HandshakeFailed { stage: Stage, received: Vec<u8> },

    #[error("{command} was not acknowledged (echo 0x{received:02X}, expected 0x01)")]
    ControlAckFailed { command: Command, received: u8 },

    /// The addressed I2C device answered NACK.
    #[error("device NACKed the {phase}")]
    DataNack { phase: DataPhase },

    #[error("invalid acknowledgement 0x{received:02X} for the {phase}")]
    InvalidDataAck { phase: DataPhase, received: u8 },

    #[error("{command} requires {expected}, but the session is in {actual}")]
    InvalidState {
        command: Command,
        expected: SessionState,
        actual: SessionState,
    },

    #[error("bulk write of {0} bytes is outside 1..=16")]
    BulkWriteLength(usize),

    #[error("{len} bytes at address {address} exceed the {capacity}-byte block")]
    AddressOutOfRange {
        address: usize,
        len: usize,
        capacity: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::DataNack {
                phase: DataPhase::DeviceAddress,
            } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Error::DataNack { .. } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            _ => ErrorKind::Other,
        }
    }
}
