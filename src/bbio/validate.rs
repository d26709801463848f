//! Checks the device's echo for each command.
//!
//! Control commands and I2C data-phase bytes use opposite polarities: a
//! control command succeeds when the device echoes `0x01`, while a data-phase
//! byte succeeds when the bus device ACKs, which the Bus Pirate reports as
//! `0x00`. Do not fold the two into one rule.
use super::{Command, DataPhase, Echo, CONTROL_ACK, DATA_ACK, DATA_NACK};
use crate::error::{Error, Result};

/// Validate `echo` for `command`, returning the byte read from the bus for
/// [`Command::ReadByte`].
///
/// `echo` must already be exactly the command's declared arity.
pub(crate) fn check(command: &Command, echo: &[u8]) -> Result<Option<u8>> {
    match command.echo() {
        Echo::Announcement(expected) => check_announcement(command, expected, echo).map(|_| None),
        Echo::Control => check_control_ack(command, single(echo)?).map(|_| None),
        Echo::DataAck(phase) => check_data_ack(phase, single(echo)?).map(|_| None),
        Echo::Value => single(echo).map(Some),
    }
}

fn single(echo: &[u8]) -> Result<u8> {
    match echo {
        [byte] => Ok(*byte),
        other => Err(Error::ShortRead {
            expected: 1,
            received: other.len(),
        }),
    }
}

/// Mode announcements must match byte for byte and in length.
fn check_announcement(command: &Command, expected: &[u8], received: &[u8]) -> Result<()> {
    if received == expected {
        return Ok(());
    }
    match command.stage() {
        Some(stage) => Err(Error::HandshakeFailed {
            stage,
            received: received.to_vec(),
        }),
        None => Err(Error::ControlAckFailed {
            command: *command,
            received: received.first().copied().unwrap_or_default(),
        }),
    }
}

/// Control polarity: `0x01` is success, anything else is a failure.
fn check_control_ack(command: &Command, received: u8) -> Result<()> {
    if received == CONTROL_ACK {
        return Ok(());
    }
    match command.stage() {
        Some(stage) => Err(Error::HandshakeFailed {
            stage,
            received: vec![received],
        }),
        None => Err(Error::ControlAckFailed {
            command: *command,
            received,
        }),
    }
}

/// Data-phase polarity: `0x00` is ACK (continue), `0x01` is NACK (abort).
fn check_data_ack(phase: DataPhase, received: u8) -> Result<()> {
    match received {
        DATA_ACK => Ok(()),
        DATA_NACK => Err(Error::DataNack { phase }),
        received => Err(Error::InvalidDataAck { phase, received }),
    }
}
