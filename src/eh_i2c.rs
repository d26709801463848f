use std::io::{Read, Write};

use embedded_hal::i2c::{ErrorType, I2c, Operation};
use log::debug;

use crate::bbio::{self, DataPhase, BULK_WRITE_MAX};
use crate::{BusPirate, Error};

impl<P: Read + Write> ErrorType for BusPirate<P> {
    type Error = Error;
}

/// Each `transaction` is one full session: mode handshake, the operations,
/// stop, and reset to user mode.
impl<P: Read + Write> I2c for BusPirate<P> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }
        debug!(
            "I2C transaction with 0x{address:02X}, {} operations",
            operations.len()
        );

        self.session(|bus| {
            // Whether the previous operation was a read. Adjacent operations
            // of the same kind are merged; a change of kind needs a
            // (repeated) start and the address again.
            let mut previous_read: Option<bool> = None;

            for index in 0..operations.len() {
                let is_read = matches!(operations[index], Operation::Read(_));
                let start = previous_read != Some(is_read);
                // The last byte before a stop or a switch to writing is NACKed.
                let read_run_ends = !matches!(operations.get(index + 1), Some(Operation::Read(_)));
                previous_read = Some(is_read);

                match &mut operations[index] {
                    Operation::Write(bytes) => write_burst(bus, address, bytes, start)?,
                    Operation::Read(buffer) => {
                        read_burst(bus, address, buffer, start, read_run_ends)?
                    }
                }
            }

            bus.i2c_stop()
        })
    }
}

fn write_burst<P: Read + Write>(
    bus: &mut BusPirate<P>,
    address: u8,
    bytes: &[u8],
    start: bool,
) -> Result<(), Error> {
    let mut burst = Vec::with_capacity(bytes.len() + 1);
    if start {
        bus.i2c_start()?;
        burst.push((DataPhase::DeviceAddress, bbio::write_address(address)));
    }
    burst.extend(
        bytes
            .iter()
            .enumerate()
            .map(|(index, &byte)| (DataPhase::Data(index), byte)),
    );
    for chunk in burst.chunks(BULK_WRITE_MAX) {
        bus.i2c_bulk_write(chunk)?;
    }
    Ok(())
}

fn read_burst<P: Read + Write>(
    bus: &mut BusPirate<P>,
    address: u8,
    buffer: &mut [u8],
    start: bool,
    run_ends: bool,
) -> Result<(), Error> {
    if start {
        bus.i2c_start()?;
        bus.i2c_bulk_write(&[(DataPhase::DeviceAddress, bbio::read_address(address))])?;
    }
    let last = buffer.len().saturating_sub(1);
    for (index, slot) in buffer.iter_mut().enumerate() {
        *slot = bus.i2c_read_byte()?;
        if run_ends && index == last {
            bus.i2c_nack()?;
        } else {
            bus.i2c_ack()?;
        }
    }
    Ok(())
}
