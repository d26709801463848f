use crate::error::{Error, Result};

/// The next EEPROM byte address to read or write.
///
/// Only advances once a transaction has been fully acknowledged. Positions
/// run from 0 up to and including `capacity`, which marks the end of the
/// addressable block; there is no wrap-around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressCursor {
    position: usize,
    capacity: usize,
}

impl AddressCursor {
    pub fn new(capacity: usize) -> Self {
        Self {
            position: 0,
            capacity,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes left before the end of the block.
    pub fn remaining(&self) -> usize {
        self.capacity - self.position
    }

    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.capacity {
            return Err(self.out_of_range(position, 0));
        }
        self.position = position;
        Ok(())
    }

    /// The on-wire address byte for a transfer of `len` bytes starting here.
    pub fn address_for(&self, len: usize) -> Result<u8> {
        if len == 0 || self.position + len > self.capacity {
            return Err(self.out_of_range(self.position, len));
        }
        u8::try_from(self.position).map_err(|_| self.out_of_range(self.position, len))
    }

    pub fn advance(&mut self, len: usize) -> Result<()> {
        if self.position + len > self.capacity {
            return Err(self.out_of_range(self.position, len));
        }
        self.position += len;
        Ok(())
    }

    fn out_of_range(&self, address: usize, len: usize) -> Error {
        Error::AddressOutOfRange {
            address,
            len,
            capacity: self.capacity,
        }
    }
}
