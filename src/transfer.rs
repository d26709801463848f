use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::trace;

use crate::config::Config;
use crate::error::{Error, Result};

/// The byte channel to the Bus Pirate.
///
/// Reads may come back short or time out while the device is still working
/// on a command; [`Link::receive`] keeps reading until the expected number of
/// bytes has arrived or the retry budget is spent.
pub(crate) struct Link<P> {
    port: P,
    retries: u32,
    retry_delay: Duration,
}

fn is_stall(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

impl<P: Read + Write> Link<P> {
    pub(crate) fn new(port: P, config: &Config) -> Self {
        Self {
            port,
            retries: config.read_retries,
            retry_delay: config.retry_delay,
        }
    }

    pub(crate) fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read exactly `expected` bytes.
    pub(crate) fn receive(&mut self, expected: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; expected];
        let mut filled = 0;
        let mut stalls = 0;
        while filled < expected {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => {}
                Ok(n) => {
                    filled += n;
                    continue;
                }
                Err(e) if is_stall(e.kind()) => {}
                Err(e) => return Err(e.into()),
            }
            stalls += 1;
            trace!("stalled at {filled}/{expected} bytes ({stalls}/{})", self.retries);
            if stalls > self.retries {
                return Err(Error::ShortRead {
                    expected,
                    received: filled,
                });
            }
            std::thread::sleep(self.retry_delay);
        }
        Ok(buf)
    }

    /// Discard up to `max` bytes, stopping at the first stall.
    pub(crate) fn drain(&mut self, max: usize) -> Result<usize> {
        let mut buf = vec![0u8; max];
        let mut drained = 0;
        while drained < max {
            match self.port.read(&mut buf[drained..]) {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(e) if is_stall(e.kind()) => break,
                Err(e) => return Err(e.into()),
            }
        }
        trace!("drained {drained} bytes");
        Ok(drained)
    }

    pub(crate) fn port(&self) -> &P {
        &self.port
    }

    pub(crate) fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub(crate) fn into_inner(self) -> P {
        self.port
    }
}
