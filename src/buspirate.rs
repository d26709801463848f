use std::io::{Read, Write};

use log::{debug, info, warn};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::bbio::{self, validate, Command, DataPhase, Frame, Peripherals};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::modes::SessionState;
use crate::transfer::Link;

/// A Bus Pirate driven through its binary I2C mode.
///
/// Every round of work enters binary and then I2C mode, does its business
/// and resets the device to user mode again. The device never stays in I2C
/// mode between rounds.
pub struct BusPirate<P = Box<dyn SerialPort>> {
    link: Link<P>,
    state: SessionState,
    peripherals: Peripherals,
}

/// Open the Bus Pirate's serial port (8N1, no flow control).
pub fn open(path: &str, config: &Config) -> Result<BusPirate> {
    let port = serialport::new(path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.timeout)
        .open()?;
    info!("Opened {path} at {} baud", config.baud_rate);
    Ok(BusPirate::new(port, config))
}

impl<P: Read + Write> BusPirate<P> {
    /// Wrap an already configured channel. The device must be in user mode.
    pub fn new(port: P, config: &Config) -> Self {
        Self {
            link: Link::new(port, config),
            state: SessionState::UserMode,
            peripherals: config.peripherals,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peripherals(&self) -> Peripherals {
        self.peripherals
    }

    pub fn port(&self) -> &P {
        self.link.port()
    }

    pub fn port_mut(&mut self) -> &mut P {
        self.link.port_mut()
    }

    pub fn into_inner(self) -> P {
        self.link.into_inner()
    }

    /// Send `frame` in one write, read its whole echo in one go and validate
    /// it command by command.
    ///
    /// Returns the bytes produced by any [`Command::ReadByte`] in the frame.
    /// Nothing is sent if the session is not in the right state for every
    /// command of the frame.
    pub fn transact(&mut self, frame: &Frame) -> Result<Vec<u8>> {
        frame.check_states(self.state)?;

        let request = frame.encode();
        debug!("-> {request:02X?}");
        self.link.send(&request)?;
        let response = self.link.receive(frame.response_len())?;
        debug!("<- {response:02X?}");

        let mut values = Vec::new();
        for (command, echo) in frame.split(&response)? {
            if let Some(value) = validate::check(command, echo)? {
                values.push(value);
            }
            self.state = command.next_state();
        }
        Ok(values)
    }

    /// Run a frame that carries its own handshake and reset.
    ///
    /// On failure the device has still executed the whole frame, so the
    /// session is considered back in user mode once the banner is drained.
    pub fn transact_round(&mut self, frame: &Frame) -> Result<Vec<u8>> {
        match self.transact(frame) {
            Ok(values) => {
                self.drain_banner()?;
                Ok(values)
            }
            Err(e @ Error::InvalidState { .. }) => Err(e),
            Err(e) if frame.is_self_closing() => {
                self.state = SessionState::UserMode;
                if let Err(drain_error) = self.drain_banner() {
                    warn!("Could not drain the banner after a failed round: {drain_error}");
                }
                Err(e)
            }
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    /// Send one command on its own and validate its echo.
    pub fn execute(&mut self, command: Command) -> Result<Option<u8>> {
        let values = self.transact(&Frame::single(command))?;
        Ok(values.first().copied())
    }

    /// User mode to binary mode to I2C mode, then power and pull-ups on.
    ///
    /// On failure the device is torn down back to user mode before the error
    /// is returned.
    pub fn enter(&mut self) -> Result<()> {
        let handshake = [
            Command::EnterBinary,
            Command::EnterI2c,
            Command::Peripherals(self.peripherals),
        ];
        for command in handshake {
            if let Err(e) = self.execute(command) {
                self.teardown();
                return Err(e);
            }
        }
        debug!("Session in {}", self.state);
        Ok(())
    }

    /// I2C mode to binary mode to user mode, then drain the banner.
    pub fn exit(&mut self) -> Result<()> {
        self.execute(Command::LeaveI2c)?;
        self.execute(Command::Reset)?;
        self.drain_banner()
    }

    /// Consume the version banner printed when the device returns to user mode.
    pub fn drain_banner(&mut self) -> Result<()> {
        for _ in 0..bbio::BANNER_READS {
            self.link.drain(bbio::BANNER_CHUNK)?;
        }
        Ok(())
    }

    /// Best-effort return to user mode after a failure.
    ///
    /// Sends stop, I2C disable and binary disable as the current state calls
    /// for. Failures along the way are logged and otherwise ignored.
    pub fn teardown(&mut self) {
        let steps: &[Command] = match self.state {
            SessionState::I2cMode => &[Command::Stop, Command::LeaveI2c, Command::Reset],
            SessionState::BinaryMode => &[Command::Reset],
            SessionState::UserMode => &[],
        };
        for command in steps {
            if let Err(e) = self.exchange(command) {
                warn!("Teardown: {command} failed: {e}");
            }
        }
        if let Err(e) = self.drain_banner() {
            warn!("Teardown: could not drain the banner: {e}");
        }
        self.state = SessionState::UserMode;
    }

    /// Send and check one command without consulting the session state.
    fn exchange(&mut self, command: &Command) -> Result<()> {
        let mut request = Vec::new();
        command.encode_into(&mut request);
        self.link.send(&request)?;
        let echo = self.link.receive(command.echo().arity())?;
        validate::check(command, &echo).map(drop)
    }

    /// Enter I2C mode, run `round`, and reset to user mode.
    ///
    /// If `round` fails, the device is torn down and the round's error is
    /// returned; teardown failures never replace it.
    pub fn session<T>(&mut self, round: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter()?;
        let value = match round(self) {
            Ok(value) => value,
            Err(e) => {
                self.teardown();
                return Err(e);
            }
        };
        if let Err(e) = self.exit() {
            self.teardown();
            return Err(e);
        }
        Ok(value)
    }

    pub fn i2c_start(&mut self) -> Result<()> {
        self.execute(Command::Start).map(drop)
    }

    pub fn i2c_stop(&mut self) -> Result<()> {
        self.execute(Command::Stop).map(drop)
    }

    pub fn i2c_ack(&mut self) -> Result<()> {
        self.execute(Command::Ack).map(drop)
    }

    pub fn i2c_nack(&mut self) -> Result<()> {
        self.execute(Command::Nack).map(drop)
    }

    pub fn i2c_read_byte(&mut self) -> Result<u8> {
        match self.execute(Command::ReadByte)? {
            Some(value) => Ok(value),
            None => Err(Error::ShortRead {
                expected: 1,
                received: 0,
            }),
        }
    }

    /// Announce a burst with a bulk write header, then send each byte and
    /// check its acknowledgement before sending the next.
    ///
    /// If a byte is refused, the rest of the announced burst is still sent
    /// (acknowledgements ignored) so the device is back to reading commands
    /// when the error is returned.
    pub fn i2c_bulk_write(&mut self, bytes: &[(DataPhase, u8)]) -> Result<()> {
        self.execute(Command::bulk_write(bytes.len())?)?;
        for (index, &(phase, byte)) in bytes.iter().enumerate() {
            match self.execute(Command::Byte(phase, byte)) {
                Ok(_) => {}
                Err(e @ (Error::DataNack { .. } | Error::InvalidDataAck { .. })) => {
                    self.finish_burst(&bytes[index + 1..]);
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn finish_burst(&mut self, rest: &[(DataPhase, u8)]) {
        for &(phase, byte) in rest {
            if let Err(e) = self.exchange(&Command::Byte(phase, byte)) {
                debug!("Burst remainder: {e}");
            }
        }
    }
}
