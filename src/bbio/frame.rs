use super::Command;
use crate::error::{Error, Result};
use crate::modes::SessionState;

/// Commands sent to the device in a single write.
///
/// The response is cut back into per-command echoes by each command's
/// declared echo arity, so no caller ever indexes into a response buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    commands: Vec<Command>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(command: Command) -> Self {
        Self {
            commands: vec![command],
        }
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.commands.len() + super::ENTER_BINARY_LEN);
        for command in &self.commands {
            command.encode_into(&mut out);
        }
        out
    }

    /// Number of bytes the device echoes for the whole frame.
    pub fn response_len(&self) -> usize {
        self.commands.iter().map(|c| c.echo().arity()).sum()
    }

    /// Whether the frame ends by resetting the device to user mode itself.
    pub fn is_self_closing(&self) -> bool {
        self.commands.last() == Some(&Command::Reset)
    }

    /// Walk the frame from `state`, returning the state it leaves behind.
    ///
    /// Fails on the first command that the session would not be ready for.
    pub fn check_states(&self, mut state: SessionState) -> Result<SessionState> {
        for command in &self.commands {
            let expected = command.required_state();
            if expected != state {
                return Err(Error::InvalidState {
                    command: *command,
                    expected,
                    actual: state,
                });
            }
            state = command.next_state();
        }
        Ok(state)
    }

    /// Pair every command with its slice of `response`.
    pub fn split<'a>(&'a self, response: &'a [u8]) -> Result<Vec<(&'a Command, &'a [u8])>> {
        let expected = self.response_len();
        if response.len() < expected {
            return Err(Error::ShortRead {
                expected,
                received: response.len(),
            });
        }
        let mut rest = response;
        let echoes = self
            .commands
            .iter()
            .map(|command| {
                let (echo, tail) = rest.split_at(command.echo().arity());
                rest = tail;
                (command, echo)
            })
            .collect();
        Ok(echoes)
    }
}

impl FromIterator<Command> for Frame {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl Extend<Command> for Frame {
    fn extend<I: IntoIterator<Item = Command>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbio::{DataPhase, Peripherals};

    fn handshake() -> Frame {
        Frame::from_iter([
            Command::EnterBinary,
            Command::EnterI2c,
            Command::Peripherals(Peripherals::default()),
        ])
    }

    #[test]
    fn encodes_commands_back_to_back() {
        let mut frame = handshake();
        frame.push(Command::Start).push(Command::Stop);
        let mut expected = vec![0u8; 20];
        expected.extend_from_slice(&[0x02, 0x4C, 0x02, 0x03]);
        assert_eq!(frame.encode(), expected);
        assert_eq!(frame.response_len(), 5 + 4 + 1 + 1 + 1);
    }

    #[test]
    fn splits_response_by_declared_arity() {
        let mut frame = handshake();
        frame
            .push(Command::Start)
            .push(Command::Byte(DataPhase::DeviceAddress, 0xA0));
        let response = b"BBIO1I2C1\x01\x01\x00";
        let echoes = frame.split(response).unwrap();
        let slices: Vec<&[u8]> = echoes.iter().map(|(_, echo)| *echo).collect();
        let expected: [&[u8]; 5] = [b"BBIO1", b"I2C1", &[0x01], &[0x01], &[0x00]];
        assert_eq!(slices, expected);
    }

    #[test]
    fn split_reports_short_response() {
        let err = handshake().split(b"BBIO1I2C").unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                expected: 10,
                received: 8
            }
        ));
    }

    #[test]
    fn state_walk() {
        let mut frame = handshake();
        frame.push(Command::LeaveI2c).push(Command::Reset);
        assert_eq!(
            frame.check_states(SessionState::UserMode).unwrap(),
            SessionState::UserMode
        );
        assert!(frame.is_self_closing());
    }

    #[test]
    fn i2c_commands_need_i2c_mode() {
        let err = Frame::single(Command::Start)
            .check_states(SessionState::BinaryMode)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                command: Command::Start,
                expected: SessionState::I2cMode,
                actual: SessionState::BinaryMode,
            }
        ));
    }
}
