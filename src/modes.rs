/// Which command set the Bus Pirate is currently listening with.
///
/// Moves forward only through the mode handshake and collapses back to
/// [`SessionState::UserMode`] after every round, successful or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Interactive text terminal. Where the device starts and ends.
    #[default]
    UserMode,
    /// Raw binary ("bitbang") command processing.
    BinaryMode,
    /// Binary I2C mode with the I2C command set active.
    I2cMode,
}

impl SessionState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            SessionState::UserMode => "user",
            SessionState::BinaryMode => "binary",
            SessionState::I2cMode => "I2C",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} mode", self.name())
    }
}

/// A step of the mode handshake or of its reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// User mode to binary mode.
    Binary,
    /// Binary mode to I2C mode.
    I2c,
    /// Power supply and pull-up configuration.
    Peripherals,
    /// I2C mode back to binary mode.
    LeaveI2c,
    /// Binary mode back to user mode.
    Reset,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Binary => "enter binary mode",
            Stage::I2c => "enter I2C mode",
            Stage::Peripherals => "enable peripherals",
            Stage::LeaveI2c => "leave I2C mode",
            Stage::Reset => "reset to user mode",
        })
    }
}
