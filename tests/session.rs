mod common;

use buspirate_eeprom::bbio::I2C_START;
use buspirate_eeprom::sim::{Fault, SimulatedBusPirate, BANNER};
use buspirate_eeprom::{Command, DataPhase, Error, Frame, SessionState, Stage};

use common::bus;

#[test]
fn enter_and_exit_walk_the_modes() {
    let mut bus = bus(SimulatedBusPirate::new());
    bus.enter().unwrap();
    assert_eq!(bus.state(), SessionState::I2cMode);

    let mut expected = vec![0x00; 20];
    expected.extend_from_slice(&[0x02, 0x4C]);
    assert_eq!(bus.port().sent(), expected);

    bus.exit().unwrap();
    assert_eq!(bus.state(), SessionState::UserMode);
    assert!(bus.port().in_user_mode());
    // The banner has been drained.
    assert_eq!(bus.port().pending_output(), 0);
}

#[test]
fn commands_are_checked_against_the_session_state() {
    let mut bus = bus(SimulatedBusPirate::new());
    let err = bus.execute(Command::Start).unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidState {
            command: Command::Start,
            expected: SessionState::I2cMode,
            actual: SessionState::UserMode,
        }
    ));
    assert!(bus.port().sent().is_empty());
}

#[test]
fn rejected_peripherals_fail_the_handshake() {
    let mut bus = bus(SimulatedBusPirate::new().fault(Fault::RejectPeripherals));
    let err = bus.enter().unwrap_err();

    match err {
        Error::HandshakeFailed { stage, received } => {
            assert_eq!(stage, Stage::Peripherals);
            assert_eq!(received, [0x00]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bus.state(), SessionState::UserMode);
    assert!(bus.port().in_user_mode());
}

#[test]
fn wrong_announcement_fails_the_handshake() {
    let mut bus = bus(SimulatedBusPirate::new().fault(Fault::WrongI2cAnnouncement));
    let err = bus.enter().unwrap_err();

    match err {
        Error::HandshakeFailed { stage, received } => {
            assert_eq!(stage, Stage::I2c);
            assert_eq!(received, b"SPI1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bus.state(), SessionState::UserMode);
    assert!(bus.port().in_user_mode());
}

#[test]
fn rejected_start_is_a_control_failure() {
    let mut bus = bus(SimulatedBusPirate::new().fault(Fault::RejectControl(I2C_START)));
    let err = bus.session(|bus| bus.i2c_start()).unwrap_err();

    assert!(matches!(
        err,
        Error::ControlAckFailed {
            command: Command::Start,
            received: 0x00
        }
    ));
    assert_eq!(bus.state(), SessionState::UserMode);
    assert!(bus.port().in_user_mode());
}

#[test]
fn session_returns_the_round_error_after_teardown() {
    let mut bus = bus(SimulatedBusPirate::new());
    let err = bus
        .session(|bus| -> buspirate_eeprom::Result<()> {
            bus.i2c_start()?;
            Err(Error::BulkWriteLength(0))
        })
        .unwrap_err();

    assert!(matches!(err, Error::BulkWriteLength(0)));
    assert_eq!(bus.state(), SessionState::UserMode);
    assert!(bus.port().in_user_mode());
    assert_eq!(bus.port().pending_output(), 0);
}

#[test]
fn one_frame_carries_a_whole_random_read() {
    let mut memory = vec![0xFF; 256];
    memory[5] = 0x5A;
    let mut bus = bus(SimulatedBusPirate::with_memory(memory));

    let frame = Frame::from_iter([
        Command::Start,
        Command::BulkWrite(2),
        Command::Byte(DataPhase::DeviceAddress, 0xA0),
        Command::Byte(DataPhase::WordAddress, 0x05),
        Command::Start,
        Command::BulkWrite(1),
        Command::Byte(DataPhase::DeviceAddress, 0xA1),
        Command::ReadByte,
        Command::Nack,
        Command::Stop,
    ]);
    let values = bus.session(|bus| bus.transact(&frame)).unwrap();
    assert_eq!(values, [0x5A]);
}

#[test]
fn reset_leaves_a_banner_to_drain() {
    let mut bus = bus(SimulatedBusPirate::new());
    bus.execute(Command::EnterBinary).unwrap();
    assert_eq!(bus.state(), SessionState::BinaryMode);

    bus.execute(Command::Reset).unwrap();
    assert_eq!(bus.state(), SessionState::UserMode);
    assert_eq!(bus.port().pending_output(), BANNER.len());

    bus.drain_banner().unwrap();
    assert_eq!(bus.port().pending_output(), 0);
}
