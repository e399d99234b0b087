mod common;

use std::sync::Arc;

use screenman::api::{Command, MotionState};
use screenman::clock::ManualClock;
use screenman::config::Config;
use screenman::cover::{host_intent, present, to_canonical};
use screenman::frame::{Address, Frame};
use screenman::screen::{Screen, ScreenModel};

use common::RecordingTransport;

fn build(config: &Config) -> (Screen, RecordingTransport, Arc<ManualClock>) {
    let transport = RecordingTransport::default();
    let clock = Arc::new(ManualClock::new(0.0));
    let screen = Screen::new(
        ScreenModel::new(config.open_duration(), config.close_duration()),
        config.address,
        Box::new(transport.clone()),
        clock.clone(),
    );
    (screen, transport, clock)
}

#[test]
fn close_stop_reopen() {
    let config = Config::new("/dev/ttyUSB0", 10, 8).unwrap();
    let (mut screen, transport, clock) = build(&config);

    assert!(screen.close().unwrap());
    clock.set(4.0);
    assert!((screen.position() - 50.0).abs() < 1e-9);
    assert!(screen.stop().unwrap());
    assert_eq!(screen.state(), MotionState::Stopped);

    assert!(screen.open().unwrap());
    assert!((screen.model().command_timestamp() + 1.0).abs() < 1e-9);
    clock.set(9.0);
    assert_eq!(screen.position(), 100.0);
    assert_eq!(screen.state(), MotionState::Up);

    let bytes: Vec<Vec<u8>> = transport.sent().iter().map(|f| f.as_bytes().to_vec()).collect();
    assert_eq!(
        bytes,
        vec![
            vec![0xFF, 0xAA, 0xEE, 0xEE, 0xEE],
            vec![0xFF, 0xAA, 0xEE, 0xEE, 0xCC],
            vec![0xFF, 0xAA, 0xEE, 0xEE, 0xDD],
        ]
    );
}

#[test]
fn unplugged_adapter_changes_nothing() {
    let config = Config::new("/dev/ttyUSB0", 10, 8).unwrap();
    let (mut screen, transport, clock) = build(&config);
    screen.restore_position(40.0);

    transport.unplug(true);
    assert!(screen.open().is_err());
    assert!(screen.close().is_err());
    clock.set(5.0);
    assert_eq!(screen.state(), MotionState::Stopped);
    assert!((screen.position() - 40.0).abs() < 1e-9);
    assert!(transport.sent().is_empty());
    assert!(!screen.is_available());
}

#[test]
fn alternate_address_goes_on_the_wire() {
    let mut config = Config::new("/dev/ttyUSB0", 10, 8).unwrap();
    config.address = Address::ALTERNATE;
    let (mut screen, transport, _clock) = build(&config);

    screen.close().unwrap();
    let sent = transport.sent();
    assert_eq!(sent[0].as_bytes(), &[0xFF, 0xEE, 0xEE, 0xEE, 0xEE]);
    assert_eq!(
        Frame::decode_command(sent[0].as_bytes(), Address::ALTERNATE),
        Some(Command::Close)
    );
}

#[test]
fn inverted_host_sees_mirrored_screen() {
    let mut config = Config::new("/dev/ttyUSB0", 10, 10).unwrap();
    config.inverted = true;
    let (mut screen, transport, clock) = build(&config);

    // host remembers the screen as 30 % open, which is 70 % in screen terms
    screen.restore_position(to_canonical(30.0, config.inverted));
    assert!((screen.position() - 70.0).abs() < 1e-9);

    // host "open" runs the screen down
    match host_intent(Command::Open, config.inverted) {
        Command::Close => assert!(screen.close().unwrap()),
        other => panic!("unexpected {:?}", other),
    }
    clock.set(2.0);
    let cover = present(screen.refresh(), config.inverted);
    assert_eq!(cover.position, 50);
    assert!(cover.is_opening);
    assert!(!cover.is_closing);

    clock.set(10.0);
    let cover = present(screen.refresh(), config.inverted);
    assert_eq!(cover.position, 100);
    assert!(!cover.is_closed);
    assert_eq!(screen.state(), MotionState::Down);
    assert_eq!(transport.sent().len(), 1);
}
