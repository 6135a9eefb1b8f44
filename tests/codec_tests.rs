//! Tests for control frame encoding and decoding

use rand::Rng;
use tango_events::codec::{decode, decode_int, encode, encode_int};
use tango_events::{Command, ControlFrame, Error, SocketOptions};

const ENDPOINT: &str = "tcp://host:5555";
const HEARTBEAT: &str = "tango://host:10000/sys/tg_test/1.heartbeat";
const EVENT: &str = "tango://host:10000/sys/tg_test/1/double_scalar.change";

#[test]
fn test_connect_heartbeat_round_trip() {
    let frame = encode(Command::ConnectHeartbeat, &[ENDPOINT, HEARTBEAT], &[]).unwrap();
    let structure = decode(&frame).unwrap();

    assert_eq!(structure.command, Command::ConnectHeartbeat);
    assert_eq!(structure.end_point.as_deref(), Some(ENDPOINT));
    assert_eq!(structure.event_name.as_deref(), Some(HEARTBEAT));
    assert_eq!((structure.hwm, structure.rate, structure.ivl), (0, 0, 0));
}

#[test]
fn test_connect_event_round_trip() {
    let frame = encode(Command::ConnectEvent, &[ENDPOINT, EVENT], &[100, -1, 1000]).unwrap();
    let structure = decode(&frame).unwrap();

    assert_eq!(structure.command, Command::ConnectEvent);
    assert_eq!(structure.end_point.as_deref(), Some(ENDPOINT));
    assert_eq!(structure.event_name.as_deref(), Some(EVENT));
    assert_eq!(structure.hwm, 100);
    assert_eq!(structure.rate, -1);
    assert_eq!(structure.ivl, 1000);
}

#[test]
fn test_every_command_round_trips() {
    let frames = vec![
        ControlFrame::end(),
        ControlFrame::connect_heartbeat(ENDPOINT, HEARTBEAT),
        ControlFrame::disconnect_heartbeat(HEARTBEAT),
        ControlFrame::connect_event(
            ENDPOINT,
            EVENT,
            SocketOptions {
                hwm: i32::MAX,
                rate: i32::MIN,
                ivl: 0,
            },
        ),
        ControlFrame::disconnect_event(EVENT),
    ];

    for frame in frames {
        let structure = decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(structure.command, frame.command);

        let strings: Vec<String> = structure
            .end_point
            .iter()
            .chain(structure.event_name.iter())
            .cloned()
            .collect();
        assert_eq!(strings, frame.strings, "strings of {}", frame.command);

        if frame.command == Command::ConnectEvent {
            assert_eq!(vec![structure.hwm, structure.rate, structure.ivl], frame.ints);
        } else {
            assert!(frame.ints.is_empty());
        }
    }
}

#[test]
fn test_encoded_size() {
    let frame = encode(Command::ConnectEvent, &[ENDPOINT, EVENT], &[1, 2, 3]).unwrap();
    assert_eq!(frame.len(), 1 + ENDPOINT.len() + 1 + EVENT.len() + 1 + 12);
}

#[test]
fn test_int_codec_extremes() {
    for value in [0, 1, -1, 255, 256, -256, i32::MIN, i32::MAX] {
        assert_eq!(decode_int(encode_int(value)), value);
    }
    assert_eq!(encode_int(1), [1, 0, 0, 0]);
    assert_eq!(encode_int(-1), [0xff; 4]);
}

#[test]
fn test_int_codec_random() {
    let mut rng = rand::rng();
    for _ in 0..1000 {
        let value: i32 = rng.random();
        assert_eq!(decode_int(encode_int(value)), value);
    }
}

#[test]
fn test_empty_string_is_malformed() {
    // DISCONNECT_EVENT whose string segment is empty
    let result = decode(&[Command::DisconnectEvent.code(), 0]);
    match result {
        Err(Error::MalformedFrame { details, .. }) => assert_eq!(details, "String not found"),
        other => panic!("Expected MalformedFrame, got {:?}", other),
    }

    // and with nothing at all after the command byte
    assert!(matches!(
        decode(&[Command::DisconnectEvent.code()]),
        Err(Error::MalformedFrame { .. })
    ));
}

#[test]
fn test_unknown_command() {
    let result = decode(&[99, b'x', 0]);
    assert!(matches!(
        result,
        Err(Error::UnsupportedCommand { code: 99, .. })
    ));
}

#[test]
fn test_end_ignores_trailing_bytes() {
    let structure = decode(&[0, 1, 2, 3]).unwrap();
    assert_eq!(structure.command, Command::End);
    assert_eq!(structure.event_name, None);
}

#[test]
fn test_utf8_strings_survive() {
    let name = "tango://hôte:10000/a/b/c.heartbeat";
    let frame = ControlFrame::disconnect_heartbeat(name).encode().unwrap();
    assert_eq!(decode(&frame).unwrap().event_name.as_deref(), Some(name));
}

#[test]
fn test_command_display() {
    assert_eq!(Command::ConnectEvent.to_string(), "ZMQ_CONNECT_EVENT");
    assert_eq!(Command::End.to_string(), "ZMQ_END");
}
