//! Tests for event payload decoding

use std::sync::Arc;
use std::thread;
use tango_events::payload::{DecodeError, ALIGNMENT_PADDING};
use tango_events::{Error, EventMessage, PayloadDecoder, PayloadKind, StructuredDecoder, StructuredValue};

/// Reads a single 32-bit counter in the announced byte order.
#[derive(Debug, Default)]
struct CounterDecoder;

#[derive(Debug, PartialEq)]
struct DataReady {
    ctr: i32,
}

fn read_i32(bytes: &[u8], little_endian: bool) -> Result<i32, DecodeError> {
    let raw: [u8; 4] = bytes
        .get(..4)
        .ok_or("need 4 bytes")?
        .try_into()
        .map_err(|_| "need 4 bytes")?;
    Ok(if little_endian {
        i32::from_le_bytes(raw)
    } else {
        i32::from_be_bytes(raw)
    })
}

impl StructuredDecoder for CounterDecoder {
    type AttributeValue = i32;
    type AttributeConfig = String;
    type DataReady = DataReady;

    fn decode_attribute_value(&self, bytes: &[u8], little_endian: bool) -> Result<i32, DecodeError> {
        read_i32(bytes, little_endian)
    }

    fn decode_attribute_config(&self, bytes: &[u8], _little_endian: bool) -> Result<String, DecodeError> {
        Ok(std::str::from_utf8(bytes)?.to_string())
    }

    fn decode_data_ready(&self, bytes: &[u8], little_endian: bool) -> Result<DataReady, DecodeError> {
        Ok(DataReady {
            ctr: read_i32(bytes, little_endian)?,
        })
    }
}

fn padded(body: &[u8]) -> Vec<u8> {
    let mut raw = vec![0xAA; ALIGNMENT_PADDING];
    raw.extend_from_slice(body);
    raw
}

#[test]
fn test_attribute_value_little_endian() {
    let decoder = PayloadDecoder::new(CounterDecoder);
    let value = decoder
        .decode(&padded(&[1, 0, 0, 0]), true, PayloadKind::AttributeValue)
        .unwrap();
    assert!(matches!(value, StructuredValue::AttributeValue(1)));
}

#[test]
fn test_attribute_value_big_endian() {
    let decoder = PayloadDecoder::new(CounterDecoder);
    let value = decoder
        .decode(&padded(&[0, 0, 0, 1]), false, PayloadKind::AttributeValue)
        .unwrap();
    assert!(matches!(value, StructuredValue::AttributeValue(1)));
}

#[test]
fn test_padding_never_reaches_decoder() {
    let decoder = PayloadDecoder::new(CounterDecoder);
    match decoder.decode(&padded(b"abs_change"), true, PayloadKind::AttributeConfig) {
        Ok(StructuredValue::AttributeConfig(text)) => assert_eq!(text, "abs_change"),
        other => panic!("Expected AttributeConfig, got {:?}", other),
    }
}

#[test]
fn test_decoder_failure_is_conversion_failed() {
    let decoder = PayloadDecoder::new(CounterDecoder);
    let result = decoder.decode(&padded(&[1, 2]), true, PayloadKind::DataReady);
    match result {
        Err(Error::ConversionFailed { operation, details }) => {
            assert_eq!(operation, "decode_data_ready");
            assert!(details.contains("need 4 bytes"));
        }
        other => panic!("Expected ConversionFailed, got {:?}", other),
    }
}

#[test]
fn test_payload_shorter_than_padding() {
    let decoder = PayloadDecoder::new(CounterDecoder);
    let result = decoder.decode(&[0, 0, 0], true, PayloadKind::AttributeValue);
    assert!(matches!(result, Err(Error::ConversionFailed { .. })));
}

#[test]
fn test_event_message_decodes_by_event_type() {
    let decoder = PayloadDecoder::new(CounterDecoder);

    let message = EventMessage::new(
        "tango://myhost:10000/sys/tg_test/1/double_scalar.data_ready",
        padded(&[7, 0, 0, 0]),
        true,
    );
    match message.decode_with(&decoder) {
        Ok(StructuredValue::DataReady(ready)) => assert_eq!(ready, DataReady { ctr: 7 }),
        other => panic!("Expected DataReady, got {:?}", other),
    }

    let message = EventMessage::new(
        "tango://myhost:10000/sys/tg_test/1/double_scalar.bogus",
        padded(&[7, 0, 0, 0]),
        true,
    );
    assert!(matches!(
        message.decode_with(&decoder),
        Err(Error::UnknownEventType { .. })
    ));
}

#[test]
fn test_decoder_shared_between_threads() {
    let decoder = Arc::new(PayloadDecoder::new(CounterDecoder));
    let handles: Vec<_> = (0..8)
        .map(|i: i32| {
            let decoder = Arc::clone(&decoder);
            thread::spawn(move || {
                for n in 0..100 {
                    let value = i * 1000 + n;
                    let raw = padded(&value.to_le_bytes());
                    match decoder.decode(&raw, true, PayloadKind::AttributeValue) {
                        Ok(StructuredValue::AttributeValue(v)) => assert_eq!(v, value),
                        other => panic!("unexpected {:?}", other),
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
