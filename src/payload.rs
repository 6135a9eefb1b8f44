//! Event payload decoding.
//!
//! Publishers built on a non-native marshaling layer prepend
//! [`ALIGNMENT_PADDING`] bytes to every event payload. [`PayloadDecoder`]
//! strips them and hands the rest to a [`StructuredDecoder`], which knows the
//! binary layout of each payload kind.

use crate::error::{Error, Result};

/// Number of padding bytes in front of every event payload.
pub const ALIGNMENT_PADDING: usize = 4;

/// Error type returned by [`StructuredDecoder`] implementations.
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

/// Kinds of structured event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// An attribute value (change, periodic, archive, user events...)
    AttributeValue,
    /// An attribute configuration (attr_conf events)
    AttributeConfig,
    /// A data ready notice (data_ready events)
    DataReady,
}

impl PayloadKind {
    fn operation(&self) -> &'static str {
        match self {
            PayloadKind::AttributeValue => "decode_attribute_value",
            PayloadKind::AttributeConfig => "decode_attribute_config",
            PayloadKind::DataReady => "decode_data_ready",
        }
    }
}

/// Decodes the binary layout of structured payloads.
///
/// Implementations receive the payload with the alignment padding already
/// removed, and the byte order announced by the publisher.
pub trait StructuredDecoder: Send + Sync {
    /// Decoded attribute value
    type AttributeValue;
    /// Decoded attribute configuration
    type AttributeConfig;
    /// Decoded data ready notice
    type DataReady;

    /// Decodes an attribute value.
    fn decode_attribute_value(
        &self,
        bytes: &[u8],
        little_endian: bool,
    ) -> std::result::Result<Self::AttributeValue, DecodeError>;

    /// Decodes an attribute configuration.
    fn decode_attribute_config(
        &self,
        bytes: &[u8],
        little_endian: bool,
    ) -> std::result::Result<Self::AttributeConfig, DecodeError>;

    /// Decodes a data ready notice.
    fn decode_data_ready(
        &self,
        bytes: &[u8],
        little_endian: bool,
    ) -> std::result::Result<Self::DataReady, DecodeError>;
}

/// A decoded payload.
pub enum StructuredValue<D: StructuredDecoder + ?Sized> {
    /// An attribute value
    AttributeValue(D::AttributeValue),
    /// An attribute configuration
    AttributeConfig(D::AttributeConfig),
    /// A data ready notice
    DataReady(D::DataReady),
}

impl<D: StructuredDecoder + ?Sized> StructuredValue<D> {
    /// Returns the kind of this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            StructuredValue::AttributeValue(_) => PayloadKind::AttributeValue,
            StructuredValue::AttributeConfig(_) => PayloadKind::AttributeConfig,
            StructuredValue::DataReady(_) => PayloadKind::DataReady,
        }
    }
}

impl<D> std::fmt::Debug for StructuredValue<D>
where
    D: StructuredDecoder + ?Sized,
    D::AttributeValue: std::fmt::Debug,
    D::AttributeConfig: std::fmt::Debug,
    D::DataReady: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuredValue::AttributeValue(v) => f.debug_tuple("AttributeValue").field(v).finish(),
            StructuredValue::AttributeConfig(v) => {
                f.debug_tuple("AttributeConfig").field(v).finish()
            }
            StructuredValue::DataReady(v) => f.debug_tuple("DataReady").field(v).finish(),
        }
    }
}

/// Strips the alignment padding from event payloads and decodes them.
///
/// Holds no mutable state; one decoder can be shared across threads.
///
/// # Example
///
/// ```
/// use tango_events::payload::{DecodeError, PayloadDecoder, PayloadKind, StructuredDecoder, StructuredValue};
///
/// struct Raw;
///
/// impl StructuredDecoder for Raw {
///     type AttributeValue = Vec<u8>;
///     type AttributeConfig = Vec<u8>;
///     type DataReady = Vec<u8>;
///
///     fn decode_attribute_value(&self, b: &[u8], _: bool) -> Result<Vec<u8>, DecodeError> { Ok(b.to_vec()) }
///     fn decode_attribute_config(&self, b: &[u8], _: bool) -> Result<Vec<u8>, DecodeError> { Ok(b.to_vec()) }
///     fn decode_data_ready(&self, b: &[u8], _: bool) -> Result<Vec<u8>, DecodeError> { Ok(b.to_vec()) }
/// }
///
/// let decoder = PayloadDecoder::new(Raw);
/// match decoder.decode(&[0, 0, 0, 0, 7, 8], true, PayloadKind::DataReady)? {
///     StructuredValue::DataReady(bytes) => assert_eq!(bytes, vec![7, 8]),
///     _ => unreachable!(),
/// }
/// # Ok::<(), tango_events::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PayloadDecoder<D> {
    decoder: D,
}

impl<D: StructuredDecoder> PayloadDecoder<D> {
    /// Creates a payload decoder on top of `decoder`.
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }

    /// Returns the underlying structured decoder.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Decodes a raw event payload of the given kind.
    ///
    /// Any failure, including a payload shorter than the padding, is reported
    /// as [`Error::ConversionFailed`] carrying the original error text.
    pub fn decode(&self, raw: &[u8], little_endian: bool, kind: PayloadKind) -> Result<StructuredValue<D>> {
        let operation = kind.operation();
        let bytes = raw.get(ALIGNMENT_PADDING..).ok_or_else(|| Error::ConversionFailed {
            operation,
            details: format!(
                "payload of {} bytes is shorter than its {} bytes of padding",
                raw.len(),
                ALIGNMENT_PADDING
            ),
        })?;

        let decoded = match kind {
            PayloadKind::AttributeValue => self
                .decoder
                .decode_attribute_value(bytes, little_endian)
                .map(StructuredValue::AttributeValue),
            PayloadKind::AttributeConfig => self
                .decoder
                .decode_attribute_config(bytes, little_endian)
                .map(StructuredValue::AttributeConfig),
            PayloadKind::DataReady => self
                .decoder
                .decode_data_ready(bytes, little_endian)
                .map(StructuredValue::DataReady),
        };

        decoded.map_err(|e| Error::ConversionFailed {
            operation,
            details: format!("An exception {} has been caught", e),
        })
    }
}
