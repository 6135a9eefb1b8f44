//! Error types for the event control protocol.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for control protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur when building, sending or decoding control
/// frames and event payloads.
///
/// Every variant records the operation that raised it, see
/// [`Error::operation`]. None of them are retried by this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A control frame could not be encoded.
    #[error("Failed to encode control frame in {operation}: {details}")]
    Encoding {
        /// The operation that failed
        operation: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// A control frame is structurally invalid (e.g. an empty string field).
    #[error("Bad syntax in control buffer ({details})")]
    MalformedFrame {
        /// The operation that failed
        operation: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// The command byte of a control frame is not a known command.
    #[error("Command {code} NOT yet implemented")]
    UnsupportedCommand {
        /// The operation that failed
        operation: &'static str,
        /// The unrecognized command byte
        code: u8,
    },

    /// The event type suffix of a full event name is not in the event table.
    #[error("Cannot find event type for {name}")]
    UnknownEventType {
        /// The operation that failed
        operation: &'static str,
        /// The full event name that was inspected
        name: String,
    },

    /// The Tango database host could not be resolved.
    #[error("Cannot resolve TANGO_HOST: {details}")]
    HostUnresolved {
        /// The operation that failed
        operation: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// Building a frame or decoding a payload failed.
    #[error("Conversion failed in {operation}: {details}")]
    ConversionFailed {
        /// The operation that failed
        operation: &'static str,
        /// The original error text
        details: String,
    },

    /// The owner replied with an error, or could not be reached.
    #[error("Internal communication error in {operation}: {details}")]
    InternalCommunication {
        /// The operation that failed
        operation: &'static str,
        /// The reply text or the reason the owner was unreachable
        details: String,
    },

    /// The owner's transport rejected a subscription change.
    #[error("Transport error in {operation}: {details}")]
    Transport {
        /// The operation that failed
        operation: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// A control round trip did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that failed
        operation: &'static str,
        /// The bound that was exceeded
        after: Duration,
    },
}

impl Error {
    /// Returns the name of the operation that raised this error.
    pub fn operation(&self) -> &'static str {
        match self {
            Error::Encoding { operation, .. }
            | Error::MalformedFrame { operation, .. }
            | Error::UnsupportedCommand { operation, .. }
            | Error::UnknownEventType { operation, .. }
            | Error::HostUnresolved { operation, .. }
            | Error::ConversionFailed { operation, .. }
            | Error::InternalCommunication { operation, .. }
            | Error::Transport { operation, .. }
            | Error::Timeout { operation, .. } => operation,
        }
    }

    /// Returns the Tango reason code this error maps to.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Encoding { .. } => "API_ConversionFailed",
            Error::MalformedFrame { .. } => "API_BadSyntax",
            Error::UnsupportedCommand { .. } => "API_NotImplemented",
            Error::UnknownEventType { .. } => "API_BadParameterException",
            Error::HostUnresolved { .. } => "API_TangoHostNotSet",
            Error::ConversionFailed { .. } => "API_ConversionFailed",
            Error::InternalCommunication { .. } => "API_InternalCommunicationError",
            Error::Transport { .. } => "API_ZmqFailed",
            Error::Timeout { .. } => "API_DeviceTimedOut",
        }
    }

    /// Wraps any error as [`Error::ConversionFailed`] for `operation`.
    ///
    /// A `ConversionFailed` error is returned as is.
    pub(crate) fn conversion(operation: &'static str, err: Error) -> Error {
        match err {
            Error::ConversionFailed { .. } => err,
            other => Error::ConversionFailed {
                operation,
                details: other.to_string(),
            },
        }
    }

    pub(crate) fn malformed(operation: &'static str, details: impl Into<String>) -> Error {
        Error::MalformedFrame {
            operation,
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_wraps_message_and_operation() {
        let err = Error::conversion(
            "connect_event",
            Error::HostUnresolved {
                operation: "TangoHost::full_tango_host",
                details: "TANGO_HOST is not set".to_string(),
            },
        );
        match &err {
            Error::ConversionFailed { operation, details } => {
                assert_eq!(*operation, "connect_event");
                assert!(details.contains("TANGO_HOST is not set"));
            }
            other => panic!("Expected ConversionFailed, got {:?}", other),
        }
        assert_eq!(err.reason(), "API_ConversionFailed");
    }

    #[test]
    fn test_conversion_is_not_nested() {
        let inner = Error::ConversionFailed {
            operation: "decode",
            details: "bad".to_string(),
        };
        let err = Error::conversion("connect_event", inner);
        assert_eq!(err.operation(), "decode");
    }

    #[test]
    fn test_display_of_unsupported_command() {
        let err = Error::UnsupportedCommand {
            operation: "decode",
            code: 99,
        };
        assert_eq!(err.to_string(), "Command 99 NOT yet implemented");
        assert_eq!(err.reason(), "API_NotImplemented");
    }
}
