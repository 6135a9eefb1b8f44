//! Common types for the subscription API.

use crate::error::{Error, Result};

/// Socket options applied to an event subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SocketOptions {
    /// Subscriber high water mark
    pub hwm: i32,
    /// Multicast rate
    pub rate: i32,
    /// Multicast recovery interval
    pub ivl: i32,
}

/// Parameters needed to connect a heartbeat or event subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionParams {
    /// Publisher endpoint (e.g. "tcp://host:5555")
    pub endpoint: String,
    /// Subscriber high water mark
    pub high_water_mark: i32,
    /// Multicast rate
    pub rate: i32,
    /// Multicast recovery interval
    pub interval: i32,
}

impl SubscriptionParams {
    /// Creates subscription parameters.
    pub fn new(endpoint: impl Into<String>, high_water_mark: i32, rate: i32, interval: i32) -> Self {
        Self {
            endpoint: endpoint.into(),
            high_water_mark,
            rate,
            interval,
        }
    }

    /// Returns the socket options part of the parameters.
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            hwm: self.high_water_mark,
            rate: self.rate,
            ivl: self.interval,
        }
    }
}

/// Reply of an administrative peer to an event subscription change request.
///
/// `svalue[0]` is the heartbeat publisher endpoint, `svalue[1]` the event
/// publisher endpoint; `lvalue[2..=4]` hold the high water mark, rate and
/// recovery interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSubscriptionInfo {
    /// Integer part of the reply
    pub lvalue: Vec<i32>,
    /// String part of the reply
    pub svalue: Vec<String>,
}

const HEARTBEAT_ENDPOINT: usize = 0;
const EVENT_ENDPOINT: usize = 1;
const SUB_HWM: usize = 2;
const RATE: usize = 3;
const IVL: usize = 4;

impl EventSubscriptionInfo {
    /// Creates a reply from its integer and string parts.
    pub fn new(lvalue: Vec<i32>, svalue: Vec<String>) -> Self {
        Self { lvalue, svalue }
    }

    /// Parameters to connect the administrative peer's heartbeat.
    ///
    /// Only the endpoint is required; missing integers read as 0.
    pub fn heartbeat_params(&self) -> Result<SubscriptionParams> {
        let int_or_zero = |index: usize| self.lvalue.get(index).copied().unwrap_or(0);
        Ok(SubscriptionParams {
            endpoint: self.string_at(HEARTBEAT_ENDPOINT, "heartbeat_params")?,
            high_water_mark: int_or_zero(SUB_HWM),
            rate: int_or_zero(RATE),
            interval: int_or_zero(IVL),
        })
    }

    /// Parameters to connect the event itself.
    pub fn event_params(&self) -> Result<SubscriptionParams> {
        const OPERATION: &str = "event_params";
        let int_at = |index: usize| {
            self.lvalue.get(index).copied().ok_or_else(|| Error::ConversionFailed {
                operation: OPERATION,
                details: format!(
                    "subscription reply has {} integers, index {} missing",
                    self.lvalue.len(),
                    index
                ),
            })
        };

        Ok(SubscriptionParams {
            endpoint: self.string_at(EVENT_ENDPOINT, OPERATION)?,
            high_water_mark: int_at(SUB_HWM)?,
            rate: int_at(RATE)?,
            interval: int_at(IVL)?,
        })
    }

    fn string_at(&self, index: usize, operation: &'static str) -> Result<String> {
        self.svalue.get(index).cloned().ok_or_else(|| Error::ConversionFailed {
            operation,
            details: format!(
                "subscription reply has {} strings, index {} missing",
                self.svalue.len(),
                index
            ),
        })
    }
}
