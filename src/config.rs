//! Control channel configuration and Tango host resolution.

use crate::error::{Error, Result};
use std::time::Duration;

/// Address the owner binds its control endpoint to.
pub const DEFAULT_CONTROL_ADDRESS: &str = "inproc://control";

/// Default bound on a control round trip.
///
/// The owner loop replies immediately after applying a socket operation, so
/// this only trips when the owner is stuck or gone.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_millis(3000);

/// Environment variable overriding [`DEFAULT_CONTROL_TIMEOUT`], in milliseconds.
pub const CONTROL_TIMEOUT_ENV: &str = "TANGO_CONTROL_TIMEOUT_MS";

/// Environment variable holding the Tango database host(s).
pub const TANGO_HOST_ENV: &str = "TANGO_HOST";

/// Configuration of the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    /// In-process address of the owner's control endpoint.
    pub address: String,
    /// Bound on a single control round trip.
    pub timeout: Duration,
}

impl ControlConfig {
    /// Creates a control configuration.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Default configuration, with the timeout taken from
    /// `TANGO_CONTROL_TIMEOUT_MS` when it holds a number of milliseconds.
    pub fn from_env() -> Self {
        let timeout = std::env::var(CONTROL_TIMEOUT_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CONTROL_TIMEOUT);
        Self::default().with_timeout(timeout)
    }

    /// Returns this configuration with another round trip bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_ADDRESS, DEFAULT_CONTROL_TIMEOUT)
    }
}

/// Resolves the Tango database host used in full names.
pub trait HostResolver: Send + Sync {
    /// Returns the database host as `host:port`.
    fn full_tango_host(&self) -> Result<String>;
}

/// Resolves the host from the `TANGO_HOST` environment variable.
///
/// `TANGO_HOST` may list several databases (`host1:port1,host2:port2`); the
/// first one is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct TangoHost;

impl TangoHost {
    /// Parses a `TANGO_HOST` value.
    pub fn parse(value: &str) -> Result<String> {
        let first = value.split(',').next().unwrap_or_default().trim();
        match first.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(first.to_string())
            }
            _ => Err(Error::HostUnresolved {
                operation: "TangoHost::parse",
                details: format!("'{}' is not of the form host:port", value),
            }),
        }
    }
}

impl HostResolver for TangoHost {
    fn full_tango_host(&self) -> Result<String> {
        let value = std::env::var(TANGO_HOST_ENV).map_err(|_| Error::HostUnresolved {
            operation: "TangoHost::full_tango_host",
            details: format!("{} is not set", TANGO_HOST_ENV),
        })?;
        Self::parse(&value)
    }
}

/// A fixed database host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticHost(String);

impl StaticHost {
    /// Creates a resolver always returning `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }
}

impl HostResolver for StaticHost {
    fn full_tango_host(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(Error::HostUnresolved {
                operation: "StaticHost::full_tango_host",
                details: "empty host".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_of_many() {
        assert_eq!(
            TangoHost::parse("db1:10000,db2:10000").unwrap(),
            "db1:10000"
        );
    }

    #[test]
    fn test_parse_requires_port() {
        assert!(matches!(
            TangoHost::parse("db1"),
            Err(Error::HostUnresolved { .. })
        ));
        assert!(TangoHost::parse("db1:port").is_err());
        assert!(TangoHost::parse("").is_err());
        assert!(TangoHost::parse(":10000").is_err());
    }

    #[test]
    fn test_static_host() {
        assert_eq!(StaticHost::new("h:1").full_tango_host().unwrap(), "h:1");
        assert!(StaticHost::new("").full_tango_host().is_err());
    }
}
