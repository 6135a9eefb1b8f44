//! Tests for control channel configuration and host resolution

use std::env;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tango_events::config::{
    CONTROL_TIMEOUT_ENV, DEFAULT_CONTROL_ADDRESS, DEFAULT_CONTROL_TIMEOUT, TANGO_HOST_ENV,
};
use tango_events::{
    Context, ControlChannel, ControlConfig, Error, EventType, HostResolver, StaticHost,
    SubscriptionManager, TangoHost,
};

// Tests touching the process environment run one at a time.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

#[test]
fn test_default_config() {
    let config = ControlConfig::default();
    assert_eq!(config.address, "inproc://control");
    assert_eq!(config.address, DEFAULT_CONTROL_ADDRESS);
    assert_eq!(config.timeout, Duration::from_millis(3000));
    assert_eq!(config.timeout, DEFAULT_CONTROL_TIMEOUT);
}

#[test]
fn test_config_creation() {
    let config = ControlConfig::new("inproc://other", Duration::from_millis(250));
    assert_eq!(config.address, "inproc://other");
    assert_eq!(config.timeout, Duration::from_millis(250));
}

#[test]
fn test_with_timeout() {
    let config = ControlConfig::default().with_timeout(Duration::from_secs(10));
    assert_eq!(config.address, DEFAULT_CONTROL_ADDRESS);
    assert_eq!(config.timeout, Duration::from_secs(10));
}

#[test]
fn test_config_clone() {
    let config1 = ControlConfig::new("inproc://a", Duration::from_millis(5));
    let config2 = config1.clone();
    assert_eq!(config1, config2);
}

#[test]
fn test_tango_host_parse() {
    assert_eq!(TangoHost::parse("myhost:10000").unwrap(), "myhost:10000");
    assert_eq!(
        TangoHost::parse(" db1.esrf.fr:10000,db2.esrf.fr:10000").unwrap(),
        "db1.esrf.fr:10000"
    );
    assert!(matches!(
        TangoHost::parse("myhost"),
        Err(Error::HostUnresolved { .. })
    ));
}

#[test]
fn test_static_host_resolver() {
    let resolver: Box<dyn HostResolver> = Box::new(StaticHost::new("myhost:10000"));
    assert_eq!(resolver.full_tango_host().unwrap(), "myhost:10000");
}

#[test]
fn test_host_unresolved_reason() {
    let err = StaticHost::new("").full_tango_host().unwrap_err();
    assert_eq!(err.operation(), "StaticHost::full_tango_host");
    assert_eq!(err.reason(), "API_TangoHostNotSet");
}

#[test]
fn test_from_env_reads_timeout() {
    let _guard = lock_env();

    env::set_var(CONTROL_TIMEOUT_ENV, "250");
    let config = ControlConfig::from_env();
    assert_eq!(config.timeout, Duration::from_millis(250));
    assert_eq!(config.address, DEFAULT_CONTROL_ADDRESS);

    env::set_var(CONTROL_TIMEOUT_ENV, "soon");
    assert_eq!(ControlConfig::from_env().timeout, DEFAULT_CONTROL_TIMEOUT);

    env::remove_var(CONTROL_TIMEOUT_ENV);
    assert_eq!(ControlConfig::from_env(), ControlConfig::default());
}

#[test]
fn test_tango_host_from_env() {
    let _guard = lock_env();

    env::set_var(TANGO_HOST_ENV, "db1.esrf.fr:10000,db2.esrf.fr:10000");
    assert_eq!(TangoHost.full_tango_host().unwrap(), "db1.esrf.fr:10000");

    env::remove_var(TANGO_HOST_ENV);
    let err = TangoHost.full_tango_host().unwrap_err();
    assert!(matches!(err, Error::HostUnresolved { .. }));
    assert_eq!(err.operation(), "TangoHost::full_tango_host");
}

#[test]
fn test_missing_tango_host_reaches_manager_as_conversion_failed() {
    let _guard = lock_env();
    env::remove_var(TANGO_HOST_ENV);

    // Frame building fails before any owner is needed.
    let channel = ControlChannel::new(Arc::new(Context::new()), ControlConfig::default());
    let manager = SubscriptionManager::new(channel, TangoHost);
    match manager.disconnect_event("sys/tg_test/1", "double_scalar", EventType::Change) {
        Err(Error::ConversionFailed { operation, details }) => {
            assert_eq!(operation, "disconnect_event");
            assert!(details.contains("TANGO_HOST is not set"), "{}", details);
        }
        other => panic!("Expected ConversionFailed, got {:?}", other),
    }
}
