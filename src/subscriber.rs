//! Heartbeat and event subscription changes.

use crate::codec::ControlFrame;
use crate::config::HostResolver;
use crate::control::ControlChannel;
use crate::error::{Error, Result};
use crate::naming::{full_attribute_event_name, full_heartbeat_name, EventType};
use crate::types::{EventSubscriptionInfo, SubscriptionParams};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Action requested from the administrative peer when subscribing.
pub const SUBSCRIBE_ACTION: &str = "subscribe";

/// The administrative peer of a device.
///
/// It hands out the publisher endpoints and socket options of the events of
/// the devices it manages.
pub trait AdminPeer {
    /// Returns the administrative device name (e.g. `dserver/TangoTest/test`).
    fn name(&self) -> &str;

    /// Asks for the subscription info of an event of one of its devices.
    fn event_subscription_change(
        &self,
        device: &str,
        attribute: &str,
        action: &str,
        event: &str,
    ) -> Result<EventSubscriptionInfo>;
}

/// Requests heartbeat and event subscription changes from the owner loop.
///
/// Each operation builds one control frame, sends it over the
/// [`ControlChannel`] and returns once the owner has applied it. Failures
/// while building the frame (including an unresolved Tango host) are
/// reported as [`Error::ConversionFailed`]; failures of the round trip are
/// returned unchanged.
///
/// The manager can be shared between threads; the owner sees the requests
/// one at a time.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tango_events::{
///     Context, ControlChannel, ControlConfig, EventType, Owner, StaticHost, SubscriptionManager,
///     SubscriptionParams, SubscriptionTable,
/// };
///
/// let context = Arc::new(Context::new());
/// let config = ControlConfig::default();
/// let owner = Owner::spawn(Arc::clone(&context), &config, SubscriptionTable::new(), None)?;
///
/// let manager = SubscriptionManager::new(
///     ControlChannel::new(context, config),
///     StaticHost::new("myhost:10000"),
/// );
/// let params = SubscriptionParams::new("tcp://myhost:5556", 1000, 0, 0);
/// manager.connect_event("sys/tg_test/1", "double_scalar", EventType::Change, &params)?;
/// manager.disconnect_event("sys/tg_test/1", "double_scalar", EventType::Change)?;
///
/// owner.shutdown()?;
/// # Ok::<(), tango_events::Error>(())
/// ```
#[derive(Clone)]
pub struct SubscriptionManager {
    channel: ControlChannel,
    resolver: Arc<dyn HostResolver>,
    heartbeats: Arc<Mutex<HashSet<String>>>,
}

impl SubscriptionManager {
    /// Creates a manager sending its frames over `channel`.
    pub fn new(channel: ControlChannel, resolver: impl HostResolver + 'static) -> Self {
        Self {
            channel,
            resolver: Arc::new(resolver),
            heartbeats: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Connects the heartbeat of an administrative device.
    pub fn connect_heartbeat(&self, device: &str, params: &SubscriptionParams) -> Result<()> {
        let frame = self.build("connect_heartbeat", |host| {
            ControlFrame::connect_heartbeat(params.endpoint.as_str(), full_heartbeat_name(device, host))
        })?;
        self.channel.send(frame)?;
        self.connected_heartbeats().insert(device.to_string());
        Ok(())
    }

    /// Disconnects the heartbeat of an administrative device.
    pub fn disconnect_heartbeat(&self, device: &str) -> Result<()> {
        let frame = self.build("disconnect_heartbeat", |host| {
            ControlFrame::disconnect_heartbeat(full_heartbeat_name(device, host))
        })?;
        self.channel.send(frame)?;
        self.connected_heartbeats().remove(device);
        Ok(())
    }

    /// Connects an attribute event.
    pub fn connect_event(
        &self,
        device: &str,
        attribute: &str,
        event: EventType,
        params: &SubscriptionParams,
    ) -> Result<()> {
        let frame = self.build("connect_event", |host| {
            ControlFrame::connect_event(
                params.endpoint.as_str(),
                full_attribute_event_name(device, attribute, event.as_str(), host),
                params.socket_options(),
            )
        })?;
        self.channel.send(frame)
    }

    /// Disconnects an attribute event.
    pub fn disconnect_event(&self, device: &str, attribute: &str, event: EventType) -> Result<()> {
        let frame = self.build("disconnect_event", |host| {
            ControlFrame::disconnect_event(full_attribute_event_name(
                device,
                attribute,
                event.as_str(),
                host,
            ))
        })?;
        self.channel.send(frame)
    }

    /// Subscribes to an event through the device's administrative peer.
    ///
    /// The peer's heartbeat is connected first, unless this manager already
    /// did. Returns the full event name.
    pub fn subscribe<A: AdminPeer + ?Sized>(
        &self,
        admin: &A,
        device: &str,
        attribute: &str,
        event: EventType,
    ) -> Result<String> {
        let info = admin.event_subscription_change(device, attribute, SUBSCRIBE_ACTION, event.as_str())?;

        // The owner counts repeated heartbeat connects, so a connect racing
        // another thread or following a timed out one is harmless.
        if !self.has_heartbeat(admin.name()) {
            self.connect_heartbeat(admin.name(), &info.heartbeat_params()?)?;
        }

        self.connect_event(device, attribute, event, &info.event_params()?)?;
        self.event_name(device, attribute, event)
    }

    /// Unsubscribes from an event. The peer's heartbeat stays connected.
    pub fn unsubscribe(&self, device: &str, attribute: &str, event: EventType) -> Result<()> {
        self.disconnect_event(device, attribute, event)
    }

    /// Returns true if this manager connected the heartbeat of `device`.
    pub fn has_heartbeat(&self, device: &str) -> bool {
        self.connected_heartbeats().contains(device)
    }

    /// Returns the full event name of an attribute event.
    pub fn event_name(&self, device: &str, attribute: &str, event: EventType) -> Result<String> {
        let host = self
            .resolver
            .full_tango_host()
            .map_err(|e| Error::conversion("event_name", e))?;
        Ok(full_attribute_event_name(device, attribute, event.as_str(), &host))
    }

    fn build(&self, operation: &'static str, frame: impl FnOnce(&str) -> ControlFrame) -> Result<Bytes> {
        self.resolver
            .full_tango_host()
            .and_then(|host| frame(&host).encode())
            .map_err(|e| Error::conversion(operation, e))
    }

    fn connected_heartbeats(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.heartbeats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
