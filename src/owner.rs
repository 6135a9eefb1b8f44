//! The owner of the transport sockets.
//!
//! Transport sockets are not safe for concurrent use, so a single dedicated
//! thread owns them. It serves control frames from the control address one
//! at a time, and delivers inbound event messages to a callback. No other
//! thread touches the transport.

use crate::codec::{self, Command, ControlFrame, ControlStructure};
use crate::config::ControlConfig;
use crate::context::{Context, ControlRequest};
use crate::control::ControlChannel;
use crate::error::{Error, Result};
use crate::naming::{event_type_of, EventType};
use crate::payload::{PayloadDecoder, PayloadKind, StructuredDecoder, StructuredValue};
use crate::types::SocketOptions;
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Event message received from a publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    /// Full event or heartbeat name.
    pub name: String,
    /// Raw payload, alignment padding included.
    pub payload: Vec<u8>,
    /// Byte order announced by the publisher.
    pub little_endian: bool,
}

impl EventMessage {
    /// Creates an event message.
    pub fn new(name: impl Into<String>, payload: Vec<u8>, little_endian: bool) -> Self {
        Self {
            name: name.into(),
            payload,
            little_endian,
        }
    }

    /// Returns true if this is a heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        self.name.ends_with(".heartbeat")
    }

    /// Returns the event type encoded in the name.
    pub fn event_type(&self) -> Result<EventType> {
        event_type_of(&self.name)
    }

    /// Returns the kind of structured payload this event carries.
    pub fn payload_kind(&self) -> Result<PayloadKind> {
        match self.event_type()? {
            EventType::AttrConf => Ok(PayloadKind::AttributeConfig),
            EventType::DataReady => Ok(PayloadKind::DataReady),
            EventType::IntrChange | EventType::Pipe => Err(Error::ConversionFailed {
                operation: "payload_kind",
                details: format!("no structured payload for {}", self.name),
            }),
            _ => Ok(PayloadKind::AttributeValue),
        }
    }

    /// Decodes the payload according to the event type.
    pub fn decode_with<D: StructuredDecoder>(
        &self,
        decoder: &PayloadDecoder<D>,
    ) -> Result<StructuredValue<D>> {
        decoder.decode(&self.payload, self.little_endian, self.payload_kind()?)
    }
}

/// Callback function type for receiving event messages.
pub type EventCallback = Box<dyn Fn(EventMessage) + Send + 'static>;

/// The transport sockets driven by the owner loop.
///
/// Implementations are moved into the owner thread and only ever used from
/// there.
pub trait EventTransport: Send + 'static {
    /// Connects to `endpoint` and subscribes to `heartbeat_name`.
    fn connect_heartbeat(&mut self, endpoint: &str, heartbeat_name: &str) -> Result<()>;

    /// Unsubscribes from `heartbeat_name`.
    fn disconnect_heartbeat(&mut self, heartbeat_name: &str) -> Result<()>;

    /// Connects to `endpoint` and subscribes to `event_name`.
    fn connect_event(&mut self, endpoint: &str, event_name: &str, options: SocketOptions) -> Result<()>;

    /// Unsubscribes from `event_name`.
    fn disconnect_event(&mut self, event_name: &str) -> Result<()>;

    /// Hands over the stream of received messages, if the transport has one.
    ///
    /// Called once, when the owner loop starts.
    fn inbound(&mut self) -> Option<Receiver<EventMessage>> {
        None
    }

    /// Returns true if a received message named `name` should be delivered.
    fn accepts(&self, _name: &str) -> bool {
        true
    }
}

/// Subscription bookkeeping of a subscriber socket pair.
///
/// Publisher endpoints stay connected while at least one heartbeat or event
/// subscription uses them. Heartbeats are shared by every device of an
/// administrative peer: connecting one again from the same endpoint only
/// counts one more user, and it is unsubscribed when the last user
/// disconnects. Only messages whose name is subscribed are accepted.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    endpoints: HashMap<String, usize>,
    heartbeats: HashMap<String, Heartbeat>,
    events: HashMap<String, (String, SocketOptions)>,
    inbound: Option<Receiver<EventMessage>>,
}

#[derive(Debug)]
struct Heartbeat {
    endpoint: String,
    users: usize,
}

impl SubscriptionTable {
    /// Creates an empty table without inbound messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table and the sender feeding its inbound messages.
    pub fn with_inbound() -> (Self, Sender<EventMessage>) {
        let (tx, rx) = channel::unbounded();
        let table = Self {
            inbound: Some(rx),
            ..Self::default()
        };
        (table, tx)
    }

    /// Returns true if `endpoint` is connected.
    pub fn is_connected(&self, endpoint: &str) -> bool {
        self.endpoints.contains_key(endpoint)
    }

    /// Returns the endpoint a heartbeat is received from.
    pub fn heartbeat_endpoint(&self, heartbeat_name: &str) -> Option<&str> {
        self.heartbeats
            .get(heartbeat_name)
            .map(|heartbeat| heartbeat.endpoint.as_str())
    }

    /// Returns how many connects of `heartbeat_name` are not yet disconnected.
    pub fn heartbeat_users(&self, heartbeat_name: &str) -> usize {
        self.heartbeats
            .get(heartbeat_name)
            .map_or(0, |heartbeat| heartbeat.users)
    }

    /// Returns the socket options of an event subscription.
    pub fn event_options(&self, event_name: &str) -> Option<SocketOptions> {
        self.events.get(event_name).map(|(_, options)| *options)
    }

    /// Returns the number of heartbeat and event subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.heartbeats.len() + self.events.len()
    }

    fn attach(&mut self, endpoint: &str) {
        let users = self.endpoints.entry(endpoint.to_string()).or_insert(0);
        if *users == 0 {
            log::debug!("connecting to {}", endpoint);
        }
        *users += 1;
    }

    fn detach(&mut self, endpoint: &str) {
        if let Some(users) = self.endpoints.get_mut(endpoint) {
            *users -= 1;
            if *users == 0 {
                self.endpoints.remove(endpoint);
                log::debug!("disconnected from {}", endpoint);
            }
        }
    }
}

fn already_subscribed(operation: &'static str, name: &str) -> Error {
    Error::Transport {
        operation,
        details: format!("already subscribed to {}", name),
    }
}

fn not_subscribed(operation: &'static str, name: &str) -> Error {
    Error::Transport {
        operation,
        details: format!("not subscribed to {}", name),
    }
}

impl EventTransport for SubscriptionTable {
    fn connect_heartbeat(&mut self, endpoint: &str, heartbeat_name: &str) -> Result<()> {
        if let Some(heartbeat) = self.heartbeats.get_mut(heartbeat_name) {
            if heartbeat.endpoint != endpoint {
                return Err(Error::Transport {
                    operation: "connect_heartbeat",
                    details: format!(
                        "{} is already received from {}",
                        heartbeat_name, heartbeat.endpoint
                    ),
                });
            }
            heartbeat.users += 1;
            log::trace!("{} now has {} users", heartbeat_name, heartbeat.users);
            return Ok(());
        }
        self.attach(endpoint);
        self.heartbeats.insert(
            heartbeat_name.to_string(),
            Heartbeat {
                endpoint: endpoint.to_string(),
                users: 1,
            },
        );
        Ok(())
    }

    fn disconnect_heartbeat(&mut self, heartbeat_name: &str) -> Result<()> {
        let heartbeat = self
            .heartbeats
            .get_mut(heartbeat_name)
            .ok_or_else(|| not_subscribed("disconnect_heartbeat", heartbeat_name))?;
        heartbeat.users -= 1;
        if heartbeat.users > 0 {
            return Ok(());
        }
        if let Some(heartbeat) = self.heartbeats.remove(heartbeat_name) {
            self.detach(&heartbeat.endpoint);
        }
        Ok(())
    }

    fn connect_event(&mut self, endpoint: &str, event_name: &str, options: SocketOptions) -> Result<()> {
        if self.events.contains_key(event_name) {
            return Err(already_subscribed("connect_event", event_name));
        }
        self.attach(endpoint);
        self.events
            .insert(event_name.to_string(), (endpoint.to_string(), options));
        Ok(())
    }

    fn disconnect_event(&mut self, event_name: &str) -> Result<()> {
        let (endpoint, _) = self
            .events
            .remove(event_name)
            .ok_or_else(|| not_subscribed("disconnect_event", event_name))?;
        self.detach(&endpoint);
        Ok(())
    }

    fn inbound(&mut self) -> Option<Receiver<EventMessage>> {
        self.inbound.take()
    }

    fn accepts(&self, name: &str) -> bool {
        self.heartbeats.contains_key(name) || self.events.contains_key(name)
    }
}

/// Handle on the owner thread.
///
/// Dropping the handle stops the loop: the control address is unbound and
/// requests not yet taken by the owner fail with
/// [`Error::InternalCommunication`].
pub struct Owner {
    context: Arc<Context>,
    channel: ControlChannel,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Owner {
    /// Binds the control address of `config` and starts the owner thread.
    ///
    /// Fails if another owner is already bound to that address.
    pub fn spawn<T: EventTransport>(
        context: Arc<Context>,
        config: &ControlConfig,
        transport: T,
        callback: Option<EventCallback>,
    ) -> Result<Self> {
        let control = context.bind(&config.address)?;
        let (stop_tx, stop_rx) = channel::bounded(0);

        let address = config.address.clone();
        let handle = thread::Builder::new()
            .name("tango-event-owner".to_string())
            .spawn(move || run(transport, control, stop_rx, callback, &address));
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                context.unbind(&config.address);
                return Err(Error::InternalCommunication {
                    operation: "spawn",
                    details: e.to_string(),
                });
            }
        };

        Ok(Self {
            channel: ControlChannel::new(Arc::clone(&context), config.clone()),
            context,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Returns true while the owner loop is running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the owner loop with an `END` frame and waits for the thread.
    pub fn shutdown(mut self) -> Result<()> {
        let result = ControlFrame::end()
            .encode()
            .and_then(|frame| self.channel.send(frame));
        self.stop_and_join();
        result
    }

    fn stop_and_join(&mut self) {
        self.context.unbind(&self.channel.config().address);
        // Dropping the sender wakes the loop.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("owner thread panicked");
            }
        }
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl std::fmt::Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Owner")
            .field("address", &self.channel.config().address)
            .field("running", &self.is_running())
            .finish()
    }
}

enum Step {
    Stop,
    Control(Option<ControlRequest>),
    Inbound(Option<EventMessage>),
}

fn run<T: EventTransport>(
    mut transport: T,
    control: Receiver<ControlRequest>,
    stop: Receiver<()>,
    callback: Option<EventCallback>,
    address: &str,
) {
    log::info!("event owner started on {}", address);
    let mut inbound = transport.inbound().unwrap_or_else(channel::never);

    loop {
        let step = select! {
            recv(stop) -> _ => Step::Stop,
            recv(control) -> request => Step::Control(request.ok()),
            recv(inbound) -> message => Step::Inbound(message.ok()),
        };

        match step {
            Step::Stop | Step::Control(None) => break,
            Step::Control(Some(request)) => {
                let (reply, end) = dispatch(&mut transport, &request.frame);
                if request.reply.send(reply).is_err() {
                    log::warn!("caller left before the reply was sent");
                }
                if end {
                    break;
                }
            }
            Step::Inbound(Some(message)) => deliver(&transport, callback.as_ref(), message),
            Step::Inbound(None) => inbound = channel::never(),
        }
    }

    log::info!("event owner on {} stopped", address);
}

/// Applies one frame and returns the reply plus whether the loop must stop.
fn dispatch<T: EventTransport>(transport: &mut T, frame: &[u8]) -> (Vec<u8>, bool) {
    let result = codec::decode(frame).and_then(|structure| {
        log::debug!("owner received {}", structure);
        apply(transport, &structure).map(|()| structure.command == Command::End)
    });
    match result {
        Ok(end) => (Vec::new(), end),
        Err(e) => {
            log::warn!("control frame failed: {}", e);
            (e.to_string().into_bytes(), false)
        }
    }
}

fn apply<T: EventTransport>(transport: &mut T, structure: &ControlStructure) -> Result<()> {
    let name = || required(&structure.event_name, "eventName");
    let endpoint = || required(&structure.end_point, "endPoint");

    match structure.command {
        Command::End => Ok(()),
        Command::ConnectHeartbeat => transport.connect_heartbeat(endpoint()?, name()?),
        Command::DisconnectHeartbeat => transport.disconnect_heartbeat(name()?),
        Command::ConnectEvent => {
            transport.connect_event(endpoint()?, name()?, structure.socket_options())
        }
        Command::DisconnectEvent => transport.disconnect_event(name()?),
    }
}

fn required<'a>(field: &'a Option<String>, what: &str) -> Result<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| Error::malformed("dispatch", format!("{} missing", what)))
}

fn deliver<T: EventTransport>(transport: &T, callback: Option<&EventCallback>, message: EventMessage) {
    if !transport.accepts(&message.name) {
        log::trace!("dropping unsubscribed message {}", message.name);
        return;
    }
    match callback {
        Some(callback) => callback(message),
        None => log::trace!("no callback for {}", message.name),
    }
}
