//! Canonical event and heartbeat names.
//!
//! Peers identify subscriptions by full names of the form:
//! - `tango://{host}/{device}/{attribute}.{event_type}` (lowercase)
//! - `tango://{host}/{device}.heartbeat` (case preserved)

use crate::error::{Error, Result};

const SCHEME: &str = "tango://";
const HEARTBEAT_SUFFIX: &str = "heartbeat";

/// Tango event types.
///
/// The order matches the event table shared with peers; [`EventType::index`]
/// is the position in that table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Attribute value changed beyond its thresholds
    Change,
    /// Attribute quality changed
    Quality,
    /// Periodic attribute value
    Periodic,
    /// Archive event
    Archive,
    /// Event pushed by the device code
    User,
    /// Attribute configuration changed
    AttrConf,
    /// Data ready notification
    DataReady,
    /// Device interface changed
    IntrChange,
    /// Pipe event
    Pipe,
}

impl EventType {
    /// The event table, in order.
    pub const ALL: [EventType; 9] = [
        EventType::Change,
        EventType::Quality,
        EventType::Periodic,
        EventType::Archive,
        EventType::User,
        EventType::AttrConf,
        EventType::DataReady,
        EventType::IntrChange,
        EventType::Pipe,
    ];

    /// Returns the name used as suffix of full event names.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Change => "change",
            EventType::Quality => "quality",
            EventType::Periodic => "periodic",
            EventType::Archive => "archive",
            EventType::User => "user_event",
            EventType::AttrConf => "attr_conf",
            EventType::DataReady => "data_ready",
            EventType::IntrChange => "intr_change",
            EventType::Pipe => "pipe",
        }
    }

    /// Returns the position of this type in the event table.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownEventType {
                operation: "EventType::from_str",
                name: s.to_string(),
            })
    }
}

/// Builds the full name of an attribute event.
///
/// The whole name is lowercased.
///
/// ```
/// use tango_events::naming::full_attribute_event_name;
///
/// let name = full_attribute_event_name("sys/tg_test/1", "Double_Scalar", "change", "myhost:10000");
/// assert_eq!(name, "tango://myhost:10000/sys/tg_test/1/double_scalar.change");
/// ```
pub fn full_attribute_event_name(device: &str, attribute: &str, event: &str, host: &str) -> String {
    format!("{}{}/{}/{}.{}", SCHEME, host, device, attribute, event).to_lowercase()
}

/// Builds the full heartbeat name of a device.
///
/// Unlike event names, the case of `device` and `host` is kept.
pub fn full_heartbeat_name(device: &str, host: &str) -> String {
    format!("{}{}/{}.{}", SCHEME, host, device, HEARTBEAT_SUFFIX)
}

/// Returns the event type of a full event name.
///
/// The type is the text after the last `.`; a name without one (or starting
/// with one) has no type.
pub fn event_type_of(full_event_name: &str) -> Result<EventType> {
    let unknown = || Error::UnknownEventType {
        operation: "event_type_of",
        name: full_event_name.to_string(),
    };
    match full_event_name.rfind('.') {
        Some(pos) if pos > 0 => full_event_name[pos + 1..].parse().map_err(|_| unknown()),
        _ => Err(unknown()),
    }
}

/// A parsed full event or heartbeat name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventName {
    /// An attribute event name.
    Event {
        /// The Tango database host (`host:port`)
        host: String,
        /// The device name
        device: String,
        /// The attribute name
        attribute: String,
        /// The event type
        event_type: EventType,
    },
    /// A heartbeat name.
    Heartbeat {
        /// The Tango database host (`host:port`)
        host: String,
        /// The device name
        device: String,
    },
}

impl EventName {
    /// Parses a full event or heartbeat name.
    ///
    /// # Examples
    ///
    /// ```
    /// use tango_events::naming::{EventName, EventType};
    ///
    /// let name = EventName::parse("tango://myhost:10000/sys/tg_test/1/double_scalar.change")?;
    /// assert_eq!(name.device(), "sys/tg_test/1");
    /// assert_eq!(name.event_type(), Some(EventType::Change));
    ///
    /// let name = EventName::parse("tango://myhost:10000/dserver/TangoTest/test.heartbeat")?;
    /// assert!(name.is_heartbeat());
    /// # Ok::<(), tango_events::Error>(())
    /// ```
    pub fn parse(full_name: &str) -> Result<Self> {
        let invalid = |details: &str| Error::ConversionFailed {
            operation: "EventName::parse",
            details: format!("{}: {}", details, full_name),
        };

        let rest = full_name
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid("name must start with 'tango://'"))?;
        let (host, path) = rest
            .split_once('/')
            .ok_or_else(|| invalid("name has no device part"))?;
        let (path, suffix) = path
            .rsplit_once('.')
            .ok_or_else(|| invalid("name has no event suffix"))?;
        if host.is_empty() || path.is_empty() {
            return Err(invalid("name has an empty component"));
        }

        if suffix == HEARTBEAT_SUFFIX {
            return Ok(EventName::Heartbeat {
                host: host.to_string(),
                device: path.to_string(),
            });
        }

        let event_type = event_type_of(full_name)?;
        let (device, attribute) = path
            .rsplit_once('/')
            .ok_or_else(|| invalid("name has no attribute part"))?;
        if device.is_empty() || attribute.is_empty() {
            return Err(invalid("name has an empty component"));
        }

        Ok(EventName::Event {
            host: host.to_string(),
            device: device.to_string(),
            attribute: attribute.to_string(),
            event_type,
        })
    }

    /// Returns the Tango database host.
    pub fn host(&self) -> &str {
        match self {
            EventName::Event { host, .. } | EventName::Heartbeat { host, .. } => host,
        }
    }

    /// Returns the device name.
    pub fn device(&self) -> &str {
        match self {
            EventName::Event { device, .. } | EventName::Heartbeat { device, .. } => device,
        }
    }

    /// Returns the attribute name, if this is an event name.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            EventName::Event { attribute, .. } => Some(attribute),
            EventName::Heartbeat { .. } => None,
        }
    }

    /// Returns the event type, if this is an event name.
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            EventName::Event { event_type, .. } => Some(*event_type),
            EventName::Heartbeat { .. } => None,
        }
    }

    /// Returns true if this is a heartbeat name.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, EventName::Heartbeat { .. })
    }

    /// Converts the parsed name back to its full form.
    pub fn to_full_name(&self) -> String {
        match self {
            EventName::Event {
                host,
                device,
                attribute,
                event_type,
            } => full_attribute_event_name(device, attribute, event_type.as_str(), host),
            EventName::Heartbeat { host, device } => full_heartbeat_name(device, host),
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_full_name())
    }
}
