//! Control frame encoding and decoding.
//!
//! A control frame is laid out as:
//!
//! ```text
//! +---------+----------------------+-----------------------+
//! | command | string\0 string\0 .. | i32 LE | i32 LE | ..  |
//! | 1 byte  | zero or more         | zero or more, 4 bytes |
//! +---------+----------------------+-----------------------+
//! ```
//!
//! Which strings and integers follow the command byte depends on the command,
//! see [`decode`].

use crate::error::{Error, Result};
use crate::types::SocketOptions;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Control commands understood by the owner loop.
///
/// The discriminant is the byte written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Stops the owner loop
    End = 0,
    /// Connects to a publisher endpoint and subscribes to a heartbeat
    ConnectHeartbeat = 1,
    /// Unsubscribes from a heartbeat
    DisconnectHeartbeat = 2,
    /// Connects to a publisher endpoint and subscribes to an event
    ConnectEvent = 3,
    /// Unsubscribes from an event
    DisconnectEvent = 4,
}

impl Command {
    /// All commands, in wire order.
    pub const ALL: [Command; 5] = [
        Command::End,
        Command::ConnectHeartbeat,
        Command::DisconnectHeartbeat,
        Command::ConnectEvent,
        Command::DisconnectEvent,
    ];

    /// Returns the wire byte of this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns the command name used in traces.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::End => "ZMQ_END",
            Command::ConnectHeartbeat => "ZMQ_CONNECT_HEARTBEAT",
            Command::DisconnectHeartbeat => "ZMQ_DISCONNECT_HEARTBEAT",
            Command::ConnectEvent => "ZMQ_CONNECT_EVENT",
            Command::DisconnectEvent => "ZMQ_DISCONNECT_EVENT",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Command::ALL
            .into_iter()
            .find(|command| command.code() == code)
            .ok_or(Error::UnsupportedCommand {
                operation: "decode",
                code,
            })
    }
}

/// A control frame ready to be encoded.
///
/// Use the named constructors to get a frame whose strings and integers
/// match its command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    /// The command to execute
    pub command: Command,
    /// Strings written after the command byte, in order
    pub strings: Vec<String>,
    /// Integers written after the strings, in order
    pub ints: Vec<i32>,
}

impl ControlFrame {
    /// Frame asking the owner loop to stop.
    pub fn end() -> Self {
        Self {
            command: Command::End,
            strings: Vec::new(),
            ints: Vec::new(),
        }
    }

    /// Frame connecting `endpoint` and subscribing to `heartbeat_name`.
    pub fn connect_heartbeat(endpoint: impl Into<String>, heartbeat_name: impl Into<String>) -> Self {
        Self {
            command: Command::ConnectHeartbeat,
            strings: vec![endpoint.into(), heartbeat_name.into()],
            ints: Vec::new(),
        }
    }

    /// Frame unsubscribing from `heartbeat_name`.
    pub fn disconnect_heartbeat(heartbeat_name: impl Into<String>) -> Self {
        Self {
            command: Command::DisconnectHeartbeat,
            strings: vec![heartbeat_name.into()],
            ints: Vec::new(),
        }
    }

    /// Frame connecting `endpoint` and subscribing to `event_name` with the
    /// given socket options.
    pub fn connect_event(
        endpoint: impl Into<String>,
        event_name: impl Into<String>,
        options: SocketOptions,
    ) -> Self {
        Self {
            command: Command::ConnectEvent,
            strings: vec![endpoint.into(), event_name.into()],
            ints: vec![options.hwm, options.rate, options.ivl],
        }
    }

    /// Frame unsubscribing from `event_name`.
    pub fn disconnect_event(event_name: impl Into<String>) -> Self {
        Self {
            command: Command::DisconnectEvent,
            strings: vec![event_name.into()],
            ints: Vec::new(),
        }
    }

    /// Encodes this frame.
    pub fn encode(&self) -> Result<Bytes> {
        encode(self.command, &self.strings, &self.ints)
    }
}

/// Encodes a control frame.
///
/// The buffer holds exactly `1 + Σ(len(s) + 1) + 4 * len(ints)` bytes.
///
/// # Example
///
/// ```
/// use tango_events::codec::{encode, Command};
///
/// let frame = encode(Command::DisconnectEvent, &["tango://h:1/a/b/c.change"], &[])?;
/// assert_eq!(frame[0], 4);
/// assert_eq!(frame.last(), Some(&0));
/// # Ok::<(), tango_events::Error>(())
/// ```
pub fn encode<S: AsRef<str>>(command: Command, strings: &[S], ints: &[i32]) -> Result<Bytes> {
    let overflow = || Error::Encoding {
        operation: "encode",
        details: "frame size overflows".to_string(),
    };

    let mut size: usize = 1;
    for s in strings {
        let s = s.as_ref();
        if s.as_bytes().contains(&0) {
            return Err(Error::Encoding {
                operation: "encode",
                details: format!("string contains a null byte: {:?}", s),
            });
        }
        size = size
            .checked_add(s.len())
            .and_then(|n| n.checked_add(1))
            .ok_or_else(overflow)?;
    }
    size = ints
        .len()
        .checked_mul(4)
        .and_then(|n| size.checked_add(n))
        .ok_or_else(overflow)?;

    let mut buffer = BytesMut::with_capacity(size);
    buffer.put_u8(command.code());
    for s in strings {
        buffer.put_slice(s.as_ref().as_bytes());
        buffer.put_u8(0);
    }
    for &value in ints {
        buffer.put_slice(&encode_int(value));
    }
    debug_assert_eq!(buffer.len(), size);
    Ok(buffer.freeze())
}

/// Encodes an integer as 4 bytes, least significant byte first.
pub fn encode_int(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Decodes 4 bytes written by [`encode_int`].
pub fn decode_int(bytes: [u8; 4]) -> i32 {
    (&bytes[..]).get_i32_le()
}

/// A decoded control frame.
///
/// Fields a command does not carry are `None` (strings) or `0` (integers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlStructure {
    /// The decoded command
    pub command: Command,
    /// Publisher endpoint, for connect commands
    pub end_point: Option<String>,
    /// Full heartbeat or event name, for every command but `End`
    pub event_name: Option<String>,
    /// Subscriber high water mark
    pub hwm: i32,
    /// Multicast rate
    pub rate: i32,
    /// Multicast recovery interval
    pub ivl: i32,
}

impl ControlStructure {
    fn new(command: Command) -> Self {
        Self {
            command,
            end_point: None,
            event_name: None,
            hwm: 0,
            rate: 0,
            ivl: 0,
        }
    }

    /// Returns the socket options carried by the frame.
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            hwm: self.hwm,
            rate: self.rate,
            ivl: self.ivl,
        }
    }
}

impl std::fmt::Display for ControlStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Command: {}", self.command)?;
        if let Some(end_point) = &self.end_point {
            write!(f, ", endPoint: {}", end_point)?;
        }
        if let Some(event_name) = &self.event_name {
            write!(f, ", eventName: {}", event_name)?;
        }
        write!(f, ", int: {} {} {}", self.hwm, self.rate, self.ivl)
    }
}

/// Decodes a control frame.
///
/// | Command | strings | ints |
/// |---|---|---|
/// | `End` | none | none |
/// | `ConnectHeartbeat` | endpoint, heartbeat name | none |
/// | `DisconnectHeartbeat` | heartbeat name | none |
/// | `ConnectEvent` | endpoint, event name | hwm, rate, ivl |
/// | `DisconnectEvent` | event name | none |
///
/// A string without a terminator runs to the end of the buffer. An empty
/// string is an error.
pub fn decode(bytes: &[u8]) -> Result<ControlStructure> {
    let mut reader = FrameReader::new(bytes);
    let command = Command::try_from(reader.read_command()?)?;
    let mut structure = ControlStructure::new(command);

    match command {
        Command::End => {}
        Command::ConnectHeartbeat => {
            structure.end_point = Some(reader.read_string()?);
            structure.event_name = Some(reader.read_string()?);
        }
        Command::DisconnectHeartbeat | Command::DisconnectEvent => {
            structure.event_name = Some(reader.read_string()?);
        }
        Command::ConnectEvent => {
            structure.end_point = Some(reader.read_string()?);
            structure.event_name = Some(reader.read_string()?);
            structure.hwm = reader.read_int()?;
            structure.rate = reader.read_int()?;
            structure.ivl = reader.read_int()?;
        }
    }

    Ok(structure)
}

struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_command(&mut self) -> Result<u8> {
        let code = *self
            .buf
            .first()
            .ok_or_else(|| Error::malformed("decode", "empty buffer"))?;
        self.pos = 1;
        Ok(code)
    }

    fn read_string(&mut self) -> Result<String> {
        let rest = self.buf.get(self.pos..).unwrap_or_default();
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        if len == 0 {
            return Err(Error::malformed("decode", "String not found"));
        }
        let s = std::str::from_utf8(&rest[..len])
            .map_err(|e| Error::malformed("decode", format!("invalid UTF-8 string: {}", e)))?;
        // Skip the terminator when there is one.
        self.pos = (self.pos + len + 1).min(self.buf.len());
        Ok(s.to_string())
    }

    fn read_int(&mut self) -> Result<i32> {
        let bytes: [u8; 4] = self
            .buf
            .get(self.pos..self.pos + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::malformed("decode", "integer truncated"))?;
        self.pos += 4;
        Ok(decode_int(bytes))
    }
}
