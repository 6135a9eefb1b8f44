//! Control protocol for Tango event and heartbeat subscriptions.
//!
//! The messaging sockets receiving Tango events are not thread-safe. This
//! library gives them a single owner thread and lets any number of threads
//! change subscriptions by sending small binary control frames to that owner
//! over an in-process request/reply channel.
//!
//! # Features
//!
//! - **Single owner**: only the [`Owner`] thread touches the transport
//! - **Serialized requests**: each [`ControlChannel::send`] is one atomic round trip
//! - **Bounded waits**: round trips fail with [`Error::Timeout`] instead of hanging
//! - **Canonical names**: full event and heartbeat names built bit-for-bit as peers expect
//! - **Pluggable payload decoding**: [`PayloadDecoder`] strips the alignment
//!   padding and defers to a [`StructuredDecoder`]
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`codec`]: Control frame encoding and decoding
//! - [`naming`]: Full event and heartbeat names, event types
//! - [`control`]: The request/reply [`ControlChannel`]
//! - [`owner`]: The [`Owner`] loop and the [`EventTransport`] it drives
//! - [`subscriber`]: The [`SubscriptionManager`] issuing subscription changes
//! - [`payload`]: Event payload decoding
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tango_events::{
//!     Context, ControlChannel, ControlConfig, EventMessage, EventType, Owner, SubscriptionManager,
//!     SubscriptionParams, SubscriptionTable, TangoHost,
//! };
//!
//! # fn main() -> Result<(), tango_events::Error> {
//! let context = Arc::new(Context::new());
//! let config = ControlConfig::from_env();
//!
//! let (table, _publisher) = SubscriptionTable::with_inbound();
//! let owner = Owner::spawn(
//!     Arc::clone(&context),
//!     &config,
//!     table,
//!     Some(Box::new(|msg: EventMessage| {
//!         println!("{}: {} bytes", msg.name, msg.payload.len());
//!     })),
//! )?;
//!
//! let manager = SubscriptionManager::new(ControlChannel::new(context, config), TangoHost);
//! manager.connect_heartbeat(
//!     "dserver/TangoTest/test",
//!     &SubscriptionParams::new("tcp://myhost:5555", 0, 0, 0),
//! )?;
//! manager.connect_event(
//!     "sys/tg_test/1",
//!     "double_scalar",
//!     EventType::Change,
//!     &SubscriptionParams::new("tcp://myhost:5556", 1000, 0, 0),
//! )?;
//!
//! owner.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod naming;
pub mod owner;
pub mod payload;
pub mod subscriber;
pub mod types;

pub use codec::{Command, ControlFrame, ControlStructure};
pub use config::{ControlConfig, HostResolver, StaticHost, TangoHost};
pub use context::Context;
pub use control::ControlChannel;
pub use error::{Error, Result};
pub use naming::{EventName, EventType};
pub use owner::{EventCallback, EventMessage, EventTransport, Owner, SubscriptionTable};
pub use payload::{PayloadDecoder, PayloadKind, StructuredDecoder, StructuredValue};
pub use subscriber::{AdminPeer, SubscriptionManager};
pub use types::{EventSubscriptionInfo, SocketOptions, SubscriptionParams};
