//! Request/reply channel to the owner of the transport sockets.

use crate::config::ControlConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;

const OPERATION: &str = "send_to_control_socket";

/// Sends control frames to the owner loop, one round trip per frame.
///
/// Every call opens its own request endpoint on the control address, sends
/// exactly one frame, waits for exactly one reply and releases the endpoint,
/// so calls from any number of threads reach the owner one at a time. An
/// empty reply means success; anything else is the owner's error text.
///
/// Frames are never retried.
///
/// The wait is bounded by [`ControlConfig::timeout`]. A reply arriving after
/// the bound is discarded by the owner.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    context: Arc<Context>,
    config: ControlConfig,
}

impl ControlChannel {
    /// Creates a control channel on `context`.
    pub fn new(context: Arc<Context>, config: ControlConfig) -> Self {
        Self { context, config }
    }

    /// Returns the channel configuration.
    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Sends one encoded frame and waits for the owner's acknowledgement.
    pub fn send(&self, frame: impl Into<Bytes>) -> Result<()> {
        let frame = frame.into();
        let socket = self
            .context
            .connect(&self.config.address)
            .map_err(|e| Error::InternalCommunication {
                operation: OPERATION,
                details: e.to_string(),
            })?;
        let reply = socket.request(OPERATION, frame, self.config.timeout)?;
        drop(socket);

        if !reply.is_empty() {
            let message = String::from_utf8_lossy(&reply).into_owned();
            log::warn!("control request rejected: {}", message);
            return Err(Error::InternalCommunication {
                operation: OPERATION,
                details: message,
            });
        }
        log::debug!("---> Message sent");
        Ok(())
    }
}
