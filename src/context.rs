//! Messaging context and in-process control endpoints.
//!
//! A [`Context`] is created once by the application and shared by `Arc`
//! between the owner loop and every [`ControlChannel`](crate::ControlChannel).
//! The owner binds the control address; callers open a short-lived
//! [`RequestSocket`] on it for each request.

use crate::error::{Error, Result};
use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A control frame in flight, with the channel its reply goes back on.
pub(crate) struct ControlRequest {
    pub(crate) frame: Bytes,
    pub(crate) reply: Sender<Vec<u8>>,
}

/// The messaging context shared by the owner and its callers.
///
/// Each address can be bound by a single owner at a time.
#[derive(Default)]
pub struct Context {
    endpoints: Mutex<HashMap<String, Sender<ControlRequest>>>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if an owner is bound to `address`.
    pub fn is_bound(&self, address: &str) -> bool {
        self.endpoints()
            .map(|endpoints| endpoints.contains_key(address))
            .unwrap_or(false)
    }

    /// Binds `address` and returns the receiving side of its control queue.
    pub(crate) fn bind(&self, address: &str) -> Result<Receiver<ControlRequest>> {
        let mut endpoints = self.endpoints()?;
        if endpoints.contains_key(address) {
            return Err(Error::InternalCommunication {
                operation: "bind",
                details: format!("{} is already bound", address),
            });
        }
        // Rendezvous: a request is handed over only when the owner takes it.
        let (tx, rx) = channel::bounded(0);
        endpoints.insert(address.to_string(), tx);
        log::trace!("bound control endpoint {}", address);
        Ok(rx)
    }

    /// Releases `address`. Requests already queued on it fail once the owner
    /// drops its receiver.
    pub(crate) fn unbind(&self, address: &str) {
        if let Ok(mut endpoints) = self.endpoints.lock() {
            if endpoints.remove(address).is_some() {
                log::trace!("unbound control endpoint {}", address);
            }
        }
    }

    /// Opens a request socket connected to `address`.
    pub(crate) fn connect(&self, address: &str) -> Result<RequestSocket> {
        let tx = self
            .endpoints()?
            .get(address)
            .cloned()
            .ok_or_else(|| Error::InternalCommunication {
                operation: "connect",
                details: format!("no owner bound to {}", address),
            })?;
        log::trace!("opened request endpoint on {}", address);
        Ok(RequestSocket {
            address: address.to_string(),
            tx,
        })
    }

    fn endpoints(&self) -> Result<MutexGuard<'_, HashMap<String, Sender<ControlRequest>>>> {
        self.endpoints.lock().map_err(|_| Error::InternalCommunication {
            operation: "context",
            details: "endpoint registry poisoned".to_string(),
        })
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let addresses: Vec<String> = self
            .endpoints()
            .map(|endpoints| endpoints.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("Context").field("bound", &addresses).finish()
    }
}

/// Request side of a control endpoint, valid for one exchange.
///
/// Dropping it releases the endpoint.
pub(crate) struct RequestSocket {
    address: String,
    tx: Sender<ControlRequest>,
}

impl RequestSocket {
    /// Sends one frame and waits for its reply, both within `timeout`.
    pub(crate) fn request(
        &self,
        operation: &'static str,
        frame: Bytes,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let (reply_tx, reply_rx) = channel::bounded(1);
        let request = ControlRequest {
            frame,
            reply: reply_tx,
        };

        self.tx.send_deadline(request, deadline).map_err(|e| match e {
            SendTimeoutError::Timeout(_) => Error::Timeout {
                operation,
                after: timeout,
            },
            SendTimeoutError::Disconnected(_) => Error::InternalCommunication {
                operation,
                details: format!("owner of {} is gone", self.address),
            },
        })?;

        reply_rx.recv_deadline(deadline).map_err(|e| match e {
            RecvTimeoutError::Timeout => Error::Timeout {
                operation,
                after: timeout,
            },
            RecvTimeoutError::Disconnected => Error::InternalCommunication {
                operation,
                details: format!("owner of {} dropped the request", self.address),
            },
        })
    }
}

impl Drop for RequestSocket {
    fn drop(&mut self) {
        log::trace!("released request endpoint on {}", self.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_bind_twice_fails() {
        let context = Context::new();
        let _rx = context.bind("inproc://control").unwrap();
        assert!(context.is_bound("inproc://control"));
        assert!(matches!(
            context.bind("inproc://control"),
            Err(Error::InternalCommunication { .. })
        ));
    }

    #[test]
    fn test_connect_unbound_fails() {
        let context = Context::new();
        assert!(matches!(
            context.connect("inproc://control"),
            Err(Error::InternalCommunication { .. })
        ));
    }

    #[test]
    fn test_request_reply() {
        let context = Context::new();
        let rx = context.bind("inproc://test").unwrap();
        let server = thread::spawn(move || {
            let request = rx.recv().unwrap();
            request.reply.send(request.frame.to_vec()).unwrap();
        });

        let socket = context.connect("inproc://test").unwrap();
        let reply = socket
            .request("test", Bytes::from_static(b"\x00"), Duration::from_secs(5))
            .unwrap();
        assert_eq!(reply, vec![0]);
        server.join().unwrap();
    }

    #[test]
    fn test_request_times_out_without_owner_loop() {
        let context = Context::new();
        let _rx = context.bind("inproc://idle").unwrap();
        let socket = context.connect("inproc://idle").unwrap();
        let result = socket.request("test", Bytes::new(), Duration::from_millis(20));
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[test]
    fn test_dropped_request_is_internal_error() {
        let context = Context::new();
        let rx = context.bind("inproc://drop").unwrap();
        let server = thread::spawn(move || {
            let request = rx.recv().unwrap();
            drop(request);
        });

        let socket = context.connect("inproc://drop").unwrap();
        let result = socket.request("test", Bytes::new(), Duration::from_secs(5));
        assert!(matches!(result, Err(Error::InternalCommunication { .. })));
        server.join().unwrap();
    }
}
