//! The seam between the client and the protocol library that talks to the engine.
//!
//! The wire protocol lives behind [`SocketBackend`] / [`SocketInterface`]; this
//! module only adds lifecycle discipline on top of it through [`SocketSession`].

use super::config::SocketConfig;
use super::error::EngineError;
use crate::core::geometry::EngineStructure;
use crate::core::models::result::RawResult;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SocketError {
    #[error("Failed to open socket interface on '{address}': {reason}")]
    Open { address: String, reason: String },

    #[error("Failed to queue request: {0}")]
    Queue(String),

    #[error("Unknown request {0}")]
    UnknownRequest(RequestHandle),

    #[error("Result of request {0} is not available")]
    ResultUnavailable(RequestHandle),

    #[error("Failed to stop socket interface: {0}")]
    Stop(String),
}

/// Opaque identifier of one queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(pub u64);

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Queued,
    Running,
    Done,
}

/// An open, listening socket interface provided by a protocol implementation.
///
/// `status` and `result` must never block. `release` is called exactly once per
/// handle by [`SocketSession`]; implementations need not guard against repeats.
pub trait SocketInterface {
    fn queue(&mut self, structure: EngineStructure) -> Result<RequestHandle, SocketError>;

    fn status(&self, handle: RequestHandle) -> Result<RequestStatus, SocketError>;

    fn result(&self, handle: RequestHandle) -> Result<RawResult, SocketError>;

    fn release(&mut self, handle: RequestHandle);

    /// Stops accepting and serving connections. Does not wait for the engine.
    fn stop(&mut self) -> Result<(), SocketError>;
}

/// Constructs listening [`SocketInterface`]s from configuration.
pub trait SocketBackend {
    type Interface: SocketInterface;

    fn open(&self, config: &SocketConfig) -> Result<Self::Interface, SocketError>;
}

/// Wraps an open interface with the request discipline the client relies on.
pub struct SocketSession<I: SocketInterface> {
    interface: I,
    address: String,
}

impl<I: SocketInterface> SocketSession<I> {
    /// Opens and starts listening. The engine process is not started here.
    pub fn open<B>(backend: &B, config: &SocketConfig) -> Result<Self, EngineError>
    where
        B: SocketBackend<Interface = I>,
    {
        let interface = backend.open(config)?;
        debug!(mode = %config.mode, address = %config.address, port = config.port, "Socket interface listening.");
        Ok(Self {
            interface,
            address: config.address.clone(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn submit(&mut self, structure: EngineStructure) -> Result<RequestHandle, EngineError> {
        let handle = self.interface.queue(structure)?;
        debug!(%handle, "Request queued.");
        Ok(handle)
    }

    pub fn status(&self, handle: RequestHandle) -> Result<RequestStatus, EngineError> {
        Ok(self.interface.status(handle)?)
    }

    /// Reads the accumulated result of a finished request without releasing it.
    pub fn collect(&self, handle: RequestHandle) -> Result<RawResult, EngineError> {
        match self.interface.status(handle)? {
            RequestStatus::Done => Ok(self.interface.result(handle)?),
            _ => Err(SocketError::ResultUnavailable(handle).into()),
        }
    }

    pub fn release(&mut self, handle: RequestHandle) {
        self.interface.release(handle);
        debug!(%handle, "Request released.");
    }

    /// Submits `structure`, runs `action` against the outstanding request and
    /// releases it afterwards, whatever `action` returned.
    pub fn with_request<F, R>(
        &mut self,
        structure: EngineStructure,
        action: F,
    ) -> Result<R, EngineError>
    where
        F: FnOnce(&Self, RequestHandle) -> Result<R, EngineError>,
    {
        let handle = self.submit(structure)?;
        let result = action(self, handle);
        self.release(handle);
        result
    }

    /// Signals the interface to stop serving.
    pub fn close(mut self) -> Result<(), EngineError> {
        self.interface.stop()?;
        debug!(address = %self.address, "Socket interface stopped.");
        Ok(())
    }
}
