use super::config::EngineParameters;
use super::error::EngineError;
use super::process::{self, EngineProcess};
use super::progress::{ClientEvent, EventReporter};
use super::socket::{RequestStatus, SocketBackend, SocketInterface, SocketSession};
use crate::core::geometry::EngineStructure;
use crate::core::models::result::RawResult;
use crate::core::models::structure::StructureShape;
use std::process::ExitStatus;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the poll loop of one request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(RawResult),
    /// The engine process exited before the request reached `Done`.
    EngineExited(ExitStatus),
}

/// A listening socket interface paired with the engine process connected to it.
///
/// Built and destroyed as one unit: a `Session` value only exists when both
/// halves are up.
pub struct Session<I: SocketInterface> {
    socket: SocketSession<I>,
    process: EngineProcess,
    shape: StructureShape,
}

impl<I: SocketInterface> Session<I> {
    /// Opens the socket first so the engine has something to connect to, then
    /// launches the engine. If the launch fails the socket is stopped again.
    pub fn start<B>(
        backend: &B,
        parameters: &EngineParameters,
        shape: StructureShape,
    ) -> Result<Self, EngineError>
    where
        B: SocketBackend<Interface = I>,
    {
        let socket = SocketSession::open(backend, &parameters.socket)?;

        let process = match process::spawn(&parameters.process) {
            Ok(process) => process,
            Err(e) => {
                if let Err(stop_err) = socket.close() {
                    warn!("Failed to stop socket after launch failure: {}", stop_err);
                }
                return Err(e);
            }
        };

        info!(
            pid = process.id(),
            command = %process.command(),
            address = %socket.address(),
            n_atoms = shape.n_atoms,
            "Engine session started."
        );

        Ok(Self {
            socket,
            process,
            shape,
        })
    }

    pub fn shape(&self) -> StructureShape {
        self.shape
    }

    pub fn pid(&self) -> u32 {
        self.process.id()
    }

    /// Submits one request and polls until it is done or the engine dies.
    ///
    /// Each iteration checks process liveness, then request status, then
    /// calls `pause(latency)`. The request is released on every exit path.
    pub fn run_request(
        &mut self,
        payload: EngineStructure,
        latency: Duration,
        pause: &dyn Fn(Duration),
        reporter: &EventReporter,
    ) -> Result<PollOutcome, EngineError> {
        let process = &mut self.process;
        self.socket.with_request(payload, |socket, handle| {
            reporter.report(ClientEvent::RequestQueued { handle });
            let mut polls = 0u32;
            loop {
                if let Some(status) = process.poll()? {
                    warn!(%handle, %status, "Engine process exited while request was outstanding.");
                    return Ok(PollOutcome::EngineExited(status));
                }

                polls = count_poll(polls);
                if socket.status(handle)? == RequestStatus::Done {
                    let raw = socket.collect(handle)?;
                    debug!(%handle, polls, "Request completed.");
                    reporter.report(ClientEvent::RequestCompleted { handle, polls });
                    return Ok(PollOutcome::Completed(raw));
                }

                pause(latency);
            }
        })
    }

    /// Stops the socket, waits for the engine to exit and closes its logs.
    ///
    /// A nonzero exit is reported only after all of that has happened. If the
    /// socket refuses to stop the engine is killed so it is still reaped.
    pub fn teardown(self) -> Result<ExitStatus, EngineError> {
        let Session {
            socket,
            mut process,
            ..
        } = self;
        let command = process.command().to_string();

        if let Err(e) = socket.close() {
            warn!(pid = process.id(), "Socket did not stop cleanly; killing engine: {}", e);
            process.kill();
            if let Err(wait_err) = process.terminate() {
                warn!("Failed to reap killed engine: {}", wait_err);
            }
            return Err(e);
        }

        let status = process.terminate()?;
        if !status.success() {
            return Err(EngineError::NonZeroExit { command, status });
        }
        Ok(status)
    }
}

/// Advances the per-request poll counter, saturating at `u32::MAX`.
fn count_poll(polls: u32) -> u32 {
    polls.saturating_add(1)
}
