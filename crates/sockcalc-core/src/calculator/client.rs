use crate::core::geometry::GeometryAdapter;
use crate::core::models::result::{CalculationResult, Property};
use crate::core::models::structure::{StructureShape, StructureSnapshot};
use crate::engine::config::EngineParameters;
use crate::engine::error::EngineError;
use crate::engine::progress::{ClientEvent, EventCallback, EventReporter};
use crate::engine::session::{PollOutcome, Session};
use crate::engine::socket::SocketBackend;
use crate::engine::state::{ClientState, TeardownReason};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

type PauseFn = Box<dyn Fn(Duration) + Send + Sync>;

/// Drives one external engine through a socket backend.
///
/// At most one session (socket interface plus engine process) exists per client,
/// and at most one request is outstanding at a time: [`evaluate`](Self::evaluate)
/// takes `&mut self`, so concurrent callers must be serialized by their owner.
pub struct CalculationClient<B: SocketBackend> {
    backend: B,
    parameters: EngineParameters,
    adapter: GeometryAdapter,
    session: Option<Session<B::Interface>>,
    state: ClientState,
    reporter: EventReporter,
    pause: PauseFn,
}

impl<B: SocketBackend> CalculationClient<B> {
    /// Creates an uninitialized client. Nothing is opened or spawned until the
    /// first [`evaluate`](Self::evaluate).
    pub fn new(backend: B, parameters: EngineParameters) -> Self {
        let adapter = GeometryAdapter::new(parameters.conventions);
        Self {
            backend,
            parameters,
            adapter,
            session: None,
            state: ClientState::Uninitialized,
            reporter: EventReporter::new(),
            pause: Box::new(std::thread::sleep),
        }
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.reporter = EventReporter::with_callback(callback);
        self
    }

    /// Replaces the function used to wait between two polls. Defaults to
    /// [`std::thread::sleep`].
    pub fn with_pause<F>(mut self, pause: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.pause = Box::new(pause);
        self
    }

    /// Runs `body` with this client and shuts it down afterwards on every path.
    ///
    /// An error from `body` takes precedence over a shutdown error, which is then
    /// only logged.
    pub fn scoped<F, R>(mut self, body: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut Self) -> Result<R, EngineError>,
    {
        let outcome = body(&mut self);
        let shutdown = self.shutdown();
        match (outcome, shutdown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(shutdown_err)) => {
                warn!("Shutdown after failed scope also failed: {}", shutdown_err);
                Err(e)
            }
        }
    }

    pub fn parameters(&self) -> &EngineParameters {
        &self.parameters
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn engine_pid(&self) -> Option<u32> {
        self.session.as_ref().map(Session::pid)
    }

    /// Records new parameters. If they differ from the current ones, any running
    /// session is torn down; they take effect on the next evaluation.
    ///
    /// Returns whether the parameters changed. A teardown failure is returned even
    /// though the new parameters are already in place.
    pub fn set_parameters(&mut self, parameters: EngineParameters) -> Result<bool, EngineError> {
        if parameters == self.parameters {
            return Ok(false);
        }
        self.parameters = parameters;
        self.adapter = GeometryAdapter::new(self.parameters.conventions);
        self.teardown(TeardownReason::ParametersChanged)?;
        Ok(true)
    }

    /// Evaluates `structure`. `properties` is advisory: the engine always
    /// computes energy, forces and stress together.
    #[instrument(skip_all, name = "evaluate", fields(n_atoms = structure.n_atoms()))]
    pub fn evaluate(
        &mut self,
        structure: &StructureSnapshot,
        properties: &[Property],
    ) -> Result<CalculationResult, EngineError> {
        debug!(?properties, "Evaluation requested.");
        let payload = self.adapter.prepare(structure)?;
        let shape = structure.shape();

        if let Some(current) = self.session.as_ref().map(Session::shape) {
            if current != shape {
                info!(
                    from = current.n_atoms,
                    to = shape.n_atoms,
                    "Structure shape changed; restarting engine session."
                );
                self.teardown(TeardownReason::StructureChanged)?;
            }
        }
        if self.session.is_none() {
            self.start_session(shape)?;
        }

        let latency = self.parameters.socket.latency;
        self.transition(ClientState::Busy);
        let outcome = match self.session.as_mut() {
            Some(session) => {
                session.run_request(payload, latency, self.pause.as_ref(), &self.reporter)
            }
            None => Err(EngineError::Internal(
                "engine session missing after start".to_string(),
            )),
        };

        match outcome {
            Ok(PollOutcome::Completed(raw)) => {
                self.transition(ClientState::Initialized);
                Ok(self.adapter.convert_result(raw, structure)?)
            }
            Ok(PollOutcome::EngineExited(status)) => {
                self.teardown(TeardownReason::EngineExited)?;
                if !status.success() {
                    return Err(EngineError::Internal(format!(
                        "engine exit status {} was not reported by teardown",
                        status
                    )));
                }
                Err(EngineError::EngineTerminated { status })
            }
            Err(e) => {
                self.transition(ClientState::Initialized);
                Err(e)
            }
        }
    }

    /// Tears down the running session, if any. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        self.teardown(TeardownReason::Shutdown)
    }

    fn start_session(&mut self, shape: StructureShape) -> Result<(), EngineError> {
        let session = Session::start(&self.backend, &self.parameters, shape)?;
        self.reporter.report(ClientEvent::SessionStarted {
            pid: session.pid(),
            n_atoms: shape.n_atoms,
        });
        self.session = Some(session);
        self.transition(ClientState::Initialized);
        Ok(())
    }

    /// The session is taken out before anything can fail, so the client is
    /// Uninitialized afterwards whatever the result.
    fn teardown(&mut self, reason: TeardownReason) -> Result<(), EngineError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        info!(%reason, pid = session.pid(), "Tearing down engine session.");
        self.reporter.report(ClientEvent::TeardownStarted { reason });
        self.transition(ClientState::ShuttingDown);

        let result = session.teardown();

        self.transition(ClientState::Uninitialized);
        let exit_code = match &result {
            Ok(status) => status.code(),
            Err(EngineError::NonZeroExit { status, .. }) => status.code(),
            Err(_) => None,
        };
        self.reporter.report(ClientEvent::SessionClosed { exit_code });
        result.map(|_| ())
    }

    fn transition(&mut self, to: ClientState) {
        let from = self.state;
        if from != to {
            self.state = to;
            self.reporter.report(ClientEvent::StateChanged { from, to });
        }
    }
}

impl<B: SocketBackend> Drop for CalculationClient<B> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown(TeardownReason::Dropped) {
            warn!("Engine teardown on drop failed: {}", e);
        }
    }
}
