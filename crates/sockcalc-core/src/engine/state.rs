use std::fmt;

/// Lifecycle of a [`CalculationClient`](crate::calculator::CalculationClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// No socket interface and no engine process exist.
    Uninitialized,
    /// A socket interface is listening and the engine process has been launched.
    Initialized,
    /// A request is outstanding.
    Busy,
    /// The session is being torn down.
    ShuttingDown,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Uninitialized => "uninitialized",
            ClientState::Initialized => "initialized",
            ClientState::Busy => "busy",
            ClientState::ShuttingDown => "shutting-down",
        };
        f.write_str(name)
    }
}

/// Why a session is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownReason {
    ParametersChanged,
    StructureChanged,
    EngineExited,
    Shutdown,
    Dropped,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TeardownReason::ParametersChanged => "parameters changed",
            TeardownReason::StructureChanged => "structure changed",
            TeardownReason::EngineExited => "engine exited",
            TeardownReason::Shutdown => "shutdown",
            TeardownReason::Dropped => "client dropped",
        };
        f.write_str(name)
    }
}
