use crate::core::geometry::{CellConvention, Conventions, StressConvention};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Engine command must contain at least an executable")]
    EmptyCommand,

    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Socket family the engine connects through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocketMode {
    Unix,
    #[default]
    Inet,
}

/// How incoming engine connections are matched to pending requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    #[default]
    Auto,
    Any,
    Lock,
}

/// Whether engine log files are appended to or truncated on spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogMode {
    #[default]
    Append,
    Truncate,
}

macro_rules! impl_keyword_enum {
    ($ty:ty, $kind:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($variant => $name,)+
                };
                f.write_str(name)
            }
        }

        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(ConfigError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

impl_keyword_enum!(SocketMode, "socket mode", {
    SocketMode::Unix => "unix",
    SocketMode::Inet => "inet",
});

impl_keyword_enum!(MatchMode, "match mode", {
    MatchMode::Auto => "auto",
    MatchMode::Any => "any",
    MatchMode::Lock => "lock",
});

impl_keyword_enum!(LogMode, "log mode", {
    LogMode::Append => "append",
    LogMode::Truncate => "truncate",
});

impl_keyword_enum!(CellConvention, "cell convention", {
    CellConvention::ColumnVectors => "column-vectors",
    CellConvention::RowVectors => "row-vectors",
});

impl_keyword_enum!(StressConvention, "stress convention", {
    StressConvention::AsReported => "as-reported",
    StressConvention::Negated => "negated",
});

/// Everything the socket backend needs to open and serve an interface.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketConfig {
    pub mode: SocketMode,
    /// Host name for `inet`, socket name for `unix`.
    pub address: String,
    pub port: u16,
    pub slots: usize,
    /// Connection-accept timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    pub match_mode: MatchMode,
    /// Pause between two polls of an outstanding request.
    pub latency: Duration,
    /// Forcefield name reported to the protocol layer.
    pub name: String,
    /// Wrap positions into the primary cell before they are sent.
    pub wrap_positions: bool,
    /// Indices of the atoms the engine acts on; `None` selects all of them.
    pub active: Option<Vec<usize>>,
    /// Free-form forcefield parameters forwarded to the backend.
    pub pars: BTreeMap<String, String>,
}

/// Launch settings for the engine process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    /// Executable followed by its arguments, e.g. `["srun", "dftb+"]`.
    pub command: Vec<String>,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub log_mode: LogMode,
}

impl ProcessConfig {
    /// The command as a single display string.
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineParameters {
    pub socket: SocketConfig,
    pub process: ProcessConfig,
    pub conventions: Conventions,
}

impl Default for EngineParameters {
    fn default() -> Self {
        Self {
            socket: SocketConfig {
                mode: SocketMode::Inet,
                address: "localhost".to_string(),
                port: 65535,
                slots: 4,
                timeout: None,
                match_mode: MatchMode::Auto,
                latency: Duration::from_secs(1),
                name: "DFTBPlus".to_string(),
                wrap_positions: true,
                active: None,
                pars: BTreeMap::new(),
            },
            process: ProcessConfig {
                command: vec!["dftb+".to_string()],
                stdout_path: PathBuf::from("dftb+.stdout.log"),
                stderr_path: PathBuf::from("dftb+.stderr.log"),
                log_mode: LogMode::Append,
            },
            conventions: Conventions::default(),
        }
    }
}

impl EngineParameters {
    pub fn builder() -> EngineParametersBuilder {
        EngineParametersBuilder::new()
    }

    /// A builder pre-filled with these parameters, for deriving a changed copy.
    pub fn to_builder(&self) -> EngineParametersBuilder {
        EngineParametersBuilder {
            params: self.clone(),
            latency_secs: None,
            timeout_secs: None,
        }
    }
}

/// Builds [`EngineParameters`] starting from the defaults.
///
/// Latency and timeout are accepted in seconds and validated in [`build`](Self::build).
#[derive(Default)]
pub struct EngineParametersBuilder {
    params: EngineParameters,
    latency_secs: Option<f64>,
    timeout_secs: Option<f64>,
}

impl EngineParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: SocketMode) -> Self {
        self.params.socket.mode = mode;
        self
    }
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.params.socket.address = address.into();
        self
    }
    pub fn port(mut self, port: u16) -> Self {
        self.params.socket.port = port;
        self
    }
    pub fn slots(mut self, slots: usize) -> Self {
        self.params.socket.slots = slots;
        self
    }
    pub fn latency_secs(mut self, seconds: f64) -> Self {
        self.latency_secs = Some(seconds);
        self
    }
    /// Zero disables the timeout.
    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }
    pub fn match_mode(mut self, match_mode: MatchMode) -> Self {
        self.params.socket.match_mode = match_mode;
        self
    }
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.params.socket.name = name.into();
        self
    }
    pub fn wrap_positions(mut self, wrap: bool) -> Self {
        self.params.socket.wrap_positions = wrap;
        self
    }
    pub fn active(mut self, active: Option<Vec<usize>>) -> Self {
        self.params.socket.active = active;
        self
    }
    pub fn par(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.socket.pars.insert(key.into(), value.into());
        self
    }
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.process.command = command.into_iter().map(Into::into).collect();
        self
    }
    pub fn stdout_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params.process.stdout_path = path.into();
        self
    }
    pub fn stderr_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params.process.stderr_path = path.into();
        self
    }
    pub fn log_mode(mut self, log_mode: LogMode) -> Self {
        self.params.process.log_mode = log_mode;
        self
    }
    pub fn cell_convention(mut self, convention: CellConvention) -> Self {
        self.params.conventions.cell = convention;
        self
    }
    pub fn stress_convention(mut self, convention: StressConvention) -> Self {
        self.params.conventions.stress = convention;
        self
    }

    pub fn build(self) -> Result<EngineParameters, ConfigError> {
        let mut params = self.params;

        if let Some(seconds) = self.latency_secs {
            params.socket.latency = seconds_to_duration("latency", seconds)?;
        }
        if params.socket.latency.is_zero() {
            return Err(ConfigError::InvalidParameter {
                name: "latency",
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(seconds) = self.timeout_secs {
            let timeout = seconds_to_duration("timeout", seconds)?;
            params.socket.timeout = (!timeout.is_zero()).then_some(timeout);
        }

        if params.socket.address.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "address",
                reason: "must not be empty".to_string(),
            });
        }
        if params.socket.slots == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "slots",
                reason: "must be at least 1".to_string(),
            });
        }
        match params.process.command.first() {
            Some(executable) if !executable.trim().is_empty() => {}
            _ => return Err(ConfigError::EmptyCommand),
        }

        Ok(params)
    }
}

fn seconds_to_duration(name: &'static str, seconds: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidParameter {
        name,
        reason: format!("{} is not a non-negative number of seconds", seconds),
    })
}
