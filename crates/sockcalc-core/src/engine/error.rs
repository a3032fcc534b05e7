use thiserror::Error;

use super::config::ConfigError;
use super::socket::SocketError;
use crate::core::geometry::GeometryError;
use std::path::PathBuf;
use std::process::ExitStatus;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to launch engine command '{command}': {source}")]
    ProcessLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open engine log file {path:?}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine process terminated ({status}) before handing back a result")]
    EngineTerminated { status: ExitStatus },

    #[error("Engine command '{command}' exited with non-zero status ({status})")]
    NonZeroExit { command: String, status: ExitStatus },

    #[error("Failed to query engine process: {0}")]
    ProcessWait(#[source] std::io::Error),

    #[error("Geometry conversion failed: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Socket interface error: {0}")]
    Socket(#[from] SocketError),

    #[error("Invalid engine parameters: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
