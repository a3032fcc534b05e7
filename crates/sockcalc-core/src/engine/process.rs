//! Supervision of the external engine's operating-system process.
//!
//! One [`EngineProcess`] exists from a successful [`spawn`] until the process has
//! been reaped. Its two log handles live and die with it.

use super::config::{LogMode, ProcessConfig};
use super::error::EngineError;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// A running (or exited but not yet reaped) engine process together with the
/// files its standard output and error are captured into.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    command: String,
    stdout_log: Option<File>,
    stderr_log: Option<File>,
    reaped: bool,
}

/// Opens both log targets and launches the configured command with its output
/// redirected into them.
pub fn spawn(config: &ProcessConfig) -> Result<EngineProcess, EngineError> {
    let command_line = config.display_command();
    let (program, args) = config
        .command
        .split_first()
        .ok_or_else(|| EngineError::ProcessLaunch {
            command: command_line.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        })?;

    let stdout_log = open_log(&config.stdout_path, config.log_mode)?;
    let stderr_log = open_log(&config.stderr_path, config.log_mode)?;

    let clone_for_child = |file: &File, path: &Path| {
        file.try_clone().map_err(|source| EngineError::LogFile {
            path: path.to_path_buf(),
            source,
        })
    };
    let child_stdout = clone_for_child(&stdout_log, &config.stdout_path)?;
    let child_stderr = clone_for_child(&stderr_log, &config.stderr_path)?;

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(child_stdout))
        .stderr(Stdio::from(child_stderr))
        .spawn()
        .map_err(|source| EngineError::ProcessLaunch {
            command: command_line.clone(),
            source,
        })?;

    debug!(pid = child.id(), command = %command_line, "Engine process spawned.");

    Ok(EngineProcess {
        child,
        command: command_line,
        stdout_log: Some(stdout_log),
        stderr_log: Some(stderr_log),
        reaped: false,
    })
}

fn open_log(path: &Path, mode: LogMode) -> Result<File, EngineError> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        LogMode::Append => options.append(true),
        LogMode::Truncate => options.write(true).truncate(true),
    };
    options.open(path).map_err(|source| EngineError::LogFile {
        path: path.to_path_buf(),
        source,
    })
}

impl EngineProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// True while both log handles are held.
    pub fn logs_open(&self) -> bool {
        self.stdout_log.is_some() && self.stderr_log.is_some()
    }

    /// Non-blocking liveness check. Returns the exit status once the process has
    /// terminated.
    pub fn poll(&mut self) -> Result<Option<ExitStatus>, EngineError> {
        let status = self.child.try_wait().map_err(EngineError::ProcessWait)?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Forcefully stops the process. Used only when the protocol layer could not
    /// ask the engine to exit.
    pub fn kill(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            debug!(pid = self.child.id(), "Kill request failed: {}", e);
        }
    }

    /// Blocks until the process exits, then closes both log handles.
    ///
    /// The handles are closed whether or not the wait succeeds, and before this
    /// returns.
    pub fn terminate(mut self) -> Result<ExitStatus, EngineError> {
        let waited = self.child.wait();
        self.close_logs();
        let status = waited.map_err(EngineError::ProcessWait)?;
        self.reaped = true;
        debug!(pid = self.child.id(), %status, "Engine process reaped.");
        Ok(status)
    }

    fn close_logs(&mut self) {
        self.stdout_log.take();
        self.stderr_log.take();
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!(
            pid = self.child.id(),
            command = %self.command,
            "Engine process dropped while still running; killing it."
        );
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.close_logs();
    }
}
