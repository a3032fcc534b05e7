use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use sockcalc::core::geometry::{CellConvention, StressConvention};
use sockcalc::engine::config::{
    EngineParameters, EngineParametersBuilder, LogMode, MatchMode, SocketMode,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSocketConfig {
    mode: Option<SocketMode>,
    address: Option<String>,
    port: Option<u16>,
    slots: Option<usize>,
    latency: Option<f64>,
    timeout: Option<f64>,
    match_mode: Option<MatchMode>,
    name: Option<String>,
    wrap_positions: Option<bool>,
    active: Option<Vec<usize>>,
    #[serde(default)]
    pars: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialEngineConfig {
    command: Option<Vec<String>>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    log_mode: Option<LogMode>,
    bufsize: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialConventionsConfig {
    cell: Option<CellConvention>,
    stress: Option<StressConvention>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialCalculatorConfig {
    socket: Option<PartialSocketConfig>,
    engine: Option<PartialEngineConfig>,
    conventions: Option<PartialConventionsConfig>,
}

impl PartialCalculatorConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Layers file values, `--set` values and dedicated flags (in increasing
    /// precedence) over the library defaults and validates the result.
    pub fn merge_with_cli(mut self, args: &ConfigArgs) -> Result<EngineParameters> {
        self.apply_set_values(&args.set_values)?;

        let socket = self.socket.take().unwrap_or_default();
        let engine = self.engine.take().unwrap_or_default();
        let conventions = self.conventions.take().unwrap_or_default();

        if let Some(bufsize) = engine.bufsize {
            warn!(
                bufsize,
                "`engine.bufsize` has no effect: engine output is written straight to the log files."
            );
        }

        let mut builder = EngineParameters::builder();
        builder = Self::merge_socket(builder, socket, args);

        if let Some(command) = args.command.clone().or(engine.command) {
            builder = builder.command(command);
        }
        if let Some(path) = args.stdout.clone().or(engine.stdout) {
            builder = builder.stdout_path(path);
        }
        if let Some(path) = args.stderr.clone().or(engine.stderr) {
            builder = builder.stderr_path(path);
        }
        if let Some(log_mode) = args.log_mode.or(engine.log_mode) {
            builder = builder.log_mode(log_mode);
        }

        if let Some(cell) = conventions.cell {
            builder = builder.cell_convention(cell);
        }
        if let Some(stress) = conventions.stress {
            builder = builder.stress_convention(stress);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_socket(
        mut builder: EngineParametersBuilder,
        file: PartialSocketConfig,
        args: &ConfigArgs,
    ) -> EngineParametersBuilder {
        if let Some(mode) = args.mode.or(file.mode) {
            builder = builder.mode(mode);
        }
        if let Some(address) = args.address.clone().or(file.address) {
            builder = builder.address(address);
        }
        if let Some(port) = args.port.or(file.port) {
            builder = builder.port(port);
        }
        if let Some(slots) = args.slots.or(file.slots) {
            builder = builder.slots(slots);
        }
        if let Some(latency) = args.latency.or(file.latency) {
            builder = builder.latency_secs(latency);
        }
        if let Some(timeout) = args.timeout.or(file.timeout) {
            builder = builder.timeout_secs(timeout);
        }
        if let Some(match_mode) = args.match_mode.or(file.match_mode) {
            builder = builder.match_mode(match_mode);
        }
        if let Some(name) = file.name {
            builder = builder.name(name);
        }
        if let Some(wrap) = file.wrap_positions {
            builder = builder.wrap_positions(wrap);
        }
        if file.active.is_some() {
            builder = builder.active(file.active);
        }
        for (key, value) in file.pars {
            builder = builder.par(key, value);
        }
        builder
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;

            if let Some(par_key) = key.strip_prefix("socket.pars.") {
                self.socket
                    .get_or_insert_with(Default::default)
                    .pars
                    .insert(par_key.to_string(), value_str.to_string());
                continue;
            }

            match key {
                "socket.mode" => self.socket_mut().mode = Some(parse_value(key, value_str)?),
                "socket.address" => self.socket_mut().address = Some(value_str.to_string()),
                "socket.port" => self.socket_mut().port = Some(parse_value(key, value_str)?),
                "socket.slots" => self.socket_mut().slots = Some(parse_value(key, value_str)?),
                "socket.latency" => self.socket_mut().latency = Some(parse_value(key, value_str)?),
                "socket.timeout" => self.socket_mut().timeout = Some(parse_value(key, value_str)?),
                "socket.match-mode" => {
                    self.socket_mut().match_mode = Some(parse_value(key, value_str)?)
                }
                "socket.name" => self.socket_mut().name = Some(value_str.to_string()),
                "socket.wrap-positions" => {
                    self.socket_mut().wrap_positions = Some(parse_value(key, value_str)?)
                }
                "engine.command" => self.engine_mut().command = Some(parse_command(value_str)?),
                "engine.stdout" => self.engine_mut().stdout = Some(PathBuf::from(value_str)),
                "engine.stderr" => self.engine_mut().stderr = Some(PathBuf::from(value_str)),
                "engine.log-mode" => self.engine_mut().log_mode = Some(parse_value(key, value_str)?),
                "engine.bufsize" => self.engine_mut().bufsize = Some(parse_value(key, value_str)?),
                "conventions.cell" => {
                    self.conventions_mut().cell = Some(parse_value(key, value_str)?)
                }
                "conventions.stress" => {
                    self.conventions_mut().stress = Some(parse_value(key, value_str)?)
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn socket_mut(&mut self) -> &mut PartialSocketConfig {
        self.socket.get_or_insert_with(Default::default)
    }

    fn engine_mut(&mut self) -> &mut PartialEngineConfig {
        self.engine.get_or_insert_with(Default::default)
    }

    fn conventions_mut(&mut self) -> &mut PartialConventionsConfig {
        self.conventions.get_or_insert_with(Default::default)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CliError::Config(format!("Invalid value for {}: '{}' ({})", key, value, e)))
}

/// Reads an engine command from `-S engine.command=...`.
///
/// A TOML array literal (`["mpirun", "/opt/my dftb/dftb+"]`) is taken verbatim,
/// so arguments may contain spaces. Any other value is split on whitespace.
fn parse_command(value: &str) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct CommandLiteral {
        command: Vec<String>,
    }

    let trimmed = value.trim();
    if !trimmed.starts_with('[') {
        return Ok(trimmed.split_whitespace().map(str::to_string).collect());
    }
    toml::from_str::<CommandLiteral>(&format!("command = {}", trimmed))
        .map(|literal| literal.command)
        .map_err(|e| {
            CliError::Config(format!(
                "Invalid value for engine.command: '{}' ({})",
                value,
                e.message()
            ))
        })
}

/// Effective parameters in the same layout the configuration file uses.
#[derive(Serialize, Debug)]
pub struct ResolvedConfig {
    socket: ResolvedSocket,
    engine: ResolvedEngine,
    conventions: ResolvedConventions,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct ResolvedSocket {
    mode: SocketMode,
    address: String,
    port: u16,
    slots: usize,
    latency: f64,
    timeout: f64,
    match_mode: MatchMode,
    name: String,
    wrap_positions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    active: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pars: BTreeMap<String, String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct ResolvedEngine {
    command: Vec<String>,
    stdout: PathBuf,
    stderr: PathBuf,
    log_mode: LogMode,
}

#[derive(Serialize, Debug)]
struct ResolvedConventions {
    cell: CellConvention,
    stress: StressConvention,
}

impl From<&EngineParameters> for ResolvedConfig {
    fn from(params: &EngineParameters) -> Self {
        let socket = &params.socket;
        Self {
            socket: ResolvedSocket {
                mode: socket.mode,
                address: socket.address.clone(),
                port: socket.port,
                slots: socket.slots,
                latency: socket.latency.as_secs_f64(),
                timeout: socket.timeout.map_or(0.0, |t| t.as_secs_f64()),
                match_mode: socket.match_mode,
                name: socket.name.clone(),
                wrap_positions: socket.wrap_positions,
                active: socket.active.clone(),
                pars: socket.pars.clone(),
            },
            engine: ResolvedEngine {
                command: params.process.command.clone(),
                stdout: params.process.stdout_path.clone(),
                stderr: params.process.stderr_path.clone(),
                log_mode: params.process.log_mode,
            },
            conventions: ResolvedConventions {
                cell: params.conventions.cell,
                stress: params.conventions.stress,
            },
        }
    }
}

impl ResolvedConfig {
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_config_file(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("sockcalc.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn config_args(extra: &[&str]) -> ConfigArgs {
        let mut argv = vec!["sockcalc", "config"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Config(args) => args,
            _ => panic!("Expected 'config' subcommand"),
        }
    }

    #[test]
    fn empty_configuration_resolves_to_library_defaults() {
        let params = PartialCalculatorConfig::default()
            .merge_with_cli(&config_args(&[]))
            .unwrap();
        assert_eq!(params, EngineParameters::default());
    }

    #[test]
    fn file_values_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            [socket]
            mode = "unix"
            address = "dftb-run"
            slots = 2
            latency = 0.05
            timeout = 30.0
            match-mode = "lock"
            wrap-positions = false
            active = [0, 2]

            [socket.pars]
            charge = "0"

            [engine]
            command = ["srun", "-n", "4", "dftb+"]
            stdout = "out.log"
            log-mode = "truncate"

            [conventions]
            stress = "negated"
            "#,
        );

        let params = PartialCalculatorConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&config_args(&[]))
            .unwrap();

        assert_eq!(params.socket.mode, SocketMode::Unix);
        assert_eq!(params.socket.address, "dftb-run");
        assert_eq!(params.socket.slots, 2);
        assert_eq!(params.socket.latency, Duration::from_millis(50));
        assert_eq!(params.socket.timeout, Some(Duration::from_secs(30)));
        assert_eq!(params.socket.match_mode, MatchMode::Lock);
        assert!(!params.socket.wrap_positions);
        assert_eq!(params.socket.active, Some(vec![0, 2]));
        assert_eq!(params.socket.pars.get("charge").map(String::as_str), Some("0"));
        assert_eq!(params.process.command, ["srun", "-n", "4", "dftb+"]);
        assert_eq!(params.process.stdout_path, PathBuf::from("out.log"));
        assert_eq!(params.process.stderr_path, PathBuf::from("dftb+.stderr.log"));
        assert_eq!(params.process.log_mode, LogMode::Truncate);
        assert_eq!(params.conventions.stress, StressConvention::Negated);
        assert_eq!(params.conventions.cell, CellConvention::ColumnVectors);
    }

    #[test]
    fn cli_flags_override_set_values_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            [socket]
            port = 1000
            address = "file-host"
            "#,
        );

        let args = config_args(&[
            "-S",
            "socket.port=2000",
            "-S",
            "socket.address=set-host",
            "--port",
            "3000",
        ]);
        let params = PartialCalculatorConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(params.socket.port, 3000);
        assert_eq!(params.socket.address, "set-host");
    }

    #[test]
    fn trailing_command_accepts_arguments_with_hyphens() {
        let args = config_args(&["--", "mpirun", "-np", "2", "dftb+"]);
        let params = PartialCalculatorConfig::default()
            .merge_with_cli(&args)
            .unwrap();
        assert_eq!(params.process.command, ["mpirun", "-np", "2", "dftb+"]);
    }

    #[test]
    fn flags_before_trailing_command_still_apply() {
        let args = config_args(&["--port", "31415", "--latency", "0.5", "--", "dftb+"]);
        let params = PartialCalculatorConfig::default()
            .merge_with_cli(&args)
            .unwrap();
        assert_eq!(params.process.command, ["dftb+"]);
        assert_eq!(params.socket.port, 31415);
        assert_eq!(params.socket.latency, Duration::from_millis(500));
    }

    #[test]
    fn set_command_accepts_array_literal_with_spaces() {
        let args = config_args(&["-S", r#"engine.command=["mpirun", "/opt/my dftb/dftb+"]"#]);
        let params = PartialCalculatorConfig::default()
            .merge_with_cli(&args)
            .unwrap();
        assert_eq!(params.process.command, ["mpirun", "/opt/my dftb/dftb+"]);
    }

    #[test]
    fn malformed_command_literal_is_rejected() {
        assert!(matches!(
            parse_command(r#"["dftb+", 3]"#),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn set_values_cover_engine_and_pars() {
        let args = config_args(&[
            "-S",
            "engine.command=srun dftb+",
            "-S",
            "socket.pars.kpts=2x2x2",
            "-S",
            "conventions.cell=row-vectors",
            "-S",
            "socket.timeout=0",
        ]);
        let params = PartialCalculatorConfig::default()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(params.process.command, ["srun", "dftb+"]);
        assert_eq!(params.socket.pars.get("kpts").map(String::as_str), Some("2x2x2"));
        assert_eq!(params.conventions.cell, CellConvention::RowVectors);
        assert_eq!(params.socket.timeout, None);
    }

    #[test]
    fn bufsize_is_accepted_without_effect() {
        let args = config_args(&["-S", "engine.bufsize=0"]);
        let params = PartialCalculatorConfig::default()
            .merge_with_cli(&args)
            .unwrap();
        assert_eq!(params, EngineParameters::default());
    }

    #[test]
    fn malformed_set_value_is_rejected() {
        let result = PartialCalculatorConfig::default()
            .merge_with_cli(&config_args(&["-S", "socket.port"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("KEY=VALUE")));
    }

    #[test]
    fn unknown_set_key_is_rejected() {
        let result = PartialCalculatorConfig::default()
            .merge_with_cli(&config_args(&["-S", "socket.colour=blue"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("socket.colour")));
    }

    #[test]
    fn invalid_enum_value_is_rejected() {
        let result = PartialCalculatorConfig::default()
            .merge_with_cli(&config_args(&["-S", "socket.mode=tcp"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("tcp")));
    }

    #[test]
    fn zero_latency_fails_validation() {
        let result = PartialCalculatorConfig::default()
            .merge_with_cli(&config_args(&["--latency", "0"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("latency")));
    }

    #[test]
    fn unknown_file_key_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(&dir, "[socket]\nbacklog = 3\n");

        let result = PartialCalculatorConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn resolved_config_round_trips_through_the_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let params = EngineParameters::builder()
            .mode(SocketMode::Unix)
            .address("roundtrip")
            .timeout_secs(12.5)
            .par("charge", "1")
            .build()
            .unwrap();

        let text = ResolvedConfig::from(&params).to_toml().unwrap();
        let path = write_config_file(&dir, &text);
        let reparsed = PartialCalculatorConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&config_args(&[]))
            .unwrap();

        assert_eq!(reparsed, params);
    }
}
