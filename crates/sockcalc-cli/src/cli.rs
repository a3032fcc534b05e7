use clap::{Args, Parser, Subcommand};
use sockcalc::core::geometry::{CellConvention, StressConvention};
use sockcalc::engine::config::{LogMode, MatchMode, SocketMode};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Alexander Held, Thomas Reichenbach",
    version,
    about = "sockcalc CLI - Inspect and validate the configuration of a socket-driven DFTB+ calculator.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the effective engine parameters and print them as TOML.
    Config(ConfigArgs),
    /// Show how a structure is handed to the engine (cell, inverse cell, positions in Bohr).
    Geometry(GeometryArgs),
}

/// Arguments for the `config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Socket Overrides ---
    /// Override the socket family.
    #[arg(long, value_name = "unix|inet")]
    pub mode: Option<SocketMode>,

    /// Override the host name (inet) or socket name (unix).
    #[arg(short, long, value_name = "HOST")]
    pub address: Option<String>,

    /// Override the inet port.
    #[arg(short, long, value_name = "INT")]
    pub port: Option<u16>,

    /// Override the number of connection slots.
    #[arg(long, value_name = "INT")]
    pub slots: Option<usize>,

    /// Override the pause between two polls, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub latency: Option<f64>,

    /// Override the connection-accept timeout in seconds (0 waits forever).
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Override how engine connections are matched to requests.
    #[arg(long, value_name = "auto|any|lock")]
    pub match_mode: Option<MatchMode>,

    // --- Engine Overrides ---
    /// Override the file the engine's standard output is captured into.
    #[arg(long, value_name = "PATH")]
    pub stdout: Option<PathBuf>,

    /// Override the file the engine's standard error is captured into.
    #[arg(long, value_name = "PATH")]
    pub stderr: Option<PathBuf>,

    /// Override whether engine logs are appended to or truncated.
    #[arg(long, value_name = "append|truncate")]
    pub log_mode: Option<LogMode>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S socket.port=31415
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,

    /// Override the engine command: the executable and its arguments, after `--`.
    /// Example: sockcalc config --port 31415 -- mpirun -np 2 dftb+
    #[arg(last = true, value_name = "COMMAND", num_args(1..))]
    pub command: Option<Vec<String>>,
}

/// Arguments for the `geometry` subcommand.
#[derive(Args, Debug)]
pub struct GeometryArgs {
    /// Path to a structure file in TOML format (`cell`, `pbc`, `positions`, Ångström).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub structure: PathBuf,

    /// How the lattice vectors are laid out in the engine's cell matrix.
    #[arg(long, value_name = "column-vectors|row-vectors", default_value_t = CellConvention::default())]
    pub cell_convention: CellConvention,

    /// Sign applied to stresses derived from the virial (shown for reference).
    #[arg(long, value_name = "as-reported|negated", default_value_t = StressConvention::default())]
    pub stress_convention: StressConvention,

    /// Wrap positions into the primary cell along periodic directions.
    #[arg(long)]
    pub wrap: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn geometry_conventions_parse_from_keywords() {
        let cli = Cli::parse_from([
            "sockcalc",
            "geometry",
            "--structure",
            "s.toml",
            "--cell-convention",
            "row-vectors",
            "--wrap",
        ]);
        match cli.command {
            Commands::Geometry(args) => {
                assert_eq!(args.cell_convention, CellConvention::RowVectors);
                assert_eq!(args.stress_convention, StressConvention::AsReported);
                assert!(args.wrap);
            }
            _ => panic!("Expected 'geometry' subcommand"),
        }
    }

    #[test]
    fn engine_command_is_taken_only_after_separator() {
        let cli = Cli::parse_from([
            "sockcalc", "config", "--port", "31415", "--", "mpirun", "-np", "2", "dftb+",
        ]);
        match cli.command {
            Commands::Config(args) => {
                assert_eq!(args.port, Some(31415));
                assert_eq!(
                    args.command,
                    Some(vec![
                        "mpirun".to_string(),
                        "-np".to_string(),
                        "2".to_string(),
                        "dftb+".to_string()
                    ])
                );
            }
            _ => panic!("Expected 'config' subcommand"),
        }
    }

    #[test]
    fn flags_after_engine_executable_are_not_swallowed() {
        let result = Cli::try_parse_from(["sockcalc", "config", "dftb+", "--port", "31415"]);
        assert!(result.is_err());

        let cli = Cli::parse_from(["sockcalc", "config", "--port", "31415", "--", "dftb+"]);
        match cli.command {
            Commands::Config(args) => {
                assert_eq!(args.port, Some(31415));
                assert_eq!(args.command, Some(vec!["dftb+".to_string()]));
            }
            _ => panic!("Expected 'config' subcommand"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["sockcalc", "-v", "--quiet", "config"]);
        assert!(result.is_err());
    }
}
