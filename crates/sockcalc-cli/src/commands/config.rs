use crate::cli::ConfigArgs;
use crate::config::{PartialCalculatorConfig, ResolvedConfig};
use crate::error::Result;
use tracing::info;

pub fn run(args: ConfigArgs) -> Result<()> {
    let partial = match &args.config {
        Some(path) => PartialCalculatorConfig::from_file(path)?,
        None => {
            info!("No configuration file given; starting from built-in defaults.");
            PartialCalculatorConfig::default()
        }
    };

    let parameters = partial.merge_with_cli(&args)?;
    info!(
        command = %parameters.process.display_command(),
        address = %parameters.socket.address,
        "Configuration resolved."
    );

    print!("{}", ResolvedConfig::from(&parameters).to_toml()?);
    Ok(())
}
