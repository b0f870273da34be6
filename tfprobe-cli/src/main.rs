use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use tfprobe_cli::cli::{Cli, Commands};
use tfprobe_cli::commands;
use tfprobe_cli::error::CliError;
use tfprobe_cli::logging::init_tracing;
use tfprobe_cli::output::OutputWriter;
use tfprobe_core::config::{GeneralConfig, HarnessConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        config: config_path,
        log_level,
        output,
        command,
    } = cli;
    let writer = OutputWriter::new(output);

    match command {
        Commands::Run(args) => {
            let config = prepare(&config_path, log_level).await?;
            commands::run::execute(args, &config, &writer).await
        }
        Commands::List(args) => {
            let config = prepare(&config_path, log_level).await?;
            commands::list::execute(args, &config, &writer).await
        }
        Commands::Config(args) => {
            // The file under inspection may itself carry a broken [general] section.
            init_fallback_tracing(log_level.as_deref());
            commands::config::execute(args, &config_path, &writer).await
        }
    }
}

/// Load the configuration, apply the `--log-level` override and install logging.
async fn prepare(config_path: &Path, log_level: Option<String>) -> Result<HarnessConfig, CliError> {
    let mut config = HarnessConfig::load_or_default(config_path).await?;
    if let Some(level) = log_level {
        config.general.log_level = level;
        config.validate()?;
    }
    init_tracing(&config.general).map_err(|e| CliError::Config(e.to_string()))?;

    tracing::info!(config = %config_path.display(), "tfprobe starting");
    Ok(config)
}

fn init_fallback_tracing(level: Option<&str>) {
    let general = GeneralConfig {
        log_level: level.unwrap_or("warn").to_owned(),
        ..GeneralConfig::default()
    };
    if let Err(e) = init_tracing(&general) {
        eprintln!("{} {}", "warning:".yellow().bold(), e);
    }
}
