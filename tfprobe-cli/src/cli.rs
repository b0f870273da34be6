//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use tfprobe_core::Stage;

/// tfprobe -- deploy, verify and destroy Terraform modules under test.
///
/// Use `tfprobe <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "tfprobe", version, about, long_about = None)]
pub struct Cli {
    /// Path to the tfprobe.toml configuration file.
    #[arg(short, long, default_value = "tfprobe.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run test suites (deploy, verify, destroy) and print the summary.
    Run(RunArgs),

    /// List registered test cases, suites and checks.
    List(ListArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run every configured suite, or only the named cases.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run only these cases, in order, as a single suite (repeatable).
    #[arg(long = "case", value_name = "NAME")]
    pub cases: Vec<String>,

    /// Skip a stage (deploy, verify, destroy). Repeatable.
    ///
    /// Combined with the SKIP_<stage> environment variables.
    #[arg(long = "skip", value_name = "STAGE")]
    pub skip: Vec<Stage>,
}

// ---- list ----

/// Show what the registry contains.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show variables and flags of each case.
    #[arg(short, long)]
    pub verbose: bool,
}

// ---- config ----

/// Manage tfprobe configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, terraform, defaults, builtin, global).
        #[arg(long)]
        section: Option<String>,
    },
}
