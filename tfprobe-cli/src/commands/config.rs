//! `tfprobe config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use tfprobe_core::Registry;
use tfprobe_core::config::HarnessConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Placeholder written over secrets in `config show`.
pub const REDACTED: &str = "***REDACTED***";

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load, validate and build the registry from the configuration file.
///
/// Unlike `run`, a missing file is reported as invalid.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (parse errors, invalid
/// values, unknown checks or case names).
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validate_file(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Build the validation report for a configuration file.
pub async fn validate_file(config_path: &Path) -> ConfigValidationReport {
    let result = match HarnessConfig::load(config_path).await {
        Ok(config) => Registry::from_config(&config).map(|_| ()),
        Err(e) => Err(e),
    };

    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: result.is_ok(),
        errors: result.err().map(|e| vec![e.to_string()]).unwrap_or_default(),
    }
}

/// Display the effective configuration (file + env overrides + defaults).
///
/// The master user password is redacted.
///
/// # Errors
///
/// Returns `CliError::Config` if loading fails or `CliError::Command` if section name is invalid.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let mut config = HarnessConfig::load_or_default(config_path).await?;
    redact_credentials(&mut config);

    let report = build_config_report(&config, config_path, section.as_deref())?;
    writer.render(&report)?;

    Ok(())
}

/// Serialize the whole configuration or a single section.
pub fn build_config_report(
    config: &HarnessConfig,
    config_path: &Path,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let config_toml = match section {
        None => to_toml(config),
        Some("general") => to_toml(&config.general),
        Some("terraform") => to_toml(&config.terraform),
        Some("defaults") => to_toml(&config.defaults),
        Some("builtin") => to_toml(&config.builtin),
        Some("global") => to_toml(&config.global),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: general, terraform, defaults, builtin, global)",
                other
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {})", e))
}

/// Replace the master user password with a placeholder.
fn redact_credentials(config: &mut HarnessConfig) {
    if !config.defaults.master_user_password.is_empty() {
        config.defaults.master_user_password = REDACTED.to_owned();
    }
    for case in &mut config.cases {
        if let Some(v) = case.vars.get_mut("master_user_password") {
            *v = serde_json::Value::String(REDACTED.to_owned());
        }
    }
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration (with redacted credentials)
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
