//! `tfprobe list` command handler

use std::io::Write;

use serde::Serialize;

use tfprobe_core::checks;
use tfprobe_core::config::HarnessConfig;
use tfprobe_core::Registry;
use tfprobe_core::types::render_value;

use crate::cli::ListArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub async fn execute(
    args: ListArgs,
    config: &HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let registry = Registry::from_config(config)?;
    let report = build_list_report(&registry, args.verbose);
    writer.render(&report)?;
    Ok(())
}

/// Build the registry listing.
pub fn build_list_report(registry: &Registry, verbose: bool) -> ListReport {
    let cases = registry
        .cases()
        .map(|(name, case)| CaseEntry {
            name: name.to_owned(),
            description: case.description.clone(),
            module_dir: case.module_dir.display().to_string(),
            checks: case.local_checks.iter().map(|c| c.name.to_owned()).collect(),
            run_local_checks: case.flags.run_local_checks,
            run_global_checks: case.flags.run_global_checks,
            vars: if verbose {
                Some(
                    case.vars
                        .iter()
                        .map(|(k, v)| (k.clone(), render_value(v)))
                        .collect(),
                )
            } else {
                None
            },
        })
        .collect();

    let suites = registry
        .suites()
        .iter()
        .map(|s| SuiteEntry {
            description: s.description.clone(),
            cases: s.cases.clone(),
        })
        .collect();

    ListReport {
        cases,
        suites,
        global_checks: registry
            .global_checks()
            .iter()
            .map(|c| c.name.to_owned())
            .collect(),
        available_checks: checks::catalogue()
            .iter()
            .map(|c| c.name.to_owned())
            .collect(),
    }
}

/// Registry listing.
#[derive(Serialize)]
pub struct ListReport {
    pub cases: Vec<CaseEntry>,
    pub suites: Vec<SuiteEntry>,
    pub global_checks: Vec<String>,
    /// Checks that configuration files may reference by name
    pub available_checks: Vec<String>,
}

/// A registered test case.
#[derive(Serialize)]
pub struct CaseEntry {
    pub name: String,
    pub description: String,
    pub module_dir: String,
    pub checks: Vec<String>,
    pub run_local_checks: bool,
    pub run_global_checks: bool,
    /// Input variables (verbose only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vars: Option<Vec<(String, String)>>,
}

/// A suite and its ordered case names.
#[derive(Serialize)]
pub struct SuiteEntry {
    pub description: String,
    pub cases: Vec<String>,
}

impl Render for ListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{} ({})", "Test Cases".bold(), self.cases.len())?;
        if self.cases.is_empty() {
            writeln!(w, "  (none)")?;
        }
        for case in &self.cases {
            writeln!(w, "  {}", case.name.cyan())?;
            if case.description != case.name {
                writeln!(w, "    description: {}", case.description)?;
            }
            writeln!(w, "    module_dir:  {}", case.module_dir)?;
            let checks = if case.checks.is_empty() {
                "-".to_owned()
            } else {
                case.checks.join(", ")
            };
            writeln!(w, "    checks:      {checks}")?;
            if let Some(ref vars) = case.vars {
                writeln!(
                    w,
                    "    flags:       local={} global={}",
                    case.run_local_checks, case.run_global_checks
                )?;
                for (k, v) in vars {
                    writeln!(w, "    var {k} = {v}")?;
                }
            }
        }

        writeln!(w)?;
        writeln!(w, "{} ({})", "Suites".bold(), self.suites.len())?;
        for (i, suite) in self.suites.iter().enumerate() {
            writeln!(w, "  {}. {}", i + 1, suite.description.trim())?;
            for case in &suite.cases {
                writeln!(w, "     - {case}")?;
            }
        }

        writeln!(w)?;
        let globals = if self.global_checks.is_empty() {
            "-".to_owned()
        } else {
            self.global_checks.join(", ")
        };
        writeln!(w, "{} {}", "Global checks:".bold(), globals)?;
        writeln!(
            w,
            "{} {}",
            "Available checks:".bold(),
            self.available_checks.join(", ")
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin_registry() -> Registry {
        Registry::from_config(&HarnessConfig::default()).expect("builtin registry")
    }

    #[test]
    fn test_list_report_contains_builtin_case() {
        let report = build_list_report(&builtin_registry(), false);
        assert_eq!(report.cases.len(), 1);
        assert_eq!(report.cases[0].name, "Deploying SQL module");
        assert_eq!(report.cases[0].checks, vec!["postgres_existence"]);
        assert!(report.cases[0].vars.is_none(), "vars only in verbose mode");
        assert_eq!(report.suites.len(), 1);
        assert!(report.available_checks.contains(&"postgres_existence".to_owned()));
    }

    #[test]
    fn test_list_report_verbose_includes_vars() {
        let report = build_list_report(&builtin_registry(), true);
        let vars = report.cases[0].vars.as_ref().expect("verbose vars");
        assert!(vars.contains(&("db_name".to_owned(), "test_postgres".to_owned())));
    }

    #[test]
    fn test_list_report_render_text() {
        let report = build_list_report(&builtin_registry(), true);
        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Deploying SQL module"));
        assert!(output.contains("Test the Cloud SQL module functions"));
        assert!(output.contains("var db_name = test_postgres"));
    }

    #[test]
    fn test_list_report_shows_configured_global_checks() {
        let config = HarnessConfig::parse("[global]\nchecks = [\"postgres_existence\"]\n")
            .expect("should parse");
        let registry = Registry::from_config(&config).expect("registry");
        let report = build_list_report(&registry, false);
        assert_eq!(report.global_checks, vec!["postgres_existence"]);

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("postgres_existence"));
    }

    #[test]
    fn test_list_report_json_skips_vars_when_not_verbose() {
        let report = build_list_report(&builtin_registry(), false);
        let json = serde_json::to_value(&report).expect("serialize");
        assert!(json["cases"][0].get("vars").is_none());
        assert_eq!(json["suites"][0]["cases"][0].as_str(), Some("Deploying SQL module"));
    }
}
