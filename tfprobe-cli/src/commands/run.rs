//! `tfprobe run` command handler

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use tfprobe_core::config::HarnessConfig;
use tfprobe_core::counters::RunReport;
use tfprobe_core::{
    Counters, LifecycleRunner, Provisioner, Registry, RunOutcome, StageSelection, SuiteDef,
    SuiteRunner, TerraformCli,
};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Description of the ad-hoc suite built from `--case` arguments.
pub const SELECTED_SUITE: &str = "Selected test cases";

/// Execute the `run` command against the real `terraform` binary.
///
/// The summary is always rendered, including after an aborted run.
///
/// # Errors
///
/// Returns `CliError::Config` if the registry cannot be built and
/// `CliError::TestsFailed` if any method failed or the run was aborted.
pub async fn execute(
    args: RunArgs,
    config: &HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let provisioner = Arc::new(
        TerraformCli::new(&config.terraform.binary).with_no_color(config.terraform.no_color),
    );

    let summary = run_with(args, config, provisioner, StageSelection::from_env()).await?;
    writer.render(&summary)?;
    summary.into_result()
}

/// Run the selected suites with the given provisioner and collect the summary.
///
/// `--skip` stages are added on top of `base` (the `SKIP_<stage>` environment
/// when called from [`execute`]).
pub async fn run_with<P: Provisioner>(
    args: RunArgs,
    config: &HarnessConfig,
    provisioner: Arc<P>,
    base: StageSelection,
) -> Result<RunSummary, CliError> {
    let registry = Registry::from_config(config)?;

    let stages = args.skip.iter().copied().fold(base, StageSelection::skip);

    let suites = if args.cases.is_empty() {
        registry.suites().to_vec()
    } else {
        vec![SuiteDef {
            description: SELECTED_SUITE.to_owned(),
            cases: args.cases,
        }]
    };
    if suites.is_empty() {
        warn!("no suites configured, nothing to run");
    }

    let runner = SuiteRunner::new(
        &registry,
        LifecycleRunner::new(provisioner).with_stages(stages),
    );
    let mut acc = Counters::new();
    info!(run_id = %acc.run_id(), suites = suites.len(), "starting test run");

    let aborted = match runner.run_suites(&suites, &mut acc).await {
        RunOutcome::Completed => None,
        RunOutcome::Aborted { case, error } => Some(AbortInfo {
            case,
            error: error.to_string(),
        }),
    };

    info!(run_id = %acc.run_id(), status = acc.status(), "test run finished");
    Ok(RunSummary {
        report: acc.report(),
        aborted,
        summary_text: acc.summarize(),
    })
}

/// Where and why a run was aborted.
#[derive(Debug, Serialize)]
pub struct AbortInfo {
    /// Case that raised the fatal failure
    pub case: String,
    /// Error message
    pub error: String,
}

/// Final run summary.
///
/// JSON output carries the counters; text output prints the fixed report.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub report: RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortInfo>,
    /// Fixed-format console report
    #[serde(skip)]
    pub summary_text: String,
}

impl RunSummary {
    /// Every method passed and the run was not aborted.
    pub fn passed(&self) -> bool {
        self.aborted.is_none() && self.report.status == "PASS"
    }

    /// Convert the summary into the command result.
    pub fn into_result(self) -> Result<(), CliError> {
        if let Some(abort) = self.aborted {
            return Err(CliError::TestsFailed(format!(
                "aborted in case '{}': {}",
                abort.case, abort.error
            )));
        }
        if self.report.status != "PASS" {
            return Err(CliError::TestsFailed(format!(
                "{} of {} methods failed",
                self.report.methods_failed, self.report.methods
            )));
        }
        Ok(())
    }
}

impl Render for RunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref abort) = self.aborted {
            writeln!(
                w,
                "{} in case '{}': {}",
                "Run aborted".red().bold(),
                abort.case,
                abort.error
            )?;
        }
        write!(w, "{}", self.summary_text)?;
        Ok(())
    }
}
