//! Report rendering for `tfprobe` subcommands.
//!
//! Each command builds one report value (run summary, registry listing,
//! config view) and hands it to [`OutputWriter`]. `--output text` prints the
//! colored view from [`Render`], `--output json` prints the `Serialize` form.
//! Both go to stdout; logs go to stderr.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command reports in the format chosen by `--output`.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a report on stdout.
    pub fn render<T: Render + Serialize>(&self, report: &T) -> Result<(), CliError> {
        self.render_to(report, &mut std::io::stdout().lock())
    }

    /// Write a report into any sink. Command tests render into a `Vec<u8>`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        report: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => report.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, report)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable view of a report.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}
