//! Log subscriber for the `tfprobe` binary.
//!
//! `tfprobe-core` reports stage progress, check failures and failure traces
//! as `tracing` events. They are written to stderr so that stdout carries
//! only the run report and `--output json` can be piped.

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tfprobe_core::config::GeneralConfig;

/// Install the global subscriber from the `[general]` section.
///
/// `RUST_LOG` wins over `log_level`. `log_format` is `"pretty"` for a
/// terminal or `"json"` for CI log collectors. Fails if a subscriber is
/// already installed.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "pretty" => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };
    installed.with_context(|| format!("failed to install {} log subscriber", config.log_format))
}
