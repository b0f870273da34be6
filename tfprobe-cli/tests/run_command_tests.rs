//! Integration tests for `tfprobe run` command.
//!
//! Drives the run handler with a scripted provisioner instead of the
//! `terraform` binary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serial_test::serial;
use tempfile::TempDir;
use tfprobe_cli::cli::RunArgs;
use tfprobe_cli::commands::run::run_with;
use tfprobe_cli::error::CliError;
use tfprobe_core::Stage;
use tfprobe_core::config::HarnessConfig;
use tfprobe_core::error::ProvisionError;
use tfprobe_core::{ProvisionOptions, Provisioner, StageSelection};

struct FakeTerraform {
    proxy: String,
    fail_apply: bool,
    applies: AtomicUsize,
    destroys: AtomicUsize,
}

impl FakeTerraform {
    fn new(proxy: &str) -> Self {
        Self {
            proxy: proxy.to_owned(),
            fail_apply: false,
            applies: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
        }
    }
}

impl Provisioner for FakeTerraform {
    async fn init_and_apply(&self, _options: &ProvisionOptions) -> Result<String, ProvisionError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        if self.fail_apply {
            return Err(ProvisionError::CommandFailed {
                command: "terraform apply".to_owned(),
                code: Some(1),
                stderr: "Error: googleapi: Error 403".to_owned(),
            });
        }
        Ok("Apply complete!".to_owned())
    }

    async fn destroy(&self, _options: &ProvisionOptions) -> Result<String, ProvisionError> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        Ok("Destroy complete!".to_owned())
    }

    async fn output(&self, options: &ProvisionOptions, key: &str) -> Result<String, ProvisionError> {
        self.outputs(options)
            .await?
            .remove(key)
            .ok_or_else(|| ProvisionError::OutputNotFound(key.to_owned()))
    }

    async fn outputs(
        &self,
        _options: &ProvisionOptions,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        Ok([
            ("master_instance_name", "pg-inst"),
            ("master_ip_addresses", "[{\"type\":\"PRIVATE\",\"ip\":\"10.1.0.3\"}]"),
            ("master_private_ip", "10.1.0.3"),
            ("db_name", "test_postgres"),
            ("master_proxy_connection", self.proxy.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect())
    }
}

fn config_in(dir: &TempDir) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.builtin.module_dir = dir.path().to_path_buf();
    config
}

fn args() -> RunArgs {
    RunArgs {
        cases: Vec::new(),
        skip: Vec::new(),
    }
}

#[tokio::test]
async fn test_run_all_pass() {
    let dir = TempDir::new().expect("temp dir");
    let fake = Arc::new(FakeTerraform::new("my-gcp-project:asia-northeast1:pg-inst"));

    let summary = run_with(args(), &config_in(&dir), Arc::clone(&fake), StageSelection::all())
        .await
        .expect("run should complete");

    assert!(summary.passed());
    assert_eq!(summary.report.methods_passed, 1);
    assert!(summary.summary_text.contains("TEST STATUS : PASS"));
    assert_eq!(fake.applies.load(Ordering::SeqCst), 1);
    assert_eq!(fake.destroys.load(Ordering::SeqCst), 1);
    assert!(summary.into_result().is_ok());
}

#[tokio::test]
async fn test_run_proxy_mismatch_fails_with_exit_code_1() {
    let dir = TempDir::new().expect("temp dir");
    let fake = Arc::new(FakeTerraform::new("wrong:region:pg-inst"));

    let summary = run_with(args(), &config_in(&dir), Arc::clone(&fake), StageSelection::all())
        .await
        .expect("run should complete");

    assert_eq!(summary.report.methods_failed, 1);
    assert_eq!(fake.destroys.load(Ordering::SeqCst), 1);
    let err = summary.into_result().unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_run_deploy_error_aborts() {
    let dir = TempDir::new().expect("temp dir");
    let fake = Arc::new(FakeTerraform {
        fail_apply: true,
        ..FakeTerraform::new("unused")
    });

    let summary = run_with(args(), &config_in(&dir), Arc::clone(&fake), StageSelection::all())
        .await
        .expect("run should complete");

    let abort = summary.aborted.as_ref().expect("run should be aborted");
    assert_eq!(abort.case, "Deploying SQL module");
    assert!(abort.error.contains("403"));
    assert_eq!(summary.report.methods, 0);
    assert_eq!(fake.destroys.load(Ordering::SeqCst), 1);
    assert!(matches!(summary.into_result(), Err(CliError::TestsFailed(_))));
}

#[tokio::test]
async fn test_run_selected_unknown_case_aborts() {
    let dir = TempDir::new().expect("temp dir");
    let fake = Arc::new(FakeTerraform::new("unused"));
    let run_args = RunArgs {
        cases: vec!["no such case".to_owned()],
        skip: Vec::new(),
    };

    let summary = run_with(run_args, &config_in(&dir), Arc::clone(&fake), StageSelection::all())
        .await
        .expect("run should complete");

    assert!(summary.aborted.is_some());
    assert_eq!(fake.applies.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_skip_deploy_and_destroy_reuses_saved_options() {
    let dir = TempDir::new().expect("temp dir");
    let config = config_in(&dir);
    let fake = Arc::new(FakeTerraform::new("my-gcp-project:asia-northeast1:pg-inst"));

    // 1st run: deploy + verify, keep infrastructure
    let first = RunArgs {
        cases: Vec::new(),
        skip: vec![Stage::Destroy],
    };
    run_with(first, &config, Arc::clone(&fake), StageSelection::all())
        .await
        .expect("first run");

    // 2nd run: destroy only
    let second = RunArgs {
        cases: Vec::new(),
        skip: vec![Stage::Deploy, Stage::Verify],
    };
    let summary = run_with(second, &config, Arc::clone(&fake), StageSelection::all())
        .await
        .expect("second run");

    assert!(summary.passed());
    assert_eq!(fake.applies.load(Ordering::SeqCst), 1);
    assert_eq!(fake.destroys.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_invalid_config_is_config_error() {
    let toml = r#"
[[cases]]
name = "custom"
module_dir = "x"
checks = ["not_a_check"]
"#;
    let config = HarnessConfig::parse(toml).expect("should parse");
    let fake = Arc::new(FakeTerraform::new("unused"));

    let err = run_with(args(), &config, fake, StageSelection::all()).await.unwrap_err();

    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
#[serial]
async fn test_run_honours_skip_env_vars() {
    let dir = TempDir::new().expect("temp dir");
    let fake = Arc::new(FakeTerraform::new("my-gcp-project:asia-northeast1:pg-inst"));

    // SAFETY: serial test; no other test in this binary reads SKIP_* concurrently.
    unsafe { std::env::set_var("SKIP_destroy", "1") };
    let stages = StageSelection::from_env();
    unsafe { std::env::remove_var("SKIP_destroy") };

    let summary = run_with(args(), &config_in(&dir), Arc::clone(&fake), stages)
        .await
        .expect("run should complete");

    assert!(summary.passed());
    assert_eq!(fake.applies.load(Ordering::SeqCst), 1);
    assert_eq!(fake.destroys.load(Ordering::SeqCst), 0);
}
