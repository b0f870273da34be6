//! 테스트 케이스 라이프사이클 러너
//!
//! 케이스 하나를 `deploy → verify → destroy` 순서로 실행합니다.
//!
//! ```text
//! Init ─► Deploying ─► Verifying ─► Destroying ─► Done
//!            │  fatal       │  fatal      ▲
//!            └──────────────┴─────────────┘
//! ```
//!
//! 각 스테이지는 [`StageOutcome`]을 반환하고, 러너는 배포/검증 결과와 무관하게
//! 제거 스테이지를 정확히 한 번 실행합니다. 치명적 실패 여부는
//! [`CaseOutcome::is_fatal`]로 상위 스위트 러너에 전달됩니다.

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use ::metrics::{counter, histogram};
use tracing::{info, warn};

use crate::checks::{CheckContext, CheckDescriptor, CheckError};
use crate::counters::Counters;
use crate::error::{HarnessError, stage_failure_message};
use crate::fixture;
use crate::metrics::{
    CASES_TOTAL, LABEL_CHECK, LABEL_RESULT, LABEL_STAGE, METHODS_TOTAL, STAGE_DURATION_SECONDS,
    STAGE_FAILURES_TOTAL,
};
use crate::provisioner::{ProvisionOptions, Provisioner};
use crate::state;
use crate::trace::{Severity, log_failure};
use crate::types::{Stage, TestCase};
use crate::where_am_i;

/// 스테이지 하나의 결과
#[derive(Debug)]
pub enum StageOutcome {
    /// 성공 (건너뛴 스테이지 포함)
    Success,
    /// 하나 이상의 검사가 실패했지만 실행은 계속 가능
    CheckFailure,
    /// 치명적 실패: 케이스와 실행 전체를 중단
    Fatal(HarnessError),
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::CheckFailure => "check-failure",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// 케이스 하나의 스테이지별 결과
#[derive(Debug)]
pub struct CaseOutcome {
    pub deploy: StageOutcome,
    /// 배포가 치명적으로 실패하면 검증은 실행되지 않음
    pub verify: Option<StageOutcome>,
    pub destroy: StageOutcome,
}

impl CaseOutcome {
    /// 어느 스테이지든 치명적 실패가 있었는지
    pub fn is_fatal(&self) -> bool {
        self.fatal_error().is_some()
    }

    /// 첫 번째 치명적 실패 (deploy → verify → destroy 순)
    pub fn fatal_error(&self) -> Option<&HarnessError> {
        [Some(&self.deploy), self.verify.as_ref(), Some(&self.destroy)]
            .into_iter()
            .flatten()
            .find_map(|o| match o {
                StageOutcome::Fatal(e) => Some(e),
                _ => None,
            })
    }

    /// 첫 번째 치명적 실패를 꺼냅니다.
    pub fn into_fatal(self) -> Option<HarnessError> {
        [Some(self.deploy), self.verify, Some(self.destroy)]
            .into_iter()
            .flatten()
            .find_map(|o| match o {
                StageOutcome::Fatal(e) => Some(e),
                _ => None,
            })
    }

    /// 모든 스테이지가 성공했는지
    pub fn passed(&self) -> bool {
        self.deploy.is_success()
            && self.verify.as_ref().is_none_or(StageOutcome::is_success)
            && self.destroy.is_success()
    }
}

/// 건너뛸 스테이지 집합
///
/// 이전 실행이 저장한 옵션을 재사용해 일부 스테이지만 다시 실행할 때
/// 사용합니다 (예: 배포는 한 번만 하고 검증만 반복).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSelection {
    skipped: BTreeSet<Stage>,
}

impl StageSelection {
    /// 모든 스테이지 실행
    pub fn all() -> Self {
        Self::default()
    }

    /// 스테이지를 건너뛰도록 표시합니다.
    pub fn skip(mut self, stage: Stage) -> Self {
        self.skipped.insert(stage);
        self
    }

    /// `SKIP_deploy`, `SKIP_verify`, `SKIP_destroy` 환경변수가 비어 있지 않으면
    /// 해당 스테이지를 건너뜁니다.
    pub fn from_env() -> Self {
        Stage::ALL
            .into_iter()
            .filter(|s| {
                std::env::var(format!("SKIP_{}", s.as_str()))
                    .map(|v| !v.is_empty())
                    .unwrap_or(false)
            })
            .fold(Self::all(), Self::skip)
    }

    /// 두 선택을 합칩니다 (어느 한쪽이라도 건너뛰면 건너뜀).
    pub fn merge(mut self, other: &Self) -> Self {
        self.skipped.extend(other.skipped.iter().copied());
        self
    }

    pub fn is_skipped(&self, stage: Stage) -> bool {
        self.skipped.contains(&stage)
    }
}

/// 케이스 라이프사이클 러너
pub struct LifecycleRunner<P: Provisioner> {
    provisioner: Arc<P>,
    stages: StageSelection,
}

impl<P: Provisioner> LifecycleRunner<P> {
    pub fn new(provisioner: Arc<P>) -> Self {
        Self {
            provisioner,
            stages: StageSelection::all(),
        }
    }

    /// 건너뛸 스테이지를 설정합니다.
    pub fn with_stages(mut self, stages: StageSelection) -> Self {
        self.stages = stages;
        self
    }

    pub fn provisioner(&self) -> &Arc<P> {
        &self.provisioner
    }

    /// 케이스 하나를 실행합니다.
    ///
    /// 배포 또는 검증이 치명적으로 실패해도 제거 스테이지는 실행됩니다.
    pub async fn run_case(
        &self,
        case: &TestCase,
        global_checks: &[CheckDescriptor],
        acc: &mut Counters,
    ) -> CaseOutcome {
        let case_no = acc.record_case_start();
        counter!(CASES_TOTAL).increment(1);
        info!(
            case = case_no,
            "START TEST CASE {case_no}: {}", case.description
        );

        // 이번 실행이 배포하면 제거도 같은 옵션을 사용합니다.
        let planned = (!self.stages.is_skipped(Stage::Deploy))
            .then(|| ProvisionOptions::for_case(case));

        let deploy = self
            .timed(Stage::Deploy, self.deploy(case, planned.as_ref()))
            .await;

        let verify = if deploy.is_fatal() {
            warn!(case = case_no, "deploy failed, skipping verify stage");
            None
        } else {
            Some(
                self.timed(Stage::Verify, self.verify(case, global_checks, acc))
                    .await,
            )
        };

        let destroy = self
            .timed(Stage::Destroy, self.destroy(case, planned.as_ref()))
            .await;
        info!(case = case_no, "END TEST CASE {case_no}");

        let outcome = CaseOutcome {
            deploy,
            verify,
            destroy,
        };
        if !outcome.passed() {
            acc.mark_failed();
        }
        outcome
    }

    async fn timed(&self, stage: Stage, fut: impl Future<Output = StageOutcome>) -> StageOutcome {
        let started = Instant::now();
        let outcome = fut.await;
        let elapsed = started.elapsed();

        histogram!(STAGE_DURATION_SECONDS, LABEL_STAGE => stage.as_str())
            .record(elapsed.as_secs_f64());
        if outcome.is_fatal() {
            counter!(STAGE_FAILURES_TOTAL, LABEL_STAGE => stage.as_str()).increment(1);
        }
        info!(
            stage = stage.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            outcome = outcome.label(),
            "stage finished"
        );
        outcome
    }

    fn skipped(&self, stage: Stage) -> bool {
        if self.stages.is_skipped(stage) {
            info!(stage = stage.as_str(), "SKIP_{stage} is set, skipping stage");
            return true;
        }
        false
    }

    async fn deploy(&self, case: &TestCase, planned: Option<&ProvisionOptions>) -> StageOutcome {
        if self.skipped(Stage::Deploy) {
            return StageOutcome::Success;
        }
        let Some(options) = planned else {
            return StageOutcome::Success;
        };
        info!("Before Test Case: Deploy Terraform and load its contents to be used in the test cases");

        match self.try_deploy(case, options).await {
            Ok(()) => StageOutcome::Success,
            Err(e) => fatal(Stage::Deploy, e),
        }
    }

    /// 옵션 저장 → 픽스처 적용 → init/apply
    ///
    /// 픽스처 적용이 실패해도 저장 파일에는 이 케이스의 옵션이 남습니다.
    async fn try_deploy(
        &self,
        case: &TestCase,
        options: &ProvisionOptions,
    ) -> Result<(), HarnessError> {
        state::save(&case.module_dir, options).await?;
        fixture::prepare(case).await?;
        self.provisioner.init_and_apply(options).await?;
        Ok(())
    }

    async fn verify(
        &self,
        case: &TestCase,
        global_checks: &[CheckDescriptor],
        acc: &mut Counters,
    ) -> StageOutcome {
        if self.skipped(Stage::Verify) {
            return StageOutcome::Success;
        }

        let options = match state::load(&case.module_dir).await {
            Ok(o) => o,
            Err(e) => return fatal(Stage::Verify, e.into()),
        };
        let outputs = match self.provisioner.outputs(&options).await {
            Ok(o) => o,
            Err(e) => return fatal(Stage::Verify, e.into()),
        };

        let mut checks: Vec<CheckDescriptor> = Vec::new();
        if case.flags.run_local_checks {
            checks.extend_from_slice(&case.local_checks);
        }
        if case.flags.run_global_checks {
            checks.extend_from_slice(global_checks);
        }

        let mut outcome = StageOutcome::Success;
        for check in checks {
            let method_no = acc.record_method_start();
            info!(method = method_no, check = check.name, "** START TEST METHOD {method_no}: ");

            let mut ctx = CheckContext::new(check.name, &options, &outputs);
            let result = catch_unwind(AssertUnwindSafe(|| (check.run)(&mut ctx)));

            let (failed, stop) = match result {
                Ok(Ok(())) => (ctx.has_failed(), None),
                Ok(Err(CheckError::Halt(reason))) => {
                    log_failure(Severity::Fatal, where_am_i!(), check.name, &reason);
                    (true, Some(StageOutcome::CheckFailure))
                }
                Ok(Err(CheckError::Fatal(reason))) => {
                    (true, Some(fatal(Stage::Verify, aborted(check.name, reason))))
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    (true, Some(fatal(Stage::Verify, aborted(check.name, reason))))
                }
            };

            acc.record_method_end(failed);
            let status = if failed { "FAIL" } else { "PASS" };
            counter!(
                METHODS_TOTAL,
                LABEL_CHECK => check.name,
                LABEL_RESULT => if failed { "fail" } else { "pass" }
            )
            .increment(1);
            info!(method = method_no, check = check.name, "** END TEST METHOD {method_no} : {status}");

            if failed && outcome.is_success() {
                outcome = StageOutcome::CheckFailure;
            }
            if let Some(stop) = stop {
                return stop;
            }
        }
        outcome
    }

    async fn destroy(&self, case: &TestCase, planned: Option<&ProvisionOptions>) -> StageOutcome {
        if self.skipped(Stage::Destroy) {
            return StageOutcome::Success;
        }
        info!("After Test Case: destroy terraform and all the resources it created.");

        let result = self.try_destroy(case, planned).await;
        if let Err(e) = fixture::cleanup(case).await {
            warn!(error = %e, "failed to remove injected module variables");
        }

        match result {
            Ok(()) => StageOutcome::Success,
            Err(e) => fatal(Stage::Destroy, e),
        }
    }

    /// 배포를 건너뛴 실행만 저장된 옵션을 읽습니다.
    async fn try_destroy(
        &self,
        case: &TestCase,
        planned: Option<&ProvisionOptions>,
    ) -> Result<(), HarnessError> {
        let options = match planned {
            Some(options) => options.clone(),
            None => state::load(&case.module_dir).await?,
        };
        self.provisioner.destroy(&options).await?;
        Ok(())
    }
}

fn fatal(stage: Stage, err: HarnessError) -> StageOutcome {
    log_failure(
        Severity::Panic,
        where_am_i!(),
        &stage_failure_message(stage),
        &err,
    );
    StageOutcome::Fatal(err)
}

fn aborted(check: &str, reason: String) -> HarnessError {
    HarnessError::CheckAborted {
        check: check.to_owned(),
        reason,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "check panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::POSTGRES_EXISTENCE;
    use crate::provisioner::MockProvisioner;

    fn healthy_mock(proxy: &str) -> MockProvisioner {
        MockProvisioner::new()
            .with_output("master_instance_name", "inst-1")
            .with_output("master_ip_addresses", "PRIVATE:10.0.0.5")
            .with_output("master_private_ip", "10.0.0.5")
            .with_output("master_proxy_connection", proxy)
            .with_output("db_name", "test_postgres")
    }

    fn sql_case(dir: &std::path::Path) -> TestCase {
        TestCase::new("Deploying SQL module", dir)
            .with_var("db_name", "test_postgres")
            .with_var("region", "asia-northeast1")
            .with_var("project", "my-gcp-project")
            .with_check(POSTGRES_EXISTENCE)
    }

    fn failing_check(ctx: &mut CheckContext<'_>) -> Result<(), CheckError> {
        ctx.assert_eq("a", "b", "always fails");
        Ok(())
    }

    fn halting_check(_ctx: &mut CheckContext<'_>) -> Result<(), CheckError> {
        Err(CheckError::Halt("stop here".to_owned()))
    }

    fn panicking_check(_ctx: &mut CheckContext<'_>) -> Result<(), CheckError> {
        panic!("boom");
    }

    #[tokio::test]
    async fn passing_case_runs_all_stages_once() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("my-gcp-project:asia-northeast1:inst-1"));
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();
        acc.record_suite_start();

        let outcome = runner.run_case(&sql_case(dir.path()), &[], &mut acc).await;

        assert!(outcome.passed());
        assert_eq!(mock.apply_count(), 1);
        assert_eq!(mock.destroy_count(), 1);
        assert_eq!(acc.methods_passed(), 1);
        assert_eq!(acc.methods_failed(), 0);
        assert!(acc.passed());
    }

    #[tokio::test]
    async fn check_failure_still_destroys() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("wrong-format"));
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();

        let outcome = runner.run_case(&sql_case(dir.path()), &[], &mut acc).await;

        assert!(matches!(outcome.verify, Some(StageOutcome::CheckFailure)));
        assert!(!outcome.is_fatal());
        assert_eq!(mock.destroy_count(), 1);
        assert_eq!(acc.methods_failed(), 1);
        assert_eq!(acc.status(), "FAIL");
    }

    #[tokio::test]
    async fn deploy_failure_skips_verify_and_destroys() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("x").with_failing_apply());
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();

        let outcome = runner.run_case(&sql_case(dir.path()), &[], &mut acc).await;

        assert!(outcome.deploy.is_fatal());
        assert!(outcome.verify.is_none());
        assert!(outcome.is_fatal());
        assert_eq!(acc.methods(), 0);
        assert_eq!(mock.destroy_count(), 1);
        assert!(!acc.passed());
    }

    #[tokio::test]
    async fn panicking_check_is_fatal_but_destroys() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("x"));
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();
        let case = TestCase::new("panics", dir.path())
            .with_check(CheckDescriptor::new("panics", panicking_check))
            .with_check(CheckDescriptor::new("never_runs", failing_check));

        let outcome = runner.run_case(&case, &[], &mut acc).await;

        assert!(matches!(
            outcome.fatal_error(),
            Some(HarnessError::CheckAborted { check, reason }) if check == "panics" && reason == "boom"
        ));
        assert_eq!(acc.methods(), 1, "checks after a fatal one do not run");
        assert_eq!(acc.methods_failed(), 1);
        assert_eq!(mock.destroy_count(), 1);
    }

    #[tokio::test]
    async fn halt_stops_remaining_checks_without_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("x"));
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();
        let case = TestCase::new("halts", dir.path())
            .with_check(CheckDescriptor::new("halts", halting_check))
            .with_check(CheckDescriptor::new("skipped", failing_check));

        let outcome = runner.run_case(&case, &[], &mut acc).await;

        assert!(!outcome.is_fatal());
        assert!(matches!(outcome.verify, Some(StageOutcome::CheckFailure)));
        assert_eq!(acc.methods(), 1);
        assert_eq!(mock.destroy_count(), 1);
    }

    #[tokio::test]
    async fn global_checks_run_after_local_when_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("my-gcp-project:asia-northeast1:inst-1"));
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();
        let mut case = sql_case(dir.path());
        case.flags.run_global_checks = true;
        let globals = [CheckDescriptor::new("global_fail", failing_check)];

        runner.run_case(&case, &globals, &mut acc).await;

        assert_eq!(acc.methods(), 2);
        assert_eq!(acc.methods_passed(), 1);
        assert_eq!(acc.methods_failed(), 1);
    }

    #[tokio::test]
    async fn local_checks_disabled_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("x"));
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();
        let mut case = sql_case(dir.path());
        case.flags.run_local_checks = false;

        let outcome = runner.run_case(&case, &[], &mut acc).await;

        assert!(outcome.passed());
        assert_eq!(acc.methods(), 0);
    }

    #[tokio::test]
    async fn destroy_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("my-gcp-project:asia-northeast1:inst-1").with_failing_destroy());
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();

        let outcome = runner.run_case(&sql_case(dir.path()), &[], &mut acc).await;

        assert!(outcome.destroy.is_fatal());
        assert_eq!(acc.methods_passed(), 1);
        assert!(!acc.passed());
    }

    #[tokio::test]
    async fn skipped_deploy_reuses_saved_options() {
        let dir = tempfile::tempdir().unwrap();
        let case = sql_case(dir.path());
        state::save(dir.path(), &ProvisionOptions::for_case(&case))
            .await
            .unwrap();

        let mock = Arc::new(healthy_mock("my-gcp-project:asia-northeast1:inst-1"));
        let runner = LifecycleRunner::new(Arc::clone(&mock))
            .with_stages(StageSelection::all().skip(Stage::Deploy).skip(Stage::Destroy));
        let mut acc = Counters::new();

        let outcome = runner.run_case(&case, &[], &mut acc).await;

        assert!(outcome.passed());
        assert_eq!(mock.apply_count(), 0);
        assert_eq!(mock.destroy_count(), 0);
        assert_eq!(acc.methods_passed(), 1);
    }

    #[tokio::test]
    async fn skipped_deploy_without_saved_options_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(healthy_mock("x"));
        let runner = LifecycleRunner::new(Arc::clone(&mock))
            .with_stages(StageSelection::all().skip(Stage::Deploy));
        let mut acc = Counters::new();

        let outcome = runner.run_case(&sql_case(dir.path()), &[], &mut acc).await;

        assert!(matches!(outcome.verify, Some(StageOutcome::Fatal(HarnessError::State(_)))));
        assert!(outcome.destroy.is_fatal());
    }

    #[tokio::test]
    async fn failed_fixture_destroys_with_own_options() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(fixture::MODULE_FILE), "locals {}\n").unwrap();
        let mock = Arc::new(healthy_mock("project-a:asia-northeast1:inst-1"));
        let runner = LifecycleRunner::new(Arc::clone(&mock));
        let mut acc = Counters::new();

        let first = sql_case(dir.path()).with_var("project", "project-a");
        assert!(runner.run_case(&first, &[], &mut acc).await.passed());

        // main.tf에 source 라인이 없어 변수 주입이 실패
        let mut second = sql_case(dir.path()).with_var("project", "project-b");
        second.module_vars = vec!["  deletion_protection = false".to_owned()];
        let outcome = runner.run_case(&second, &[], &mut acc).await;

        assert!(matches!(outcome.deploy, StageOutcome::Fatal(HarnessError::Fixture(_))));
        assert!(outcome.destroy.is_success());
        assert_eq!(mock.apply_count(), 1);
        assert_eq!(mock.destroy_count(), 2);
        let destroyed = mock.last_destroyed().expect("destroy options");
        assert_eq!(
            destroyed.env_vars.get("GOOGLE_PROJECT").map(String::as_str),
            Some("project-b")
        );
        let saved = state::load(dir.path()).await.unwrap();
        assert_eq!(saved, ProvisionOptions::for_case(&second));
    }

    #[test]
    fn stage_selection_merge() {
        let a = StageSelection::all().skip(Stage::Deploy);
        let b = StageSelection::all().skip(Stage::Destroy);
        let merged = a.merge(&b);
        assert!(merged.is_skipped(Stage::Deploy));
        assert!(merged.is_skipped(Stage::Destroy));
        assert!(!merged.is_skipped(Stage::Verify));
    }

    #[test]
    #[serial_test::serial]
    fn stage_selection_from_env() {
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("SKIP_verify", "true") };
        let selection = StageSelection::from_env();
        unsafe { std::env::remove_var("SKIP_verify") };
        assert!(selection.is_skipped(Stage::Verify));
        assert!(!selection.is_skipped(Stage::Deploy));
    }
}
