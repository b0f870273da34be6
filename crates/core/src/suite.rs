//! 스위트 러너
//!
//! 레지스트리의 스위트를 순서대로 실행합니다. 케이스가 치명적으로 실패하면
//! 남은 케이스와 스위트를 건너뛰고 [`RunOutcome::Aborted`]를 반환합니다.

use tracing::{error, info};

use crate::checks::CheckDescriptor;
use crate::counters::Counters;
use crate::error::HarnessError;
use crate::lifecycle::LifecycleRunner;
use crate::provisioner::Provisioner;
use crate::registry::Registry;
use crate::types::SuiteDef;

/// 전체 실행 결과
#[derive(Debug)]
pub enum RunOutcome {
    /// 모든 스위트를 끝까지 실행
    Completed,
    /// 치명적 실패로 중단
    Aborted {
        /// 중단을 일으킨 케이스 이름
        case: String,
        error: HarnessError,
    },
}

impl RunOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// 스위트 러너
pub struct SuiteRunner<'r, P: Provisioner> {
    registry: &'r Registry,
    lifecycle: LifecycleRunner<P>,
}

impl<'r, P: Provisioner> SuiteRunner<'r, P> {
    pub fn new(registry: &'r Registry, lifecycle: LifecycleRunner<P>) -> Self {
        Self {
            registry,
            lifecycle,
        }
    }

    /// 레지스트리의 모든 스위트를 실행합니다.
    pub async fn run_all(&self, acc: &mut Counters) -> RunOutcome {
        self.run_suites(self.registry.suites(), acc).await
    }

    /// 주어진 스위트들을 순서대로 실행합니다.
    pub async fn run_suites(&self, suites: &[SuiteDef], acc: &mut Counters) -> RunOutcome {
        for suite in suites {
            let outcome = self.run_suite(suite, acc).await;
            if outcome.is_aborted() {
                return outcome;
            }
        }
        RunOutcome::Completed
    }

    /// 스위트 하나를 실행합니다.
    pub async fn run_suite(&self, suite: &SuiteDef, acc: &mut Counters) -> RunOutcome {
        let suite_no = acc.record_suite_start();
        info!(suite = suite_no, "START TEST SUITE {suite_no}: {}", suite.description);

        let global_checks: &[CheckDescriptor] = self.registry.global_checks();
        for name in &suite.cases {
            let case = match self.registry.lookup(name) {
                Ok(case) => self.registry.apply_defaults(case),
                Err(e) => {
                    error!(suite = suite_no, case = %name, error = %e, "test case lookup failed");
                    acc.mark_failed();
                    return self.abort(suite_no, name, e);
                }
            };

            let outcome = self.lifecycle.run_case(&case, global_checks, acc).await;
            if let Some(err) = outcome.into_fatal() {
                return self.abort(suite_no, name, err);
            }
        }

        info!(
            suite = suite_no,
            cases = acc.cases_in_suite(),
            "END TEST SUITE {suite_no}"
        );
        RunOutcome::Completed
    }

    fn abort(&self, suite_no: usize, case: &str, error: HarnessError) -> RunOutcome {
        error!(
            suite = suite_no,
            case = case,
            error = %error,
            "After Test Suite: aborting run, remaining cases are skipped"
        );
        info!(suite = suite_no, "END TEST SUITE {suite_no}");
        RunOutcome::Aborted {
            case: case.to_owned(),
            error,
        }
    }
}
