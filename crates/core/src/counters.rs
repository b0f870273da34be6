//! 실행 결과 누적기 — 스위트/케이스/메서드 카운터와 최종 요약
//!
//! [`Counters`]는 실행마다 0으로 시작해 스테이지 경계에서 증가만 하고,
//! 실행 끝에 한 번 [`Counters::summarize`]로 읽힙니다. 전역 상태 대신
//! 러너에 `&mut`로 전달됩니다.

use std::fmt::Write as _;

use serde::Serialize;
use uuid::Uuid;

const RULE: &str =
    "=============================================================================================";

/// 실행 결과 누적기
#[derive(Debug, Clone)]
pub struct Counters {
    run_id: Uuid,
    suites: usize,
    cases: usize,
    methods: usize,
    methods_passed: usize,
    methods_failed: usize,
    cases_in_suite: usize,
    methods_in_case: usize,
    failed: bool,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    /// 0으로 초기화된 누적기를 만듭니다.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suites: 0,
            cases: 0,
            methods: 0,
            methods_passed: 0,
            methods_failed: 0,
            cases_in_suite: 0,
            methods_in_case: 0,
            failed: false,
        }
    }

    /// 스위트 시작: 스위트 번호를 반환합니다.
    pub fn record_suite_start(&mut self) -> usize {
        self.suites += 1;
        self.cases_in_suite = 0;
        self.suites
    }

    /// 케이스 시작: 스위트 내 케이스 번호를 반환합니다.
    pub fn record_case_start(&mut self) -> usize {
        self.cases += 1;
        self.cases_in_suite += 1;
        self.methods_in_case = 0;
        self.cases_in_suite
    }

    /// 검사 메서드 시작: 케이스 내 메서드 번호를 반환합니다.
    pub fn record_method_start(&mut self) -> usize {
        self.methods += 1;
        self.methods_in_case += 1;
        self.methods_in_case
    }

    /// 검사 메서드 종료: 실패 여부에 따라 통과/실패 카운터를 올립니다.
    pub fn record_method_end(&mut self, failed: bool) {
        if failed {
            self.methods_failed += 1;
            self.failed = true;
        } else {
            self.methods_passed += 1;
        }
    }

    /// 메서드 외부의 실패(배포/제거 실패, 즉시 실패)를 기록합니다.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// 실행 식별자
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn suites(&self) -> usize {
        self.suites
    }

    pub fn cases(&self) -> usize {
        self.cases
    }

    pub fn methods(&self) -> usize {
        self.methods
    }

    pub fn methods_passed(&self) -> usize {
        self.methods_passed
    }

    pub fn methods_failed(&self) -> usize {
        self.methods_failed
    }

    /// 현재 스위트에서 시작한 케이스 수
    pub fn cases_in_suite(&self) -> usize {
        self.cases_in_suite
    }

    /// 현재 케이스에서 시작한 메서드 수
    pub fn methods_in_case(&self) -> usize {
        self.methods_in_case
    }

    /// 모든 메서드가 통과했고 치명적 실패가 없었는지
    pub fn passed(&self) -> bool {
        !self.failed && self.methods_failed == 0
    }

    /// 최종 판정 문자열 (`PASS` / `FAIL`)
    pub fn status(&self) -> &'static str {
        if self.passed() { "PASS" } else { "FAIL" }
    }

    /// 고정 형식의 요약 보고서를 만듭니다. 상태를 바꾸지 않습니다.
    pub fn summarize(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out);
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "TOTAL TEST SUITES : {}", self.suites);
        let _ = writeln!(out, "TOTAL TEST CASES : {}", self.cases);
        let _ = writeln!(out, "TOTAL TEST METHODS : {}", self.methods);
        let _ = writeln!(out, "TOTAL TEST METHODS PASS : {}", self.methods_passed);
        let _ = writeln!(out, "TOTAL TEST METHODS FAIL : {}", self.methods_failed);
        let _ = writeln!(out);
        let _ = writeln!(out, "TEST STATUS : {}", self.status());
        let _ = writeln!(out, "{RULE}");
        out
    }

    /// JSON 출력용 스냅샷
    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            suites: self.suites,
            cases: self.cases,
            methods: self.methods,
            methods_passed: self.methods_passed,
            methods_failed: self.methods_failed,
            status: self.status().to_owned(),
        }
    }
}

/// 직렬화 가능한 실행 결과 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub suites: usize,
    pub cases: usize,
    pub methods: usize,
    pub methods_passed: usize,
    pub methods_failed: usize,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_counters_are_zero_and_passing() {
        let c = Counters::new();
        assert_eq!(c.suites(), 0);
        assert_eq!(c.cases(), 0);
        assert_eq!(c.methods(), 0);
        assert!(c.passed());
        assert_eq!(c.status(), "PASS");
    }

    #[test]
    fn method_end_classifies_pass_and_fail() {
        let mut c = Counters::new();
        c.record_suite_start();
        c.record_case_start();
        c.record_method_start();
        c.record_method_end(false);
        c.record_method_start();
        c.record_method_end(true);
        assert_eq!(c.methods(), 2);
        assert_eq!(c.methods_passed(), 1);
        assert_eq!(c.methods_failed(), 1);
        assert_eq!(c.methods_passed() + c.methods_failed(), c.methods());
        assert_eq!(c.status(), "FAIL");
    }

    #[test]
    fn scope_counters_reset_per_scope() {
        let mut c = Counters::new();
        c.record_suite_start();
        assert_eq!(c.record_case_start(), 1);
        assert_eq!(c.record_method_start(), 1);
        assert_eq!(c.record_method_start(), 2);
        assert_eq!(c.record_case_start(), 2);
        assert_eq!(c.methods_in_case(), 0);
        assert_eq!(c.record_suite_start(), 2);
        assert_eq!(c.cases_in_suite(), 0);
        // 전체 카운터는 리셋되지 않음
        assert_eq!(c.cases(), 2);
        assert_eq!(c.methods(), 2);
    }

    #[test]
    fn mark_failed_fails_run_without_methods() {
        let mut c = Counters::new();
        c.mark_failed();
        assert!(!c.passed());
        assert_eq!(c.methods_failed(), 0);
    }

    #[test]
    fn summarize_is_idempotent() {
        let mut c = Counters::new();
        c.record_suite_start();
        c.record_case_start();
        c.record_method_start();
        c.record_method_end(false);
        let first = c.summarize();
        let second = c.summarize();
        assert_eq!(first, second);
        assert!(first.contains("TOTAL TEST SUITES : 1"));
        assert!(first.contains("TOTAL TEST METHODS PASS : 1"));
        assert!(first.contains("TEST STATUS : PASS"));
    }

    #[test]
    fn report_mirrors_counters() {
        let mut c = Counters::new();
        c.record_suite_start();
        c.record_case_start();
        c.record_method_start();
        c.record_method_end(true);
        let report = c.report();
        assert_eq!(report.run_id, c.run_id());
        assert_eq!(report.methods_failed, 1);
        assert_eq!(report.status, "FAIL");
    }
}
