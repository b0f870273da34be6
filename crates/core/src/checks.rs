//! 검사 함수 — 배포된 인프라의 출력값을 읽어 기대값과 비교
//!
//! 검사 함수는 [`CheckContext`]를 받아 변수와 출력값을 조회하고
//! `assert_*`로 관계를 검증합니다. 실패한 assert는 컨텍스트에 기록되고
//! 검사는 계속 진행됩니다 (`ERROR`). 필요한 값이 없으면
//! [`CheckError::Halt`]로 현재 케이스의 남은 검사를 건너뜁니다 (`FATAL`).
//!
//! # 사용 예시
//! ```
//! use tfprobe_core::checks::{CheckContext, CheckDescriptor, CheckError};
//!
//! fn db_name_matches(ctx: &mut CheckContext<'_>) -> Result<(), CheckError> {
//!     let expected = ctx.var("db_name")?;
//!     let actual = ctx.output("db_name")?;
//!     ctx.assert_eq(&expected, &actual, "db_name output must match the input variable");
//!     Ok(())
//! }
//!
//! const DB_NAME_MATCHES: CheckDescriptor = CheckDescriptor::new("db_name_matches", db_name_matches);
//! ```

use std::collections::BTreeMap;
use std::panic::Location;

use serde::Serialize;
use tracing::{error, info};

use crate::provisioner::ProvisionOptions;
use crate::trace::{CallSite, Severity};
use crate::types::render_value;

/// 검사 함수 시그니처
pub type CheckFn = fn(&mut CheckContext<'_>) -> Result<(), CheckError>;

/// 이름이 붙은 검사 함수
#[derive(Debug, Clone, Copy)]
pub struct CheckDescriptor {
    /// 검사 이름 (설정 파일에서 참조)
    pub name: &'static str,
    /// 검사 함수
    pub run: CheckFn,
}

impl CheckDescriptor {
    pub const fn new(name: &'static str, run: CheckFn) -> Self {
        Self { name, run }
    }
}

/// assert 외의 검사 중단 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// 즉시 실패: 현재 케이스의 남은 검사를 건너뛰고 정상 반환
    #[error("{0}")]
    Halt(String),
    /// 치명적 실패: 케이스를 중단하고 실행 전체를 중단
    #[error("{0}")]
    Fatal(String),
}

/// 기록된 assert 실패
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionFailure {
    pub site: CallSite,
    pub message: String,
}

/// 검사 함수 하나의 실행 컨텍스트
///
/// 검사마다 새로 만들어지므로 이전 검사의 실패 기록이 섞이지 않습니다.
pub struct CheckContext<'a> {
    name: &'static str,
    options: &'a ProvisionOptions,
    outputs: &'a BTreeMap<String, String>,
    failures: Vec<AssertionFailure>,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        name: &'static str,
        options: &'a ProvisionOptions,
        outputs: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            name,
            options,
            outputs,
            failures: Vec::new(),
        }
    }

    /// 검사 이름
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 저장된 프로비저닝 옵션
    pub fn options(&self) -> &ProvisionOptions {
        self.options
    }

    /// 입력 변수를 문자열로 조회합니다. 없으면 즉시 실패입니다.
    pub fn var(&self, key: &str) -> Result<String, CheckError> {
        self.options
            .vars
            .get(key)
            .map(render_value)
            .ok_or_else(|| CheckError::Halt(format!("variable '{key}' is not set")))
    }

    /// terraform 출력값을 조회합니다. 없으면 즉시 실패입니다.
    pub fn output(&self, key: &str) -> Result<String, CheckError> {
        self.outputs
            .get(key)
            .cloned()
            .ok_or_else(|| CheckError::Halt(format!("output '{key}' not found")))
    }

    /// 두 값이 같은지 검증합니다.
    #[track_caller]
    pub fn assert_eq(&mut self, expected: &str, actual: &str, msg: &str) -> bool {
        if expected == actual {
            return true;
        }
        self.record(
            Location::caller(),
            format!("{msg}: expected {expected:?}, actual {actual:?}"),
        );
        false
    }

    /// `haystack`이 `needle`을 포함하는지 검증합니다.
    #[track_caller]
    pub fn assert_contains(&mut self, haystack: &str, needle: &str, msg: &str) -> bool {
        if haystack.contains(needle) {
            return true;
        }
        self.record(
            Location::caller(),
            format!("{msg}: {haystack:?} does not contain {needle:?}"),
        );
        false
    }

    /// 지금까지 기록된 assert 실패
    pub fn failures(&self) -> &[AssertionFailure] {
        &self.failures
    }

    /// assert 실패가 하나라도 있었는지
    pub fn has_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record(&mut self, location: &Location<'_>, message: String) {
        let site = CallSite::new(self.name, location.line());
        error!(check = self.name, "Failure trace: {site}");
        error!(check = self.name, "{}: {message}", Severity::Error);
        self.failures.push(AssertionFailure { site, message });
    }
}

/// Cloud SQL Postgres 인스턴스 존재 및 연결 정보 검증
///
/// - `master_ip_addresses`에 `PRIVATE`와 `master_private_ip`가 포함되어야 함
/// - `db_name` 출력이 입력 변수와 같아야 함
/// - `master_proxy_connection`이 `project:region:instance` 형식이어야 함
pub fn postgres_existence(ctx: &mut CheckContext<'_>) -> Result<(), CheckError> {
    info!(check = ctx.name(), "Test Method Name: postgres_existence");

    let region = ctx.var("region")?;
    let project = ctx.var("project")?;
    let db_name = ctx.var("db_name")?;

    let instance_name = ctx.output("master_instance_name")?;
    let ip_addresses = ctx.output("master_ip_addresses")?;
    let private_ip = ctx.output("master_private_ip")?;

    ctx.assert_contains(
        &ip_addresses,
        "PRIVATE",
        "IP Addresses output has to contain 'PRIVATE'",
    );
    ctx.assert_contains(
        &ip_addresses,
        &private_ip,
        "IP Addresses output has to contain 'private_ip' from output",
    );

    let db_name_output = ctx.output("db_name")?;
    let proxy_connection = ctx.output("master_proxy_connection")?;

    let expected_connection = format!("{project}:{region}:{instance_name}");

    ctx.assert_eq(&db_name, &db_name_output, "db_name output mismatch");
    ctx.assert_eq(
        &expected_connection,
        &proxy_connection,
        "master_proxy_connection output mismatch",
    );
    Ok(())
}

pub const POSTGRES_EXISTENCE: CheckDescriptor =
    CheckDescriptor::new("postgres_existence", postgres_existence);

/// 설정 파일에서 이름으로 참조할 수 있는 검사 함수 목록
pub fn catalogue() -> &'static [CheckDescriptor] {
    &[POSTGRES_EXISTENCE]
}

/// 카탈로그에서 이름으로 검사 함수를 찾습니다.
pub fn find(name: &str) -> Option<CheckDescriptor> {
    catalogue().iter().find(|c| c.name == name).copied()
}
