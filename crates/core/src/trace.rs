//! 실패 호출 위치 추적과 심각도별 실패 로깅
//!
//! 모든 실패는 호출 위치(`Function: <path> Line: <n>`)와 함께
//! 심각도 접두어(`PANIC`/`ERROR`/`FATAL`)가 붙은 메시지로 기록됩니다.

use std::fmt;

use serde::Serialize;
use tracing::error;

/// 실패가 발생한 호출 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallSite {
    /// 함수(또는 모듈/검사) 경로
    pub function: &'static str,
    /// 라인 번호
    pub line: u32,
}

impl CallSite {
    /// 새 호출 위치를 만듭니다.
    pub const fn new(function: &'static str, line: u32) -> Self {
        Self { function, line }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function: {} Line: {}", self.function, self.line)
    }
}

/// 현재 위치의 [`CallSite`]를 만듭니다.
#[macro_export]
macro_rules! where_am_i {
    () => {
        $crate::trace::CallSite::new(module_path!(), line!())
    };
}

/// 실패 심각도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// 배포/제거 실패 등 치명적 실패: 케이스와 실행 전체를 중단
    Panic,
    /// 복구 가능한 검사 실패: 기록 후 계속
    Error,
    /// 즉시 실패: 현재 케이스만 중단하고 정상 반환
    Fatal,
}

impl Severity {
    /// 로그 접두어
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Panic => "PANIC",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// 실패를 호출 위치와 함께 기록합니다.
pub fn log_failure(severity: Severity, site: CallSite, message: &str, cause: &dyn fmt::Display) {
    error!(trace = %site, "Failure trace: {site}");
    error!(severity = severity.prefix(), "{severity}: {message}: {cause}");
}
