//! 도메인 타입 — 테스트 케이스, 스위트, 스테이지

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checks::CheckDescriptor;

/// 모듈 입력 변수 맵 (`-var key=value`로 전달됨)
pub type Vars = BTreeMap<String, serde_json::Value>;

/// 변수/출력 값을 문자열로 렌더링합니다.
///
/// 문자열은 따옴표 없이 그대로, 그 외 값은 compact JSON으로 표현합니다.
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 테스트 케이스 라이프사이클의 스테이지
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// 인프라 배포 (init + apply)
    Deploy,
    /// 검사 함수 실행
    Verify,
    /// 인프라 제거 (destroy)
    Destroy,
}

impl Stage {
    /// 모든 스테이지 (실행 순서)
    pub const ALL: [Stage; 3] = [Stage::Deploy, Stage::Verify, Stage::Destroy];

    /// 스테이지 이름 (`SKIP_<name>` 환경변수에 사용)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Verify => "verify",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deploy" => Ok(Self::Deploy),
            "verify" => Ok(Self::Verify),
            "destroy" => Ok(Self::Destroy),
            _ => Err(format!(
                "invalid stage: {s} (expected: deploy, verify, destroy)"
            )),
        }
    }
}

/// 검사 함수 실행 여부 플래그
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFlags {
    /// 레지스트리의 전역 검사 함수 실행 여부
    pub run_global_checks: bool,
    /// 케이스 고유 검사 함수 실행 여부
    pub run_local_checks: bool,
}

impl Default for CaseFlags {
    fn default() -> Self {
        Self {
            run_global_checks: false,
            run_local_checks: true,
        }
    }
}

/// 테스트 케이스 정의
///
/// 레지스트리에 등록된 뒤에는 변경되지 않습니다. 실행 직전에
/// [`Registry::apply_defaults`](crate::registry::Registry::apply_defaults)가
/// 기본 변수를 채운 사본을 만듭니다.
#[derive(Debug, Clone)]
pub struct TestCase {
    /// 사람이 읽을 수 있는 설명
    pub description: String,
    /// terraform 작업 디렉토리 (테스트 대상 모듈 예제)
    pub module_dir: PathBuf,
    /// 입력 변수
    pub vars: Vars,
    /// 검사 함수 실행 플래그
    pub flags: CaseFlags,
    /// 케이스 고유 검사 함수 (등록 순서대로 실행)
    pub local_checks: Vec<CheckDescriptor>,
    /// 배포 전 모듈 디렉토리로 복사할 파일
    pub copy_file: Option<PathBuf>,
    /// 배포 전 `main.tf`의 첫 `source` 라인을 대체할 라인
    pub module_source: Option<String>,
    /// 배포 전 `main.tf`의 `source` 라인 뒤에 주입할 변수 라인
    pub module_vars: Vec<String>,
}

impl TestCase {
    /// 최소 정보로 케이스를 생성합니다.
    pub fn new(description: impl Into<String>, module_dir: impl Into<PathBuf>) -> Self {
        Self {
            description: description.into(),
            module_dir: module_dir.into(),
            vars: Vars::new(),
            flags: CaseFlags::default(),
            local_checks: Vec::new(),
            copy_file: None,
            module_source: None,
            module_vars: Vec::new(),
        }
    }

    /// 입력 변수를 추가합니다.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// 고유 검사 함수를 추가합니다.
    pub fn with_check(mut self, check: CheckDescriptor) -> Self {
        self.local_checks.push(check);
        self
    }

    /// 실행 플래그를 설정합니다.
    pub fn with_flags(mut self, flags: CaseFlags) -> Self {
        self.flags = flags;
        self
    }

    /// 문자열 변수 조회
    pub fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(render_value)
    }
}

/// 테스트 스위트 정의: 이름으로 참조되는 케이스들의 순서 있는 목록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteDef {
    /// 스위트 설명
    pub description: String,
    /// 실행할 케이스 이름 (순서대로)
    pub cases: Vec<String>,
}
