//! 에러 타입 — 도메인별 에러 정의

use crate::types::Stage;

/// tfprobe 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 프로비저닝 도구 호출 에러
    #[error("provision error: {0}")]
    Provision(#[from] ProvisionError),

    /// 프로비저닝 옵션 저장/로드 에러
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// 모듈 픽스처 준비 에러
    #[error("fixture error: {0}")]
    Fixture(#[from] FixtureError),

    /// 레지스트리에 없는 테스트 케이스
    #[error("unknown test case: {0}")]
    UnknownCase(String),

    /// 검사 함수가 치명적 실패를 보고했거나 panic 발생
    #[error("check '{check}' aborted the run: {reason}")]
    CheckAborted { check: String, reason: String },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 프로비저닝 도구(terraform) 호출 에러
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// 프로세스 실행 자체가 실패 (바이너리 없음 등)
    #[error("failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    /// 프로세스가 0이 아닌 코드로 종료
    #[error("'{command}' exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// 출력값을 찾을 수 없음
    #[error("output '{0}' not found")]
    OutputNotFound(String),

    /// 출력 JSON 파싱 실패
    #[error("failed to parse terraform output: {0}")]
    OutputParse(String),
}

/// 프로비저닝 옵션 저장/로드 에러
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// 저장된 옵션 파일이 없음
    #[error("no saved provisioning options at {path}")]
    NotFound { path: String },

    /// 직렬화/역직렬화 실패
    #[error("failed to (de)serialize provisioning options at {path}: {reason}")]
    Serde { path: String, reason: String },

    /// 파일 I/O 실패
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 모듈 픽스처 준비 에러
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// 일반 파일이 아님
    #[error("non-regular file: {path}")]
    NotRegular { path: String },

    /// 모듈 파일에 `source` 라인이 없음
    #[error("no 'source' line in {path}")]
    NoSourceLine { path: String },

    /// 파일 I/O 실패
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 스테이지 실패를 사람이 읽을 수 있게 요약합니다.
pub fn stage_failure_message(stage: Stage) -> String {
    format!("The test has failed in the {stage} stage. The test will end now")
}
