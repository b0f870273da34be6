//! 설정 관리 — tfprobe.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 로깅, terraform 실행, 기본 변수, 케이스/스위트 정의를
//! 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TFPROBE_DEFAULTS_PROJECT=my-project` 형식)
//! 3. 설정 파일 (`tfprobe.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tfprobe_core::error::HarnessError> {
//! use tfprobe_core::config::HarnessConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HarnessConfig::load("tfprobe.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HarnessConfig::parse("[defaults]\nregion = \"us-central1\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, HarnessError};
use crate::types::Vars;

/// tfprobe 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// terraform 실행 설정
    #[serde(default)]
    pub terraform: TerraformConfig,
    /// 모든 케이스에 주입할 기본 변수
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// 내장 케이스 설정
    #[serde(default)]
    pub builtin: BuiltinConfig,
    /// 전역 검사 설정
    #[serde(default)]
    pub global: GlobalConfig,
    /// 추가 케이스 정의
    #[serde(default)]
    pub cases: Vec<CaseConfig>,
    /// 스위트 정의 (비어 있으면 내장 스위트 사용)
    #[serde(default)]
    pub suites: Vec<SuiteConfig>,
}

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        match Self::load(path).await {
            Err(HarnessError::Config(ConfigError::FileNotFound { .. })) => {
                warn!(path = %path.display(), "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarnessError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HarnessError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HarnessError> {
        toml::from_str(toml_str).map_err(|e| {
            HarnessError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TFPROBE_{SECTION}_{FIELD}`
    /// 예: `TFPROBE_DEFAULTS_REGION=us-central1`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TFPROBE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TFPROBE_GENERAL_LOG_FORMAT");

        // Terraform
        override_string(&mut self.terraform.binary, "TFPROBE_TERRAFORM_BINARY");
        override_bool(&mut self.terraform.no_color, "TFPROBE_TERRAFORM_NO_COLOR");

        // Defaults
        override_string(&mut self.defaults.region, "TFPROBE_DEFAULTS_REGION");
        override_string(&mut self.defaults.project, "TFPROBE_DEFAULTS_PROJECT");
        override_string(&mut self.defaults.name_prefix, "TFPROBE_DEFAULTS_NAME_PREFIX");
        override_string(
            &mut self.defaults.master_user_name,
            "TFPROBE_DEFAULTS_MASTER_USER_NAME",
        );
        override_string(
            &mut self.defaults.master_user_password,
            "TFPROBE_DEFAULTS_MASTER_USER_PASSWORD",
        );

        // Builtin
        override_bool(&mut self.builtin.enabled, "TFPROBE_BUILTIN_ENABLED");
        override_path(&mut self.builtin.module_dir, "TFPROBE_BUILTIN_MODULE_DIR");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 스위트가 참조하는 케이스 이름과 케이스가 참조하는 검사 이름은
    /// 레지스트리 구성 시점에 검증됩니다.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.terraform.binary.trim().is_empty() {
            return Err(invalid("terraform.binary", "must not be empty".to_owned()));
        }

        if self.defaults.project.trim().is_empty() {
            return Err(invalid("defaults.project", "must not be empty".to_owned()));
        }
        if self.defaults.region.trim().is_empty() {
            return Err(invalid("defaults.region", "must not be empty".to_owned()));
        }

        let mut names = BTreeSet::new();
        for (i, case) in self.cases.iter().enumerate() {
            if case.name.trim().is_empty() {
                return Err(invalid(
                    &format!("cases[{i}].name"),
                    "must not be empty".to_owned(),
                ));
            }
            if case.module_dir.as_os_str().is_empty() {
                return Err(invalid(
                    &format!("cases[{i}].module_dir"),
                    "must not be empty".to_owned(),
                ));
            }
            if !names.insert(case.name.as_str()) {
                return Err(invalid(
                    &format!("cases[{i}].name"),
                    format!("duplicate case name '{}'", case.name),
                ));
            }
        }

        for (i, suite) in self.suites.iter().enumerate() {
            if suite.cases.is_empty() {
                return Err(invalid(
                    &format!("suites[{i}].cases"),
                    "a suite must list at least one case".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> HarnessError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// terraform 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    /// terraform 바이너리 경로
    pub binary: String,
    /// `-no-color` 사용 여부
    pub no_color: bool,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_owned(),
            no_color: true,
        }
    }
}

/// 케이스에 값이 없을 때 주입되는 기본 변수
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub region: String,
    pub project: String,
    pub name_prefix: String,
    pub master_user_name: String,
    pub master_user_password: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            region: "asia-northeast1".to_owned(),
            project: "my-gcp-project".to_owned(),
            name_prefix: "postgres-private".to_owned(),
            master_user_name: "admin".to_owned(),
            master_user_password: "password".to_owned(),
        }
    }
}

impl DefaultsConfig {
    /// `(변수 이름, 값)` 목록
    pub fn as_vars(&self) -> Vars {
        [
            ("region", &self.region),
            ("project", &self.project),
            ("name_prefix", &self.name_prefix),
            ("master_user_name", &self.master_user_name),
            ("master_user_password", &self.master_user_password),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), serde_json::Value::String(v.clone())))
        .collect()
    }
}

/// 내장 "Deploying SQL module" 케이스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuiltinConfig {
    /// 내장 케이스 등록 여부
    pub enabled: bool,
    /// 내장 케이스의 terraform 작업 디렉토리
    pub module_dir: PathBuf,
}

impl Default for BuiltinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            module_dir: PathBuf::from("fixtures/postgres-private-ip"),
        }
    }
}

/// 전역 검사 설정
///
/// `run_global_checks = true`인 케이스는 자신의 검사 뒤에 이 목록을 순서대로
/// 실행합니다. 이름은 레지스트리 구성 시점에 검사 카탈로그에서 찾습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub checks: Vec<String>,
}

/// 설정 파일에 정의하는 케이스
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConfig {
    /// 레지스트리 이름
    pub name: String,
    /// 설명 (없으면 이름 사용)
    #[serde(default)]
    pub description: Option<String>,
    /// terraform 작업 디렉토리
    pub module_dir: PathBuf,
    /// 입력 변수
    #[serde(default)]
    pub vars: Vars,
    /// 검사 카탈로그에서 참조할 검사 이름 (순서대로 실행)
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(default = "default_true")]
    pub run_local_checks: bool,
    #[serde(default)]
    pub run_global_checks: bool,
    /// 배포 전 모듈 디렉토리로 복사할 파일
    #[serde(default)]
    pub copy_file: Option<PathBuf>,
    /// `main.tf`의 첫 `source` 라인 대체값
    #[serde(default)]
    pub module_source: Option<String>,
    /// `main.tf` 모듈 블록에 주입할 변수 라인
    #[serde(default)]
    pub module_vars: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// 설정 파일에 정의하는 스위트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub description: String,
    pub cases: Vec<String>,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}
