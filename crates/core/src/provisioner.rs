//! 프로비저닝 도구 추상화
//!
//! [`Provisioner`] trait은 terraform 호출을 추상화하여, 실제 실행에는
//! [`TerraformCli`]를, 테스트에는 `MockProvisioner`를 사용할 수 있게 합니다.
//!
//! ```text
//!  LifecycleRunner
//!        │
//!        ▼
//!   Provisioner (trait)
//!      │        │
//!      ▼        ▼
//! TerraformCli  Mock
//!      │
//!      ▼
//!  terraform 바이너리
//! ```
//!
//! 호출은 블로킹 의미로 순차 실행되며 이 계층은 타임아웃을 두지 않습니다.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::ProvisionError;
use crate::types::{TestCase, Vars, render_value};

/// terraform apply/destroy에 필요한 옵션
///
/// 배포 스테이지에서 저장되고 검증/제거 스테이지에서 다시 로드됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionOptions {
    /// terraform 작업 디렉토리
    pub working_dir: PathBuf,
    /// 입력 변수
    #[serde(default)]
    pub vars: Vars,
    /// 프로세스 환경변수
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
}

impl ProvisionOptions {
    /// 테스트 케이스로부터 옵션을 만듭니다.
    ///
    /// `project` 변수가 있으면 `GOOGLE_PROJECT` 환경변수로도 전달합니다.
    pub fn for_case(case: &TestCase) -> Self {
        let mut env_vars = BTreeMap::new();
        if let Some(project) = case.var("project") {
            env_vars.insert("GOOGLE_PROJECT".to_owned(), project);
        }
        Self {
            working_dir: case.module_dir.clone(),
            vars: case.vars.clone(),
            env_vars,
        }
    }

    /// `-var key=value` 인자 목록
    pub fn var_args(&self) -> Vec<String> {
        self.vars
            .iter()
            .flat_map(|(k, v)| ["-var".to_owned(), format!("{k}={}", render_value(v))])
            .collect()
    }
}

/// 프로비저닝 도구 호출 trait
///
/// 구현체는 `Send + Sync + 'static`이어야 하며 `Arc`로 공유됩니다.
pub trait Provisioner: Send + Sync + 'static {
    /// `init` 후 `apply`를 실행하고 apply의 표준 출력을 반환합니다.
    fn init_and_apply(
        &self,
        options: &ProvisionOptions,
    ) -> impl Future<Output = Result<String, ProvisionError>> + Send;

    /// `destroy`를 실행하고 표준 출력을 반환합니다.
    fn destroy(
        &self,
        options: &ProvisionOptions,
    ) -> impl Future<Output = Result<String, ProvisionError>> + Send;

    /// 출력값 하나를 문자열로 조회합니다.
    fn output(
        &self,
        options: &ProvisionOptions,
        key: &str,
    ) -> impl Future<Output = Result<String, ProvisionError>> + Send;

    /// 모든 출력값을 조회합니다.
    fn outputs(
        &self,
        options: &ProvisionOptions,
    ) -> impl Future<Output = Result<BTreeMap<String, String>, ProvisionError>> + Send;
}

/// `terraform` 바이너리를 실행하는 프로덕션 구현
#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: PathBuf,
    no_color: bool,
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new("terraform")
    }
}

impl TerraformCli {
    /// 지정한 바이너리로 클라이언트를 만듭니다.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            no_color: true,
        }
    }

    /// `-no-color` 플래그 사용 여부를 설정합니다.
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// 실행할 바이너리 경로
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn color_args(&self) -> Vec<String> {
        if self.no_color {
            vec!["-no-color".to_owned()]
        } else {
            Vec::new()
        }
    }

    async fn run(&self, options: &ProvisionOptions, args: Vec<String>) -> Result<String, ProvisionError> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));
        debug!(dir = %options.working_dir.display(), command = %command, "running terraform");

        let out = Command::new(&self.binary)
            .args(&args)
            .current_dir(&options.working_dir)
            .envs(&options.env_vars)
            .output()
            .await
            .map_err(|e| ProvisionError::Spawn {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !out.status.success() {
            return Err(ProvisionError::CommandFailed {
                command,
                code: out.status.code(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

impl Provisioner for TerraformCli {
    async fn init_and_apply(&self, options: &ProvisionOptions) -> Result<String, ProvisionError> {
        let mut init = vec!["init".to_owned(), "-input=false".to_owned()];
        init.extend(self.color_args());
        self.run(options, init).await?;

        let mut apply = vec![
            "apply".to_owned(),
            "-input=false".to_owned(),
            "-auto-approve".to_owned(),
        ];
        apply.extend(self.color_args());
        apply.extend(options.var_args());
        self.run(options, apply).await
    }

    async fn destroy(&self, options: &ProvisionOptions) -> Result<String, ProvisionError> {
        let mut args = vec![
            "destroy".to_owned(),
            "-input=false".to_owned(),
            "-auto-approve".to_owned(),
        ];
        args.extend(self.color_args());
        args.extend(options.var_args());
        self.run(options, args).await
    }

    async fn output(&self, options: &ProvisionOptions, key: &str) -> Result<String, ProvisionError> {
        let args = vec![
            "output".to_owned(),
            "-no-color".to_owned(),
            "-json".to_owned(),
            key.to_owned(),
        ];
        let stdout = self.run(options, args).await?;
        let value: serde_json::Value = serde_json::from_str(stdout.trim())
            .map_err(|e| ProvisionError::OutputParse(e.to_string()))?;
        Ok(render_value(&value))
    }

    async fn outputs(
        &self,
        options: &ProvisionOptions,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        let args = vec![
            "output".to_owned(),
            "-no-color".to_owned(),
            "-json".to_owned(),
        ];
        let stdout = self.run(options, args).await?;
        parse_outputs(&stdout)
    }
}

/// `terraform output -json` 결과를 `이름 → 값` 맵으로 변환합니다.
///
/// 각 항목은 `{"sensitive": .., "type": .., "value": ..}` 형식입니다.
pub fn parse_outputs(json: &str) -> Result<BTreeMap<String, String>, ProvisionError> {
    let root: BTreeMap<String, serde_json::Value> = serde_json::from_str(json.trim())
        .map_err(|e| ProvisionError::OutputParse(e.to_string()))?;

    root.into_iter()
        .map(|(name, entry)| {
            let value = entry.get("value").ok_or_else(|| {
                ProvisionError::OutputParse(format!("output '{name}' has no 'value' field"))
            })?;
            Ok((name, render_value(value)))
        })
        .collect()
}

/// 테스트용 Mock 프로비저너
///
/// 설정 가능한 출력값과 실패를 반환하고 호출 횟수를 셉니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockProvisioner {
    /// outputs 호출 시 반환할 값
    pub outputs: BTreeMap<String, String>,
    /// apply 실패 시뮬레이션
    pub fail_apply: bool,
    /// destroy 실패 시뮬레이션
    pub fail_destroy: bool,
    pub apply_calls: std::sync::atomic::AtomicUsize,
    pub destroy_calls: std::sync::atomic::AtomicUsize,
    /// destroy 호출에 전달된 옵션
    pub destroyed_with: std::sync::Mutex<Vec<ProvisionOptions>>,
}

#[cfg(test)]
impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, key: &str, value: &str) -> Self {
        self.outputs.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn with_failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    pub fn with_failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    pub fn apply_count(&self) -> usize {
        self.apply_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroy_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// 마지막 destroy 호출의 옵션
    pub fn last_destroyed(&self) -> Option<ProvisionOptions> {
        self.destroyed_with
            .lock()
            .ok()
            .and_then(|calls| calls.last().cloned())
    }
}

#[cfg(test)]
impl Provisioner for MockProvisioner {
    async fn init_and_apply(&self, _options: &ProvisionOptions) -> Result<String, ProvisionError> {
        self.apply_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_apply {
            return Err(ProvisionError::CommandFailed {
                command: "terraform apply".to_owned(),
                code: Some(1),
                stderr: "mock failure".to_owned(),
            });
        }
        Ok("Apply complete!".to_owned())
    }

    async fn destroy(&self, options: &ProvisionOptions) -> Result<String, ProvisionError> {
        self.destroy_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Ok(mut calls) = self.destroyed_with.lock() {
            calls.push(options.clone());
        }
        if self.fail_destroy {
            return Err(ProvisionError::CommandFailed {
                command: "terraform destroy".to_owned(),
                code: Some(1),
                stderr: "mock failure".to_owned(),
            });
        }
        Ok("Destroy complete!".to_owned())
    }

    async fn output(&self, _options: &ProvisionOptions, key: &str) -> Result<String, ProvisionError> {
        self.outputs
            .get(key)
            .cloned()
            .ok_or_else(|| ProvisionError::OutputNotFound(key.to_owned()))
    }

    async fn outputs(
        &self,
        _options: &ProvisionOptions,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        Ok(self.outputs.clone())
    }
}
