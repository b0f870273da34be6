//! 프로비저닝 옵션 저장소
//!
//! 배포 스테이지가 만든 [`ProvisionOptions`]를 작업 디렉토리의
//! `.test-data/TerraformOptions.json`에 저장해, 검증/제거 스테이지나
//! 이후의 부분 재실행(`SKIP_deploy` 등)이 같은 옵션을 사용하게 합니다.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StateError;
use crate::provisioner::ProvisionOptions;

/// 저장 디렉토리 이름
pub const TEST_DATA_DIR: &str = ".test-data";
/// 옵션 파일 이름
pub const OPTIONS_FILE: &str = "TerraformOptions.json";

/// 작업 디렉토리 기준 옵션 파일 경로
pub fn options_path(working_dir: &Path) -> PathBuf {
    working_dir.join(TEST_DATA_DIR).join(OPTIONS_FILE)
}

/// 옵션을 저장하고 파일 경로를 반환합니다.
pub async fn save(working_dir: &Path, options: &ProvisionOptions) -> Result<PathBuf, StateError> {
    let path = options_path(working_dir);
    let shown = path.display().to_string();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StateError::Io {
                path: parent.display().to_string(),
                source,
            })?;
    }

    let json = serde_json::to_string_pretty(options).map_err(|e| StateError::Serde {
        path: shown.clone(),
        reason: e.to_string(),
    })?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| StateError::Io {
            path: shown.clone(),
            source,
        })?;

    debug!(path = %shown, "saved provisioning options");
    Ok(path)
}

/// 저장된 옵션을 로드합니다.
pub async fn load(working_dir: &Path) -> Result<ProvisionOptions, StateError> {
    let path = options_path(working_dir);
    let shown = path.display().to_string();

    let content = tokio::fs::read_to_string(&path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StateError::NotFound {
                path: shown.clone(),
            }
        } else {
            StateError::Io {
                path: shown.clone(),
                source,
            }
        }
    })?;

    serde_json::from_str(&content).map_err(|e| StateError::Serde {
        path: shown,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TestCase;

    #[tokio::test]
    async fn save_then_load_returns_same_options() {
        let dir = tempfile::tempdir().unwrap();
        let case = TestCase::new("demo", dir.path())
            .with_var("project", "my-gcp-project")
            .with_var("db_name", "test_postgres");
        let opts = ProvisionOptions::for_case(&case);

        let path = save(dir.path(), &opts).await.unwrap();
        assert!(path.ends_with(".test-data/TerraformOptions.json"));

        let loaded = load(dir.path()).await.unwrap();
        assert_eq!(loaded, opts);
    }

    #[tokio::test]
    async fn load_without_save_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path()).await.unwrap_err();
        assert!(matches!(err, StateError::NotFound { .. }));
    }

    #[tokio::test]
    async fn load_corrupt_file_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = options_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        let err = load(dir.path()).await.unwrap_err();
        assert!(matches!(err, StateError::Serde { .. }));
    }
}
