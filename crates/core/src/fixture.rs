//! 모듈 픽스처 준비 — 배포 전 모듈 디렉토리 파일 조작
//!
//! 테스트 케이스는 배포 전에 파일을 모듈 디렉토리로 복사하거나,
//! `main.tf`의 모듈 `source` 라인을 바꾸거나, 모듈 블록에 변수 라인을
//! 주입할 수 있습니다. `source` 라인을 바꾸기 전에는 원본을
//! `.test-data/main.tf.orig`로 보관했다가 제거 스테이지 뒤에 복원하고,
//! 그렇지 않으면 주입한 변수 라인만 제거합니다.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::FixtureError;
use crate::state::TEST_DATA_DIR;
use crate::types::TestCase;

/// 모듈 정의 파일 이름
pub const MODULE_FILE: &str = "main.tf";
/// `source` 라인을 바꾸기 전 모듈 정의 파일 사본
pub const MODULE_BACKUP_FILE: &str = "main.tf.orig";

/// 모듈 디렉토리 기준 원본 사본 경로
pub fn backup_path(module_dir: &Path) -> PathBuf {
    module_dir.join(TEST_DATA_DIR).join(MODULE_BACKUP_FILE)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> FixtureError + '_ {
    move |source| FixtureError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn read_lines(path: &Path) -> Result<Vec<String>, FixtureError> {
    let content = tokio::fs::read_to_string(path).await.map_err(io_err(path))?;
    Ok(content.split('\n').map(str::to_owned).collect())
}

async fn write_lines(path: &Path, lines: &[String]) -> Result<(), FixtureError> {
    tokio::fs::write(path, lines.join("\n"))
        .await
        .map_err(io_err(path))
}

fn first_source_line(lines: &[String]) -> Option<usize> {
    lines.iter().position(|l| l.contains("source"))
}

/// 첫 `source` 라인을 `module_line`으로 바꿉니다.
pub async fn update_terraform_directory(module_line: &str, file: &Path) -> Result<(), FixtureError> {
    let mut lines = read_lines(file).await?;
    let idx = first_source_line(&lines).ok_or_else(|| FixtureError::NoSourceLine {
        path: file.display().to_string(),
    })?;
    lines[idx] = module_line.to_owned();
    write_lines(file, &lines).await
}

/// 첫 `source` 라인 바로 뒤에 `var_line`을 삽입합니다.
pub async fn update_module_variable(var_line: &str, file: &Path) -> Result<(), FixtureError> {
    let mut lines = read_lines(file).await?;
    let idx = first_source_line(&lines).ok_or_else(|| FixtureError::NoSourceLine {
        path: file.display().to_string(),
    })?;
    lines.insert(idx + 1, var_line.to_owned());
    write_lines(file, &lines).await
}

/// `var_line`과 (공백 제외) 같은 라인만 제거합니다. 다른 라인은 그대로 둡니다.
pub async fn remove_module_variable(var_line: &str, file: &Path) -> Result<(), FixtureError> {
    let target = var_line.trim();
    let lines: Vec<String> = read_lines(file)
        .await?
        .into_iter()
        .filter(|l| l.trim() != target)
        .collect();
    write_lines(file, &lines).await
}

/// `src` 파일을 `dst_dir/file_name`으로 복사합니다.
///
/// 하드 링크를 먼저 시도하고, 실패하면 내용을 복사합니다.
/// 원본과 대상이 같은 파일이면 아무것도 하지 않습니다.
pub async fn copy_file(src: &Path, dst_dir: &Path, file_name: &str) -> Result<PathBuf, FixtureError> {
    let dst = dst_dir.join(file_name);

    let src_meta = tokio::fs::metadata(src).await.map_err(io_err(src))?;
    if !src_meta.is_file() {
        return Err(FixtureError::NotRegular {
            path: src.display().to_string(),
        });
    }

    match tokio::fs::metadata(&dst).await {
        Ok(dst_meta) => {
            if !dst_meta.is_file() {
                return Err(FixtureError::NotRegular {
                    path: dst.display().to_string(),
                });
            }
            let same = tokio::fs::canonicalize(src).await.map_err(io_err(src))?
                == tokio::fs::canonicalize(&dst).await.map_err(io_err(&dst))?;
            if same {
                return Ok(dst);
            }
            tokio::fs::remove_file(&dst).await.map_err(io_err(&dst))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(&dst)(e)),
    }

    if tokio::fs::hard_link(src, &dst).await.is_err() {
        tokio::fs::copy(src, &dst).await.map_err(io_err(&dst))?;
    }
    debug!(src = %src.display(), dst = %dst.display(), "copied fixture file");
    Ok(dst)
}

/// 배포 전에 케이스의 픽스처 설정을 모듈 디렉토리에 적용합니다.
pub async fn prepare(case: &TestCase) -> Result<(), FixtureError> {
    if let Some(src) = &case.copy_file {
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FixtureError::NotRegular {
                path: src.display().to_string(),
            })?;
        copy_file(src, &case.module_dir, &name).await?;
    }

    let module_file = case.module_dir.join(MODULE_FILE);
    if let Some(line) = &case.module_source {
        backup_module_file(&case.module_dir).await?;
        update_terraform_directory(line, &module_file).await?;
        info!(file = %module_file.display(), "module source updated");
    }
    for line in &case.module_vars {
        update_module_variable(line, &module_file).await?;
        info!(file = %module_file.display(), variable = %line.trim(), "module variable injected");
    }
    Ok(())
}

/// 원본 사본이 없을 때만 만듭니다. 이전 실행이 남긴 사본은 원본 그대로입니다.
async fn backup_module_file(module_dir: &Path) -> Result<(), FixtureError> {
    let backup = backup_path(module_dir);
    if tokio::fs::try_exists(&backup).await.map_err(io_err(&backup))? {
        return Ok(());
    }
    if let Some(parent) = backup.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
    }
    let module_file = module_dir.join(MODULE_FILE);
    tokio::fs::copy(&module_file, &backup)
        .await
        .map_err(io_err(&module_file))?;
    debug!(backup = %backup.display(), "saved original module file");
    Ok(())
}

/// 제거 스테이지 뒤에 모듈 정의 파일을 되돌립니다.
///
/// 원본 사본이 있으면 그대로 복원하고, 없으면 주입했던 변수 라인만 제거합니다.
pub async fn cleanup(case: &TestCase) -> Result<(), FixtureError> {
    let module_file = case.module_dir.join(MODULE_FILE);
    let backup = backup_path(&case.module_dir);
    if tokio::fs::try_exists(&backup).await.map_err(io_err(&backup))? {
        tokio::fs::rename(&backup, &module_file)
            .await
            .map_err(io_err(&module_file))?;
        info!(file = %module_file.display(), "module file restored");
        return Ok(());
    }
    for line in &case.module_vars {
        remove_module_variable(line, &module_file).await?;
    }
    Ok(())
}
