//! 예제 모듈 복사 -- 실행마다 별도의 임시 복사본
//!
//! Terraform은 실행한 모듈 옆에 `.terraform/`과 state 파일을 쓰므로
//! 실행마다 전용 복사본에서 작업합니다. 복사본은 실행 후에도 남겨 두어,
//! prepare-inputs를 건너뛴 재실행이 저장된 모듈 경로로 다시 찾을 수 있습니다.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use stagehand_core::{ExternalError, InputPreparer};

/// `<root>/<subdir>`를 삭제되지 않는 새 임시 디렉토리로 복사합니다.
#[derive(Debug, Clone)]
pub struct TempCopyPreparer {
    prefix: String,
    parent: Option<PathBuf>,
}

impl Default for TempCopyPreparer {
    fn default() -> Self {
        Self {
            prefix: "stagehand-".to_owned(),
            parent: None,
        }
    }
}

impl TempCopyPreparer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 시스템 임시 디렉토리 대신 `parent` 아래에 복사본을 만듭니다.
    pub fn in_dir(mut self, parent: impl Into<PathBuf>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    fn temp_root(&self) -> std::io::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix);
        let dir = match &self.parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir.keep())
    }
}

impl InputPreparer for TempCopyPreparer {
    fn copy_to_temp(&self, root: &Path, subdir: &str) -> Result<PathBuf, ExternalError> {
        let source = root.join(subdir);
        if !source.is_dir() {
            return Err(ExternalError::check(
                "copy",
                format!("{} is not a directory", source.display()),
            ));
        }

        let fail = |e: std::io::Error| ExternalError::check("copy", e.to_string());
        let destination = self.temp_root().map_err(fail)?.join(subdir);
        copy_tree(&source, &destination).map_err(fail)?;

        debug!(
            from = %source.display(),
            to = %destination.display(),
            "copied examples"
        );
        Ok(destination)
    }
}

/// Terraform 캐시, state 파일, 숨김 항목은 복사하지 않습니다.
fn is_excluded(name: &str) -> bool {
    name.starts_with('.') || name.contains(".tfstate")
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if is_excluded(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let target = to.join(&name);
        if fs::metadata(&path)?.is_dir() {
            copy_tree(&path, &target)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }
    Ok(())
}
