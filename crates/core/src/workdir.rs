//! 테스트 케이스별 작업 디렉토리 할당
//!
//! `allocate(base, name)`은 `base/name`을 돌려주는 결정적 함수입니다.
//! 같은 입력은 항상 같은 디렉토리가 되므로, 실패한 실행을 같은 디렉토리에서
//! 이어서 재실행할 수 있습니다. 디렉토리는 첫 저장 시점에 생성됩니다.
//!
//! 같은 이름의 테스트 케이스를 동시에 실행하는 경우는 지원하지 않습니다.

use std::path::{Component, Path, PathBuf};

use crate::error::StoreError;

/// 테스트 케이스 전용 kubeconfig 파일 이름
pub const KUBECONFIG_FILE: &str = "kubeconfig";

/// 테스트 케이스 하나의 작업 디렉토리
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkingDir {
    path: PathBuf,
    test_case: String,
}

impl WorkingDir {
    /// 디렉토리 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 소유 테스트 케이스 이름
    pub fn test_case(&self) -> &str {
        &self.test_case
    }

    /// 케이스 전용 kubeconfig 경로
    pub fn kubeconfig_path(&self) -> PathBuf {
        self.path.join(KUBECONFIG_FILE)
    }

    /// 디렉토리가 이미 존재하는지 (이전 실행 흔적)
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }
}

/// 테스트 케이스의 작업 디렉토리를 결정합니다.
///
/// 이름이 단일 경로 세그먼트가 아니면 (`..`, `/` 포함 등) 다른 케이스의
/// 디렉토리와 겹칠 수 있으므로 거부합니다.
pub fn allocate(base_dir: impl AsRef<Path>, test_case: &str) -> Result<WorkingDir, StoreError> {
    validate_segment("test case name", test_case)?;
    Ok(WorkingDir {
        path: base_dir.as_ref().join(test_case),
        test_case: test_case.to_owned(),
    })
}

/// 이름이 정확히 하나의 일반 경로 세그먼트인지 검사합니다.
pub(crate) fn validate_segment(kind: &'static str, name: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidName {
        kind,
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("must not contain path separators"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("must be a plain directory name")),
    }
}
