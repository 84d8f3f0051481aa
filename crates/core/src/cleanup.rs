//! 지연 cleanup 가드
//!
//! 옵션 번들이 처음 확정된 시점에 [`CleanupGuard`]를 무장(arm)합니다.
//! 이후 앞쪽 스테이지가 어떻게 끝나든 [`CleanupGuard::release`]가 cleanup을
//! 정확히 한 번 실행합니다. 가드는 `release`에서 소비되므로 두 번 실행될 수 없습니다.
//!
//! 스테이지 action의 panic은 [`StageRunner`](crate::stage::StageRunner)가 실패로
//! 바꾸므로 `release`까지 도달합니다. 비동기 cleanup은 `Drop`에서 실행할 수 없으므로,
//! 실행 중인 future 자체가 버려지는 경우(취소)에만 가드는 해제 없이 drop되고
//! 운영자가 cleanup만 다시 실행할 수 있도록 에러 로그를 남깁니다.

use std::future::Future;
use std::path::PathBuf;

use tracing::{debug, error};

use crate::types::Stage;
use crate::workdir::WorkingDir;

/// 테스트 케이스 자원에 대한 cleanup 의무
#[must_use = "an armed cleanup guard must be released"]
pub struct CleanupGuard {
    test_case: String,
    working_dir: PathBuf,
    skip_env_prefix: String,
    armed: bool,
}

impl CleanupGuard {
    /// 가드를 무장합니다.
    pub fn arm(working_dir: &WorkingDir, skip_env_prefix: &str) -> Self {
        debug!(
            test_case = working_dir.test_case(),
            working_dir = %working_dir.path().display(),
            "cleanup registered"
        );
        Self {
            test_case: working_dir.test_case().to_owned(),
            working_dir: working_dir.path().to_path_buf(),
            skip_env_prefix: skip_env_prefix.to_owned(),
            armed: true,
        }
    }

    /// cleanup을 실행하고 가드를 해제합니다.
    pub async fn release<F, Fut, T>(mut self, cleanup: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.armed = false;
        cleanup().await
    }

    /// cleanup만 다시 실행하기 위한 skip 변수 안내
    fn replay_hint(&self) -> String {
        Stage::ALL
            .iter()
            .filter(|s| **s != Stage::Cleanup)
            .map(|s| format!("{}{}=true", self.skip_env_prefix, s.name()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.armed {
            error!(
                test_case = self.test_case.as_str(),
                working_dir = %self.working_dir.display(),
                replay = self.replay_hint().as_str(),
                "cleanup guard dropped without running cleanup; resources may be left behind"
            );
        }
    }
}
