//! 외부 협력자 trait — 프로비저닝, 클라우드 메타데이터, shell, 클러스터 검증
//!
//! 코어는 이 trait들을 소비만 합니다. 구현은 `stagehand-adapters` 크레이트에 있습니다.
//! 모든 trait은 `Arc<dyn ...>`으로 보관할 수 있도록 [`BoxFuture`]를 반환합니다.
//! 타임아웃과 재시도는 각 구현의 책임입니다.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ExternalError;
use crate::types::{ClusterContext, CommandOutput, OptionsBundle, ShellCommand};

/// dyn-compatible 비동기 반환 타입
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 인프라 프로비저닝 도구 (예: Terraform)
pub trait Provisioner: Send + Sync {
    /// 모듈을 초기화하고 적용합니다.
    fn init_and_apply<'a>(
        &'a self,
        options: &'a OptionsBundle,
    ) -> BoxFuture<'a, Result<(), ExternalError>>;

    /// 적용된 자원을 제거합니다.
    fn destroy<'a>(
        &'a self,
        options: &'a OptionsBundle,
    ) -> BoxFuture<'a, Result<(), ExternalError>>;
}

/// 리전 선택 제약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionConstraints {
    /// 비어 있지 않으면 이 목록 안에서만 고릅니다.
    pub approved: Vec<String>,
    /// 절대 고르지 않을 리전
    pub forbidden: Vec<String>,
}

/// 클라우드 메타데이터 조회
pub trait CloudMetadata: Send + Sync {
    /// 테스트에 사용할 프로젝트 ID
    fn project_id(&self) -> Result<String, ExternalError>;

    /// 제약을 만족하는 임의의 리전
    fn random_region<'a>(
        &'a self,
        project: &'a str,
        constraints: &'a RegionConstraints,
    ) -> BoxFuture<'a, Result<String, ExternalError>>;
}

/// shell 명령 실행기
pub trait ShellExecutor: Send + Sync {
    /// 명령을 실행합니다. 0이 아닌 종료 코드는 에러입니다.
    fn run<'a>(
        &'a self,
        command: &'a ShellCommand,
    ) -> BoxFuture<'a, Result<CommandOutput, ExternalError>>;
}

/// 프로비저닝된 클러스터 검증 (verify 스테이지)
pub trait ClusterVerifier: Send + Sync {
    fn verify<'a>(
        &'a self,
        context: &'a ClusterContext,
    ) -> BoxFuture<'a, Result<(), ExternalError>>;
}

/// 입력 준비 (prepare-inputs 스테이지)
pub trait InputPreparer: Send + Sync {
    /// `root/subdir`를 격리된 위치로 복사하고 복사본 경로를 돌려줍니다.
    fn copy_to_temp(&self, root: &Path, subdir: &str) -> Result<PathBuf, ExternalError>;
}

/// 고유 ID 생성기
pub trait IdGenerator: Send + Sync {
    fn unique_id(&self) -> String;
}

/// 드라이버가 사용하는 협력자 묶음
#[derive(Clone)]
pub struct Collaborators {
    pub inputs: Arc<dyn InputPreparer>,
    pub ids: Arc<dyn IdGenerator>,
    pub metadata: Arc<dyn CloudMetadata>,
    pub provisioner: Arc<dyn Provisioner>,
    pub shell: Arc<dyn ShellExecutor>,
    pub verifier: Arc<dyn ClusterVerifier>,
}
