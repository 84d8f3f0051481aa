//! 테스트 케이스 드라이버 — 케이스별 작업 디렉토리 할당, 스테이지 순차 실행, 지연 cleanup
//!
//! # 스테이지 순서
//!
//! 1. `create_test_copy_of_examples`: examples 폴더 복사, 모듈 경로 저장
//! 2. `create_terratest_options`: 고유 ID, 프로젝트, 리전, 옵션 번들 저장
//! 3. (cleanup 가드 무장)
//! 4. `terraform_apply`
//! 5. `configure_kubectl`
//! 6. `wait_for_workers`
//! 7. `cleanup`: 앞 단계의 성패와 관계없이 한 번 실행
//!
//! 1~2에서 실패하면 프로비저닝이 시작되지 않았으므로 cleanup 없이 끝납니다.
//! 한 케이스의 실패는 다음 케이스 실행을 막지 않습니다.
//!
//! 케이스는 순차 실행합니다. 케이스마다 별도 kubeconfig를 쓰지만 외부 도구가
//! 공유하는 다른 전역 상태가 있을 수 있기 때문입니다.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cleanup::CleanupGuard;
use crate::collaborator::{Collaborators, RegionConstraints};
use crate::config::StagehandConfig;
use crate::error::{StageError, StagehandError};
use crate::metrics as m;
use crate::skip::SkipPolicy;
use crate::stage::{StageOutcome, StageRecord, StageRunner};
use crate::store::StateStore;
use crate::types::{CaseState, ClusterContext, OptionsBundle, Stage, TestCase};
use crate::workdir::{self, WorkingDir};

/// 복사된 Terraform 모듈 경로 저장 키
pub const MODULE_PATH_KEY: &str = "gkeClusterTerraformModulePath";
/// 고유 ID 저장 키
pub const UNIQUE_ID_KEY: &str = "uniqueID";
/// 프로젝트 저장 키
pub const PROJECT_KEY: &str = "project";
/// 리전 저장 키
pub const REGION_KEY: &str = "region";

/// 드라이버 실행 설정
#[derive(Debug, Clone)]
pub struct SuiteSettings {
    pub stages_dir: PathBuf,
    pub examples_root: PathBuf,
    pub examples_subdir: String,
    pub skip_env_prefix: String,
    pub gcloud_binary: String,
    pub regions: RegionConstraints,
    pub max_retries: u32,
    pub time_between_retries_secs: u64,
    pub retryable_errors: BTreeMap<String, String>,
}

impl SuiteSettings {
    pub fn from_config(config: &StagehandConfig) -> Self {
        Self {
            stages_dir: PathBuf::from(&config.suite.stages_dir),
            examples_root: PathBuf::from(&config.suite.examples_root),
            examples_subdir: config.suite.examples_subdir.clone(),
            skip_env_prefix: config.suite.skip_env_prefix.clone(),
            gcloud_binary: config.kubectl.gcloud_binary.clone(),
            regions: config.gcp.region_constraints(),
            max_retries: config.terraform.max_retries,
            time_between_retries_secs: config.terraform.time_between_retries_secs,
            retryable_errors: config.terraform.retryable_errors.clone(),
        }
    }
}

// ─── Report ──────────────────────────────────────────────────────────

/// 테스트 케이스 하나의 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub example: String,
    pub working_dir: PathBuf,
    pub passed: bool,
    /// 마지막으로 도달한 상태
    pub state: CaseState,
    /// 처음 실패한 스테이지
    pub failed_stage: Option<String>,
    pub error: Option<String>,
    /// 앞 단계 실패 뒤에 cleanup까지 실패한 경우의 에러
    pub cleanup_error: Option<String>,
    /// cleanup action이 호출되었는지
    pub cleanup_ran: bool,
    pub stages: Vec<StageRecord>,
    pub elapsed_ms: u64,
}

impl CaseReport {
    /// 특정 스테이지의 기록
    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage.name())
    }
}

/// 스위트 전체 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub cases: Vec<CaseReport>,
    pub elapsed_ms: u64,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    /// 이름으로 케이스 결과를 찾습니다.
    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }
}

// ─── Driver ──────────────────────────────────────────────────────────

/// 테스트 케이스 드라이버
pub struct TestCaseDriver {
    settings: SuiteSettings,
    collaborators: Collaborators,
    policy: SkipPolicy,
}

impl TestCaseDriver {
    pub fn new(settings: SuiteSettings, collaborators: Collaborators, policy: SkipPolicy) -> Self {
        Self {
            settings,
            collaborators,
            policy,
        }
    }

    pub fn settings(&self) -> &SuiteSettings {
        &self.settings
    }

    pub fn policy(&self) -> &SkipPolicy {
        &self.policy
    }

    /// 모든 테스트 케이스를 선언 순서대로 실행합니다.
    pub async fn run(&self, cases: &[TestCase]) -> SuiteReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();

        info!(
            run_id = %run_id,
            test_cases = cases.len(),
            skipped_stages = ?self.policy.skipped().collect::<Vec<_>>(),
            "suite started"
        );

        let mut reports = Vec::with_capacity(cases.len());
        for case in cases {
            let report = self.run_case(case).await;
            let result = if report.passed { "passed" } else { "failed" };
            metrics::counter!(m::TEST_CASES_TOTAL, m::LABEL_RESULT => result).increment(1);
            reports.push(report);
        }

        let report = SuiteReport {
            run_id,
            started_at,
            cases: reports,
            elapsed_ms: elapsed_ms(started),
        };
        info!(
            run_id = %run_id,
            passed = report.passed(),
            failed = report.failed(),
            elapsed_ms = report.elapsed_ms,
            "suite finished"
        );
        report
    }

    /// 테스트 케이스 하나를 실행합니다.
    pub async fn run_case(&self, case: &TestCase) -> CaseReport {
        let started = Instant::now();
        info!(
            test_case = case.name.as_str(),
            example = case.example.as_str(),
            "test case started"
        );

        let wd = match workdir::allocate(&self.settings.stages_dir, &case.name) {
            Ok(wd) => wd,
            Err(e) => {
                error!(
                    test_case = case.name.as_str(),
                    error = %e,
                    "working directory allocation failed"
                );
                return CaseReport {
                    name: case.name.clone(),
                    example: case.example.clone(),
                    working_dir: self.settings.stages_dir.clone(),
                    passed: false,
                    state: CaseState::Init,
                    failed_stage: None,
                    error: Some(e.to_string()),
                    cleanup_error: None,
                    cleanup_ran: false,
                    stages: Vec::new(),
                    elapsed_ms: elapsed_ms(started),
                };
            }
        };

        let store = StateStore::new(&wd);
        let mut runner = StageRunner::new(&wd, &self.policy);
        let mut state = CaseState::Init;
        let mut failure: Option<StageError> = None;
        let mut cleanup_error: Option<StageError> = None;
        let mut cleanup_ran = false;

        // 프로비저닝 전 단계: 실패 시 정리할 자원이 없음
        for stage in [Stage::CreateTestCopyOfExamples, Stage::CreateTerratestOptions] {
            match self.run_stage(&mut runner, stage, case, &wd, &store).await {
                Ok(_) => state = stage.completes(),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if failure.is_none() {
            let guard = CleanupGuard::arm(&wd, &self.settings.skip_env_prefix);

            for stage in [
                Stage::TerraformApply,
                Stage::ConfigureKubectl,
                Stage::WaitForWorkers,
            ] {
                match self.run_stage(&mut runner, stage, case, &wd, &store).await {
                    Ok(_) => state = stage.completes(),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            let cleanup = guard
                .release(|| self.run_stage(&mut runner, Stage::Cleanup, case, &wd, &store))
                .await;
            match cleanup {
                Ok(StageOutcome::Ran) => {
                    cleanup_ran = true;
                    state = CaseState::CleanedUp;
                }
                Ok(_) => {
                    warn!(
                        test_case = case.name.as_str(),
                        "cleanup skipped; provisioned resources are left in place"
                    );
                }
                Err(e) => {
                    cleanup_ran = true;
                    if failure.is_none() {
                        failure = Some(e);
                    } else {
                        cleanup_error = Some(e);
                    }
                }
            }
        }

        let passed = failure.is_none();
        if passed {
            info!(test_case = case.name.as_str(), state = %state, "test case passed");
        } else {
            error!(
                test_case = case.name.as_str(),
                state = %state,
                working_dir = %wd.path().display(),
                "test case failed"
            );
        }

        CaseReport {
            name: case.name.clone(),
            example: case.example.clone(),
            working_dir: wd.path().to_path_buf(),
            passed,
            state,
            failed_stage: failure.as_ref().map(|e| e.stage.clone()),
            error: failure.as_ref().map(|e| e.source.to_string()),
            cleanup_error: cleanup_error.map(|e| e.source.to_string()),
            cleanup_ran,
            stages: runner.into_records(),
            elapsed_ms: elapsed_ms(started),
        }
    }

    async fn run_stage(
        &self,
        runner: &mut StageRunner<'_>,
        stage: Stage,
        case: &TestCase,
        wd: &WorkingDir,
        store: &StateStore,
    ) -> Result<StageOutcome, StageError> {
        runner
            .run_stage(stage.name(), || self.stage_action(stage, case, wd, store))
            .await
    }

    async fn stage_action(
        &self,
        stage: Stage,
        case: &TestCase,
        wd: &WorkingDir,
        store: &StateStore,
    ) -> Result<(), StagehandError> {
        match stage {
            Stage::CreateTestCopyOfExamples => self.prepare_inputs(case, store),
            Stage::CreateTerratestOptions => self.build_options(store).await,
            Stage::TerraformApply => {
                let options = store.load_options()?;
                self.collaborators.provisioner.init_and_apply(&options).await?;
                Ok(())
            }
            Stage::ConfigureKubectl => self.configure(wd, store).await,
            Stage::WaitForWorkers => {
                let context = cluster_context(wd, store)?;
                self.collaborators.verifier.verify(&context).await?;
                Ok(())
            }
            Stage::Cleanup => {
                let options = store.load_options()?;
                self.collaborators.provisioner.destroy(&options).await?;
                Ok(())
            }
        }
    }

    fn prepare_inputs(&self, case: &TestCase, store: &StateStore) -> Result<(), StagehandError> {
        let copy = self
            .collaborators
            .inputs
            .copy_to_temp(&self.settings.examples_root, &self.settings.examples_subdir)?;
        info!(test_case = case.name.as_str(), path = %copy.display(), "path to test folder");

        let module_path = copy.join(&case.example);
        store.save_string(MODULE_PATH_KEY, &module_path.to_string_lossy())?;
        Ok(())
    }

    async fn build_options(&self, store: &StateStore) -> Result<(), StagehandError> {
        let module_path = store.load_string(MODULE_PATH_KEY)?;
        let unique_id = self.collaborators.ids.unique_id();
        let project = self.collaborators.metadata.project_id()?;
        let region = self
            .collaborators
            .metadata
            .random_region(&project, &self.settings.regions)
            .await?;

        let options = OptionsBundle::for_gke_cluster(&unique_id, &project, &region, module_path)
            .with_retries(
                self.settings.max_retries,
                self.settings.time_between_retries_secs,
                self.settings.retryable_errors.clone(),
            );

        store.save_string(UNIQUE_ID_KEY, &unique_id)?;
        store.save_string(PROJECT_KEY, &project)?;
        store.save_string(REGION_KEY, &region)?;
        store.save_options(&options)?;
        Ok(())
    }

    async fn configure(&self, wd: &WorkingDir, store: &StateStore) -> Result<(), StagehandError> {
        let context = cluster_context(wd, store)?;
        std::fs::create_dir_all(wd.path())?;

        let command = context.get_credentials_command(&self.settings.gcloud_binary);
        self.collaborators.shell.run(&command).await?;
        Ok(())
    }
}

/// 저장된 값으로 케이스 전용 클러스터 컨텍스트를 만듭니다.
pub fn cluster_context(
    wd: &WorkingDir,
    store: &StateStore,
) -> Result<ClusterContext, StagehandError> {
    let options = store.load_options()?;
    let project = store.load_string(PROJECT_KEY)?;
    let region = store.load_string(REGION_KEY)?;
    let cluster_name = options.cluster_name(wd.path())?.to_owned();

    Ok(ClusterContext {
        kubeconfig: wd.kubeconfig_path(),
        cluster_name,
        project,
        region,
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
