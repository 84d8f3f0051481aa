//! 도메인 타입 — 테스트 케이스, 스테이지, 옵션 번들, 클러스터 컨텍스트

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StagehandError, StoreError};

/// 테스트 케이스 (클러스터 변형 하나)
///
/// 스위트 구성 시점에 정의되며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// 테스트 케이스 이름 (작업 디렉토리 이름으로도 사용)
    pub name: String,
    /// examples 폴더 안의 Terraform 예제 디렉토리 이름
    pub example: String,
}

impl TestCase {
    pub fn new(name: impl Into<String>, example: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            example: example.into(),
        }
    }
}

// ─── Stage ───────────────────────────────────────────────────────────

/// 드라이버가 실행하는 고정 스테이지 목록
///
/// 선언 순서가 곧 실행 순서입니다. `Cleanup`은 지연 실행됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// prepare-inputs: examples 폴더를 임시 디렉토리로 복사
    CreateTestCopyOfExamples,
    /// build-options: 고유 ID, 프로젝트, 리전을 정하고 옵션 번들 저장
    CreateTerratestOptions,
    /// apply: terraform init + apply
    TerraformApply,
    /// configure: 클러스터 자격 증명을 테스트 케이스 전용 kubeconfig에 기록
    ConfigureKubectl,
    /// verify: 모든 워커 노드가 Ready인지 확인
    WaitForWorkers,
    /// cleanup: terraform destroy
    Cleanup,
}

impl Stage {
    /// 선언 순서대로 나열한 전체 스테이지
    pub const ALL: [Stage; 6] = [
        Stage::CreateTestCopyOfExamples,
        Stage::CreateTerratestOptions,
        Stage::TerraformApply,
        Stage::ConfigureKubectl,
        Stage::WaitForWorkers,
        Stage::Cleanup,
    ];

    /// 로그와 skip 변수에 쓰이는 스테이지 이름
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateTestCopyOfExamples => "create_test_copy_of_examples",
            Self::CreateTerratestOptions => "create_terratest_options",
            Self::TerraformApply => "terraform_apply",
            Self::ConfigureKubectl => "configure_kubectl",
            Self::WaitForWorkers => "wait_for_workers",
            Self::Cleanup => "cleanup",
        }
    }

    /// 스테이지가 성공했을 때 도달하는 케이스 상태
    pub fn completes(self) -> CaseState {
        match self {
            Self::CreateTestCopyOfExamples => CaseState::PreparedCopy,
            Self::CreateTerratestOptions => CaseState::OptionsBuilt,
            Self::TerraformApply => CaseState::Applied,
            Self::ConfigureKubectl => CaseState::Configured,
            Self::WaitForWorkers => CaseState::Verified,
            Self::Cleanup => CaseState::CleanedUp,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|st| st.name()).collect();
                format!("unknown stage '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

// ─── CaseState ───────────────────────────────────────────────────────

/// 테스트 케이스 상태 머신
///
/// ```text
/// Init → PreparedCopy → OptionsBuilt → Applied → Configured → Verified → CleanedUp
/// ```
/// `CleanedUp`은 `OptionsBuilt` 이후 어느 상태(실패 포함)에서든 지연 전이로 도달합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Init,
    PreparedCopy,
    OptionsBuilt,
    Applied,
    Configured,
    Verified,
    CleanedUp,
}

impl CaseState {
    /// 프로비저닝이 시작될 수 있었던 상태인지 (cleanup 대상인지)
    pub fn needs_cleanup(self) -> bool {
        self >= Self::OptionsBuilt && self != Self::CleanedUp
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::PreparedCopy => "prepared_copy",
            Self::OptionsBuilt => "options_built",
            Self::Applied => "applied",
            Self::Configured => "configured",
            Self::Verified => "verified",
            Self::CleanedUp => "cleaned_up",
        };
        f.write_str(s)
    }
}

// ─── OptionsBundle ───────────────────────────────────────────────────

/// 스테이지 사이에 전달되는 프로비저닝 입력/출력 묶음
///
/// `create_terratest_options` 스테이지가 만들고 이후 스테이지가 읽습니다.
/// `vars`는 중첩 맵/리스트를 포함할 수 있으며 JSON으로 정확히 왕복합니다.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsBundle {
    /// Terraform 모듈 디렉토리
    pub terraform_dir: PathBuf,
    /// `-var` 로 전달할 변수
    pub vars: BTreeMap<String, Value>,
    /// terraform 프로세스 환경 변수
    pub env_vars: BTreeMap<String, String>,
    /// `-var-file` 목록
    pub var_files: Vec<PathBuf>,
    /// `-no-color` 사용 여부
    pub no_color: bool,
    /// 재시도 가능 에러 발생 시 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간격 (초)
    pub time_between_retries_secs: u64,
    /// 재시도 가능 에러 패턴 (정규식 → 설명)
    pub retryable_errors: BTreeMap<String, String>,
}

/// 클러스터 이름 변수 키
pub const CLUSTER_NAME_VAR: &str = "cluster_name";

impl OptionsBundle {
    /// GKE 클러스터 예제용 옵션 번들을 만듭니다.
    pub fn for_gke_cluster(
        unique_id: &str,
        project: &str,
        region: &str,
        terraform_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("project".to_owned(), Value::from(project));
        vars.insert("location".to_owned(), Value::from(region));
        vars.insert("region".to_owned(), Value::from(region));
        vars.insert(
            CLUSTER_NAME_VAR.to_owned(),
            Value::from(format!("gke-cluster-{}", unique_id.to_lowercase())),
        );

        Self {
            terraform_dir: terraform_dir.into(),
            vars,
            no_color: true,
            ..Self::default()
        }
    }

    /// 재시도 정책을 덮어씁니다.
    pub fn with_retries(
        mut self,
        max_retries: u32,
        time_between_retries_secs: u64,
        retryable_errors: BTreeMap<String, String>,
    ) -> Self {
        self.max_retries = max_retries;
        self.time_between_retries_secs = time_between_retries_secs;
        self.retryable_errors = retryable_errors;
        self
    }

    /// `cluster_name` 변수를 문자열로 읽습니다.
    ///
    /// 변수가 없거나 문자열이 아니면 NotFound 계열 에러를 돌려줍니다.
    pub fn cluster_name(&self, working_dir: &Path) -> Result<&str, StagehandError> {
        self.vars
            .get(CLUSTER_NAME_VAR)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::NotFound {
                    working_dir: working_dir.to_path_buf(),
                    key: format!("TerraformOptions.vars.{CLUSTER_NAME_VAR}"),
                }
                .into()
            })
    }
}

// ─── ClusterContext ──────────────────────────────────────────────────

/// 테스트 케이스 하나의 클러스터 접근 컨텍스트
///
/// 프로세스 전역 kubeconfig 대신 케이스별 파일 경로를 명시적으로 전달합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterContext {
    /// 케이스 전용 kubeconfig 경로
    pub kubeconfig: PathBuf,
    pub cluster_name: String,
    pub project: String,
    pub region: String,
}

impl ClusterContext {
    /// `gcloud ... get-credentials` 명령을 만듭니다.
    ///
    /// `KUBECONFIG`를 케이스 전용 경로로 지정하여 다른 케이스의 컨텍스트를 건드리지 않습니다.
    pub fn get_credentials_command(&self, gcloud_binary: &str) -> ShellCommand {
        ShellCommand::new(
            gcloud_binary,
            [
                "beta",
                "container",
                "clusters",
                "get-credentials",
                self.cluster_name.as_str(),
                "--region",
                self.region.as_str(),
                "--project",
                self.project.as_str(),
            ],
        )
        .env("KUBECONFIG", self.kubeconfig.display().to_string())
    }
}

// ─── ShellCommand ────────────────────────────────────────────────────

/// 외부 shell 명령 기술
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShellCommand {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// 환경 변수를 추가합니다.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// 작업 디렉토리를 지정합니다.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// 로그용 한 줄 표현
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// 완료된 명령의 출력
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout과 stderr를 합친 출력
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}
