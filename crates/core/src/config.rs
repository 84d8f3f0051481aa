//! 설정 관리 — stagehand.toml 파싱 및 런타임 설정
//!
//! [`StagehandConfig`]는 스위트 실행에 필요한 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`STAGEHAND_SUITE_STAGES_DIR=/tmp/stages` 형식)
//! 3. 설정 파일 (`stagehand.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), stagehand_core::error::StagehandError> {
//! use stagehand_core::config::StagehandConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = StagehandConfig::load("stagehand.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = StagehandConfig::parse("[suite]\nstages_dir = \"/tmp/stages\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborator::RegionConstraints;
use crate::error::{ConfigError, StagehandError};
use crate::skip::{DEFAULT_SKIP_ENV_PREFIX, SkipPolicy};
use crate::types::{Stage, TestCase};
use crate::workdir::validate_segment;

/// Stagehand 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagehandConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스위트 설정
    #[serde(default)]
    pub suite: SuiteConfig,
    /// GCP 설정
    #[serde(default)]
    pub gcp: GcpConfig,
    /// Terraform 설정
    #[serde(default)]
    pub terraform: TerraformConfig,
    /// kubectl / gcloud 설정
    #[serde(default)]
    pub kubectl: KubectlConfig,
}

impl StagehandConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StagehandError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, StagehandError> {
        match Self::load(path.as_ref()).await {
            Err(StagehandError::Config(ConfigError::FileNotFound { path })) => {
                info!(path = path.as_str(), "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, StagehandError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StagehandError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                StagehandError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, StagehandError> {
        toml::from_str(toml_str).map_err(|e| {
            StagehandError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `STAGEHAND_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "STAGEHAND_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "STAGEHAND_GENERAL_LOG_FORMAT");

        // Suite
        override_string(&mut self.suite.stages_dir, "STAGEHAND_SUITE_STAGES_DIR");
        override_string(&mut self.suite.examples_root, "STAGEHAND_SUITE_EXAMPLES_ROOT");
        override_string(
            &mut self.suite.examples_subdir,
            "STAGEHAND_SUITE_EXAMPLES_SUBDIR",
        );
        override_string(
            &mut self.suite.skip_env_prefix,
            "STAGEHAND_SUITE_SKIP_ENV_PREFIX",
        );
        override_csv(&mut self.suite.skip, "STAGEHAND_SUITE_SKIP");

        // GCP
        override_string(&mut self.gcp.project, "STAGEHAND_GCP_PROJECT");
        override_csv(&mut self.gcp.regions, "STAGEHAND_GCP_REGIONS");
        override_csv(&mut self.gcp.approved_regions, "STAGEHAND_GCP_APPROVED_REGIONS");
        override_csv(
            &mut self.gcp.forbidden_regions,
            "STAGEHAND_GCP_FORBIDDEN_REGIONS",
        );

        // Terraform
        override_string(&mut self.terraform.binary, "STAGEHAND_TERRAFORM_BINARY");
        override_u32(
            &mut self.terraform.max_retries,
            "STAGEHAND_TERRAFORM_MAX_RETRIES",
        );
        override_u64(
            &mut self.terraform.time_between_retries_secs,
            "STAGEHAND_TERRAFORM_TIME_BETWEEN_RETRIES_SECS",
        );

        // kubectl
        override_string(
            &mut self.kubectl.gcloud_binary,
            "STAGEHAND_KUBECTL_GCLOUD_BINARY",
        );
        override_string(
            &mut self.kubectl.kubectl_binary,
            "STAGEHAND_KUBECTL_KUBECTL_BINARY",
        );
        override_u32(
            &mut self.kubectl.node_ready_retries,
            "STAGEHAND_KUBECTL_NODE_READY_RETRIES",
        );
        override_u64(
            &mut self.kubectl.node_ready_interval_secs,
            "STAGEHAND_KUBECTL_NODE_READY_INTERVAL_SECS",
        );
        override_usize(
            &mut self.kubectl.expected_nodes,
            "STAGEHAND_KUBECTL_EXPECTED_NODES",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), StagehandError> {
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

        if self.suite.stages_dir.is_empty() {
            return Err(invalid("suite.stages_dir", "must not be empty"));
        }

        if self.suite.skip_env_prefix.is_empty() {
            return Err(invalid("suite.skip_env_prefix", "must not be empty"));
        }

        for name in &self.suite.skip {
            if let Err(reason) = name.parse::<Stage>() {
                return Err(invalid("suite.skip", reason));
            }
        }

        if self.suite.test_cases.is_empty() {
            return Err(invalid("suite.test_cases", "at least one test case is required"));
        }

        let mut seen = HashSet::new();
        for case in &self.suite.test_cases {
            validate_segment("test case name", &case.name)
                .map_err(|e| invalid("suite.test_cases.name", e.to_string()))?;
            if case.example.is_empty() {
                return Err(invalid(
                    "suite.test_cases.example",
                    format!("test case '{}' has an empty example", case.name),
                ));
            }
            if !seen.insert(case.name.as_str()) {
                return Err(invalid(
                    "suite.test_cases.name",
                    format!("duplicate test case '{}'", case.name),
                ));
            }
        }

        if self.gcp.candidate_regions().is_empty() {
            return Err(invalid(
                "gcp.regions",
                "no region left after applying approved/forbidden lists",
            ));
        }

        if self.kubectl.node_ready_retries == 0 {
            return Err(invalid("kubectl.node_ready_retries", "must be at least 1"));
        }

        Ok(())
    }

    /// 설정 파일의 skip 목록과 프로세스 환경의 skip 신호를 합친 정책
    pub fn skip_policy(&self) -> SkipPolicy {
        let from_config: SkipPolicy = self.suite.skip.iter().cloned().collect();
        let from_env = SkipPolicy::from_env(
            &self.suite.skip_env_prefix,
            Stage::ALL.iter().map(|s| s.name()),
        );
        from_config.merge(from_env)
    }
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

/// 스위트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// 테스트 케이스별 작업 디렉토리의 상위 디렉토리
    pub stages_dir: String,
    /// examples 폴더를 포함하는 루트
    pub examples_root: String,
    /// 루트 아래 examples 폴더 이름
    pub examples_subdir: String,
    /// skip 환경 변수 접두어
    pub skip_env_prefix: String,
    /// 항상 건너뛸 스테이지
    pub skip: Vec<String>,
    /// 실행할 테스트 케이스 (선언 순서대로 실행)
    pub test_cases: Vec<TestCase>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            stages_dir: "stages".to_owned(),
            examples_root: "..".to_owned(),
            examples_subdir: "examples".to_owned(),
            skip_env_prefix: DEFAULT_SKIP_ENV_PREFIX.to_owned(),
            skip: Vec::new(),
            test_cases: vec![
                TestCase::new("PublicCluster", "gke-public-cluster"),
                TestCase::new("PrivateCluster", "gke-private-cluster"),
            ],
        }
    }
}

/// GCP 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// 프로젝트 ID (비어 있으면 환경변수에서 찾음)
    pub project: String,
    /// 후보 리전
    pub regions: Vec<String>,
    /// 비어 있지 않으면 이 리전들만 사용
    pub approved_regions: Vec<String>,
    /// 사용 금지 리전
    pub forbidden_regions: Vec<String>,
}

impl GcpConfig {
    /// 승인/금지 목록을 적용한 후보 리전
    pub fn candidate_regions(&self) -> Vec<String> {
        let constraints = self.region_constraints();
        self.regions
            .iter()
            .filter(|r| constraints.approved.is_empty() || constraints.approved.contains(r))
            .filter(|r| !constraints.forbidden.contains(r))
            .cloned()
            .collect()
    }

    pub fn region_constraints(&self) -> RegionConstraints {
        RegionConstraints {
            approved: self.approved_regions.clone(),
            forbidden: self.forbidden_regions.clone(),
        }
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        let regions = [
            "asia-east1",
            "asia-northeast1",
            "asia-south1",
            "asia-southeast1",
            "australia-southeast1",
            "europe-north1",
            "europe-west1",
            "europe-west2",
            "europe-west3",
            "europe-west4",
            "northamerica-northeast1",
            "southamerica-east1",
            "us-central1",
            "us-east1",
            "us-east4",
            "us-west1",
            "us-west2",
        ];
        Self {
            project: String::new(),
            regions: regions.iter().map(|r| (*r).to_owned()).collect(),
            approved_regions: Vec::new(),
            forbidden_regions: Vec::new(),
        }
    }
}

/// Terraform 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    /// terraform 실행 파일
    pub binary: String,
    /// 재시도 가능 에러 발생 시 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간격 (초)
    pub time_between_retries_secs: u64,
    /// 재시도 가능 에러 패턴 (정규식 → 설명)
    pub retryable_errors: BTreeMap<String, String>,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        let retryable_errors = [
            (
                ".*read: connection reset by peer.*",
                "Failed to reach remote endpoint",
            ),
            (".*handshake timeout.*", "Transient TLS handshake timeout"),
            (".*Error installing provider.*", "Failed to download provider"),
            (
                ".*Failed to query available provider packages.*",
                "Failed to query provider registry",
            ),
            (
                ".*timeout while waiting for plugin to start.*",
                "Provider plugin start timed out",
            ),
            (
                "could not query provider registry for",
                "Transient provider registry error",
            ),
        ];
        Self {
            binary: "terraform".to_owned(),
            max_retries: 3,
            time_between_retries_secs: 5,
            retryable_errors: retryable_errors
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }
}

/// kubectl / gcloud 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubectlConfig {
    /// gcloud 실행 파일
    pub gcloud_binary: String,
    /// kubectl 실행 파일
    pub kubectl_binary: String,
    /// 노드 Ready 확인 최대 시도 횟수
    pub node_ready_retries: u32,
    /// 노드 Ready 확인 간격 (초)
    pub node_ready_interval_secs: u64,
    /// 기대 노드 수 (0이면 1개 이상)
    pub expected_nodes: usize,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            gcloud_binary: "gcloud".to_owned(),
            kubectl_binary: "kubectl".to_owned(),
            node_ready_retries: 30,
            node_ready_interval_secs: 10,
            expected_nodes: 0,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> StagehandError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
