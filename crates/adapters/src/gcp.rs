//! GCP 프로젝트 및 리전 결정
//!
//! 프로젝트는 설정값을 쓰고, 없으면 [`PROJECT_ENV_VARS`] 중 처음으로 비어 있지 않은
//! 변수를 씁니다. 리전은 approved/forbidden 목록을 적용한 후보 중에서 무작위로 고릅니다.

use rand::seq::SliceRandom;
use tracing::{debug, info};

use stagehand_core::{BoxFuture, CloudMetadata, ExternalError, RegionConstraints};

/// 프로젝트 ID를 찾을 환경 변수 (앞쪽 우선)
pub const PROJECT_ENV_VARS: [&str; 5] = [
    "GOOGLE_PROJECT",
    "GOOGLE_CLOUD_PROJECT",
    "GOOGLE_CLOUD_PROJECT_ID",
    "GCLOUD_PROJECT",
    "CLOUDSDK_CORE_PROJECT",
];

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct GcpMetadata {
    project: String,
    regions: Vec<String>,
    lookup: Lookup,
}

impl GcpMetadata {
    /// `project`가 비어 있으면 프로세스 환경에서 프로젝트를 찾습니다.
    pub fn new(project: impl Into<String>, regions: Vec<String>) -> Self {
        Self::with_lookup(project, regions, |name| std::env::var(name).ok())
    }

    pub fn with_lookup<F>(project: impl Into<String>, regions: Vec<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            project: project.into(),
            regions,
            lookup: Box::new(lookup),
        }
    }

    /// `constraints`를 만족하는 리전 (설정 순서 유지)
    pub fn candidates(&self, constraints: &RegionConstraints) -> Vec<&str> {
        self.regions
            .iter()
            .filter(|r| constraints.approved.is_empty() || constraints.approved.contains(r))
            .filter(|r| !constraints.forbidden.contains(r))
            .map(String::as_str)
            .collect()
    }

    fn pick_region(&self, constraints: &RegionConstraints) -> Result<String, ExternalError> {
        let candidates = self.candidates(constraints);
        candidates
            .choose(&mut rand::thread_rng())
            .map(|r| (*r).to_owned())
            .ok_or_else(|| {
                ExternalError::check(
                    "gcp",
                    format!(
                        "no region left after filtering {} candidates (approved: {:?}, forbidden: {:?})",
                        self.regions.len(),
                        constraints.approved,
                        constraints.forbidden
                    ),
                )
            })
    }
}

impl CloudMetadata for GcpMetadata {
    fn project_id(&self) -> Result<String, ExternalError> {
        if !self.project.trim().is_empty() {
            return Ok(self.project.trim().to_owned());
        }
        for name in PROJECT_ENV_VARS {
            if let Some(value) = (self.lookup)(name).filter(|v| !v.trim().is_empty()) {
                debug!(source = name, "project resolved from environment");
                return Ok(value.trim().to_owned());
            }
        }
        Err(ExternalError::check(
            "gcp",
            format!("no project configured; set gcp.project or one of {PROJECT_ENV_VARS:?}"),
        ))
    }

    fn random_region<'a>(
        &'a self,
        project: &'a str,
        constraints: &'a RegionConstraints,
    ) -> BoxFuture<'a, Result<String, ExternalError>> {
        let picked = self.pick_region(constraints);
        if let Ok(region) = &picked {
            info!(project, region = region.as_str(), "using region");
        }
        Box::pin(async move { picked })
    }
}
