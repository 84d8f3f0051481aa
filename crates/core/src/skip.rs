//! 스테이지 건너뛰기 정책
//!
//! 러너는 환경을 직접 읽지 않습니다. 드라이버에 넘겨지는 [`SkipPolicy`]가
//! 스테이지 이름별 `Run`/`Skip` 지시를 명시적으로 담습니다.
//!
//! 환경 변수 규칙: `<prefix><stage_name>` (기본 prefix `SKIP_`).
//! 값이 비어 있지 않고 `0`, `false`, `no`가 아니면 건너뜁니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// 기본 skip 환경 변수 접두어
pub const DEFAULT_SKIP_ENV_PREFIX: &str = "SKIP_";

/// 스테이지 하나에 대한 지시
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageDirective {
    #[default]
    Run,
    Skip,
}

/// 스테이지 이름 → 지시 매핑
///
/// 등록되지 않은 스테이지는 실행됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPolicy {
    directives: BTreeMap<String, StageDirective>,
}

impl SkipPolicy {
    /// 모든 스테이지를 실행하는 정책
    pub fn run_all() -> Self {
        Self::default()
    }

    /// 스테이지를 건너뛰도록 표시합니다.
    pub fn skip(mut self, stage: impl Into<String>) -> Self {
        self.set(stage, StageDirective::Skip);
        self
    }

    /// 지시를 설정합니다 (기존 지시는 덮어씀).
    pub fn set(&mut self, stage: impl Into<String>, directive: StageDirective) {
        self.directives.insert(stage.into(), directive);
    }

    /// 스테이지의 지시
    pub fn directive(&self, stage: &str) -> StageDirective {
        self.directives.get(stage).copied().unwrap_or_default()
    }

    pub fn should_skip(&self, stage: &str) -> bool {
        self.directive(stage) == StageDirective::Skip
    }

    /// 건너뛸 스테이지 이름 목록
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.directives
            .iter()
            .filter(|(_, d)| **d == StageDirective::Skip)
            .map(|(name, _)| name.as_str())
    }

    /// 프로세스 환경에서 skip 신호를 읽습니다.
    pub fn from_env<'a>(prefix: &str, stages: impl IntoIterator<Item = &'a str>) -> Self {
        Self::from_lookup(prefix, stages, |key| std::env::var(key).ok())
    }

    /// 임의 조회 함수로 skip 신호를 읽습니다.
    ///
    /// 변수가 없으면 지시를 남기지 않고, 거짓 값(`0`, `false`, `no`, 빈 값)이면
    /// [`StageDirective::Run`]을 명시적으로 기록합니다.
    pub fn from_lookup<'a, F>(
        prefix: &str,
        stages: impl IntoIterator<Item = &'a str>,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut policy = Self::default();
        for stage in stages {
            let var = format!("{prefix}{stage}");
            let Some(value) = lookup(&var) else {
                continue;
            };
            // 설정된 거짓 값은 앞선 정책의 skip을 되돌릴 수 있도록 Run으로 기록
            let directive = if is_truthy(&value) {
                StageDirective::Skip
            } else {
                StageDirective::Run
            };
            debug!(stage, var = var.as_str(), ?directive, "skip signal read");
            policy.set(stage, directive);
        }
        policy
    }

    /// 다른 정책을 합칩니다. `other`의 지시가 우선합니다.
    pub fn merge(mut self, other: SkipPolicy) -> Self {
        self.directives.extend(other.directives);
        self
    }
}

impl<S: Into<String>> FromIterator<S> for SkipPolicy {
    /// 주어진 스테이지들을 모두 건너뛰는 정책
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut policy = Self::default();
        for stage in iter {
            policy.set(stage, StageDirective::Skip);
        }
        policy
    }
}

fn is_truthy(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty()
        && !v.eq_ignore_ascii_case("0")
        && !v.eq_ignore_ascii_case("false")
        && !v.eq_ignore_ascii_case("no")
}
