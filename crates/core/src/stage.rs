//! 스테이지 러너 — 이름 붙은 작업 단위를 한 번 실행하거나 건너뜁니다.
//!
//! 러너는 상태를 저장하지 않습니다. 영속화는 action 안에서
//! [`StateStore`](crate::store::StateStore)로 수행합니다.
//! action의 실패는 삼키지 않고 [`StageError`]로 호출자에게 전파합니다.
//! action 안의 panic도 [`StagehandError::Panicked`] 실패로 바뀌므로
//! 호출자의 cleanup과 다음 테스트 케이스는 계속 진행됩니다.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{StageError, StagehandError};
use crate::metrics as m;
use crate::skip::SkipPolicy;
use crate::workdir::WorkingDir;

/// 스테이지 한 번의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    /// action이 실행되어 성공함
    Ran,
    /// skip 신호로 action을 호출하지 않음
    Skipped,
    /// action이 실패함
    Failed,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ran => write!(f, "ran"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// 리포트용 스테이지 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub outcome: StageOutcome,
    pub elapsed_ms: u64,
}

/// 테스트 케이스 하나의 스테이지 러너
///
/// 실행한 스테이지를 순서대로 기록합니다.
pub struct StageRunner<'a> {
    working_dir: &'a WorkingDir,
    policy: &'a SkipPolicy,
    records: Vec<StageRecord>,
}

impl<'a> StageRunner<'a> {
    pub fn new(working_dir: &'a WorkingDir, policy: &'a SkipPolicy) -> Self {
        Self {
            working_dir,
            policy,
            records: Vec::new(),
        }
    }

    /// 지금까지의 스테이지 기록
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// 기록을 꺼내고 러너를 소비합니다.
    pub fn into_records(self) -> Vec<StageRecord> {
        self.records
    }

    /// 스테이지를 실행합니다.
    ///
    /// skip 정책이 이 스테이지를 건너뛰라고 하면 `action`을 호출하지 않고
    /// [`StageOutcome::Skipped`]를 돌려줍니다. 건너뛰기는 저장된 상태를 지우지 않으므로
    /// 이후 스테이지는 이전 실행이 저장한 값을 그대로 읽을 수 있습니다.
    pub async fn run_stage<F, Fut>(
        &mut self,
        stage: &str,
        action: F,
    ) -> Result<StageOutcome, StageError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), StagehandError>>,
    {
        let test_case = self.working_dir.test_case();
        let working_dir = self.working_dir.path().display().to_string();

        if self.policy.should_skip(stage) {
            info!(test_case, stage, working_dir = working_dir.as_str(), "stage skipped");
            self.record(stage, StageOutcome::Skipped, 0);
            return Ok(StageOutcome::Skipped);
        }

        info!(test_case, stage, working_dir = working_dir.as_str(), "stage started");
        let started = Instant::now();
        let result = match CatchPanic::new(action()).await {
            Ok(result) => result,
            Err(payload) => Err(StagehandError::Panicked(panic_message(payload.as_ref()))),
        };
        let elapsed = started.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        metrics::histogram!(m::STAGE_DURATION_SECONDS, m::LABEL_STAGE => stage.to_owned())
            .record(elapsed.as_secs_f64());

        match result {
            Ok(()) => {
                info!(test_case, stage, elapsed_ms, "stage completed");
                self.record(stage, StageOutcome::Ran, elapsed_ms);
                Ok(StageOutcome::Ran)
            }
            Err(e) => {
                error!(test_case, stage, elapsed_ms, error = %e, "stage failed");
                self.record(stage, StageOutcome::Failed, elapsed_ms);
                Err(StageError {
                    test_case: test_case.to_owned(),
                    stage: stage.to_owned(),
                    source: e,
                })
            }
        }
    }

    fn record(&mut self, stage: &str, outcome: StageOutcome, elapsed_ms: u64) {
        metrics::counter!(
            m::STAGE_RUNS_TOTAL,
            m::LABEL_STAGE => stage.to_owned(),
            m::LABEL_RESULT => outcome.to_string()
        )
        .increment(1);

        self.records.push(StageRecord {
            stage: stage.to_owned(),
            outcome,
            elapsed_ms,
        });
    }
}

/// poll 중 발생한 panic을 `Err(payload)`로 바꾸는 future
///
/// panic 이후에는 내부 future를 다시 poll하지 않습니다.
struct CatchPanic<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> CatchPanic<F> {
    fn new(inner: F) -> Self {
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = Result<F::Output, Box<dyn Any + Send>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.inner.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
