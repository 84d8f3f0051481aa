//! 메트릭 상수
//!
//! 모든 메트릭 이름을 중앙에서 정의합니다. exporter는 설치하지 않으며,
//! recorder가 없으면 `metrics` 매크로는 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `stagehand_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

/// 스테이지 이름 레이블 키
pub const LABEL_STAGE: &str = "stage";

/// 결과 레이블 키 (ran, skipped, failed / passed, failed)
pub const LABEL_RESULT: &str = "result";

/// 스테이지 실행 횟수 (counter, labels: stage, result)
pub const STAGE_RUNS_TOTAL: &str = "stagehand_stage_runs_total";

/// 스테이지 소요 시간 (histogram, 초, label: stage)
pub const STAGE_DURATION_SECONDS: &str = "stagehand_stage_duration_seconds";

/// 테스트 케이스 결과 수 (counter, label: result)
pub const TEST_CASES_TOTAL: &str = "stagehand_test_cases_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    metrics::describe_counter!(STAGE_RUNS_TOTAL, "Stage invocations by outcome");
    metrics::describe_histogram!(
        STAGE_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock time spent inside a stage action"
    );
    metrics::describe_counter!(TEST_CASES_TOTAL, "Finished test cases by result");
}
