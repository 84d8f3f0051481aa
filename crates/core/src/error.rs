//! 에러 타입 — 도메인별 에러 정의
//!
//! 분류:
//! - [`StoreError::NotFound`]: 저장된 적 없는 키를 읽음 (스테이지 순서 결함)
//! - [`StoreError::Serialization`]: 값 인코딩/디코딩 실패
//! - [`ExternalError`]: 외부 협력자(terraform, shell, kubectl) 실패
//!
//! 어떤 에러도 이 크레이트 안에서 재시도하지 않습니다.

use std::path::PathBuf;

/// Stagehand 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum StagehandError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스테이지 상태 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 외부 협력자 실패
    #[error("external failure: {0}")]
    External(#[from] ExternalError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 스테이지 action이 panic으로 중단됨
    #[error("stage panicked: {0}")]
    Panicked(String),
}

impl StagehandError {
    /// NotFound 계열 에러인지 확인합니다.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스테이지 상태 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 해당 키로 저장된 값이 없음
    #[error("no value saved for key '{key}' in {}", working_dir.display())]
    NotFound { working_dir: PathBuf, key: String },

    /// 값 직렬화/역직렬화 실패
    #[error("failed to (de)serialize key '{key}': {reason}")]
    Serialization { key: String, reason: String },

    /// 저장 키 또는 테스트 케이스 이름이 경로 세그먼트로 부적합
    #[error("invalid {kind} '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// 파일 I/O 실패
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 외부 협력자 실패
///
/// 프로비저닝 도구, shell 명령, 클러스터 검증이 반환한 실패를 담습니다.
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    /// 명령 실행 자체가 불가능함
    #[error("failed to launch '{command}': {reason}")]
    Spawn { command: String, reason: String },

    /// 명령이 0이 아닌 종료 코드로 끝남
    #[error("'{command}' exited with {}: {}", exit_label(*code), tail(output))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// 협력자 고유의 검사 실패
    #[error("{collaborator}: {reason}")]
    Check {
        collaborator: &'static str,
        reason: String,
    },
}

impl ExternalError {
    /// 검사 실패 에러를 생성합니다.
    pub fn check(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self::Check {
            collaborator,
            reason: reason.into(),
        }
    }

    /// 명령 출력 (재시도 패턴 매칭용)
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// 스테이지 실패. 테스트 케이스와 스테이지 이름을 함께 보고합니다.
#[derive(Debug, thiserror::Error)]
#[error("test case '{test_case}' failed at stage '{stage}': {source}")]
pub struct StageError {
    pub test_case: String,
    pub stage: String,
    #[source]
    pub source: StagehandError,
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "signal".to_owned(),
    }
}

/// 에러 메시지에는 출력의 마지막 몇 줄만 포함합니다.
fn tail(output: &str) -> String {
    const MAX_LINES: usize = 5;
    let lines: Vec<&str> = output.trim_end().lines().collect();
    let start = lines.len().saturating_sub(MAX_LINES);
    lines[start..].join(" | ")
}
