//! 어댑터 구성 에러 타입
//!
//! 실행 중 실패는 코어의 [`ExternalError`](stagehand_core::ExternalError)로 보고합니다.
//! [`AdapterError`]는 어댑터를 설정값으로 조립하는 단계의 에러만 다룹니다.
//! `From<AdapterError> for StagehandError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use stagehand_core::{ConfigError, StagehandError};

/// 어댑터 조립 에러
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// 재시도 가능 에러 패턴이 올바른 정규식이 아님
    #[error("invalid retryable error pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// 문제가 된 패턴
        pattern: String,
        /// 컴파일 실패 사유
        reason: String,
    },

    /// 설정값 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<AdapterError> for StagehandError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::InvalidPattern { pattern, reason } => {
                StagehandError::Config(ConfigError::InvalidValue {
                    field: "terraform.retryable_errors".to_owned(),
                    reason: format!("'{pattern}': {reason}"),
                })
            }
            AdapterError::Config { field, reason } => {
                StagehandError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
