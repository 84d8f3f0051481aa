#![doc = include_str!("../README.md")]

pub mod cleanup;
pub mod collaborator;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod skip;
pub mod stage;
pub mod store;
pub mod types;
pub mod workdir;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ExternalError, StageError, StagehandError, StoreError};

// 설정
pub use config::StagehandConfig;

// 협력자 trait
pub use collaborator::{
    BoxFuture, CloudMetadata, ClusterVerifier, Collaborators, IdGenerator, InputPreparer,
    Provisioner, RegionConstraints, ShellExecutor,
};

// 오케스트레이션
pub use cleanup::CleanupGuard;
pub use driver::{CaseReport, SuiteReport, SuiteSettings, TestCaseDriver};
pub use skip::{SkipPolicy, StageDirective};
pub use stage::{StageOutcome, StageRecord, StageRunner};
pub use store::StateStore;
pub use workdir::{WorkingDir, allocate};

// 도메인 타입
pub use types::{
    CaseState, ClusterContext, CommandOutput, OptionsBundle, ShellCommand, Stage, TestCase,
};
