#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Assembly errors (`AdapterError`)
//! - [`shell`]: Child process execution (`CommandExecutor`)
//! - [`terraform`]: Provisioning via the terraform CLI (`TerraformCli`, `RetryPolicy`)
//! - [`gcp`]: Project and region resolution (`GcpMetadata`)
//! - [`kubectl`]: Worker node readiness (`KubectlNodeVerifier`)
//! - [`copy`]: Private copies of the example modules (`TempCopyPreparer`)
//! - [`ids`]: Base62 unique ids (`RandomIds`)

pub mod copy;
pub mod error;
pub mod gcp;
pub mod ids;
pub mod kubectl;
pub mod shell;
pub mod terraform;

use std::sync::Arc;
use std::time::Duration;

use stagehand_core::{Collaborators, ShellExecutor, StagehandConfig};

pub use copy::TempCopyPreparer;
pub use error::AdapterError;
pub use gcp::{GcpMetadata, PROJECT_ENV_VARS};
pub use ids::RandomIds;
pub use kubectl::{KubectlNodeVerifier, NodeReadiness, node_readiness};
pub use shell::CommandExecutor;
pub use terraform::{RetryPolicy, TerraformCli};

/// 검증된 설정으로 운영용 협력자를 조립합니다.
///
/// 재시도 가능 에러 패턴은 여기서 한 번 컴파일하므로, 잘못된 정규식은
/// 실행 도중이 아니라 시작 시점의 설정 에러가 됩니다.
pub fn collaborators(config: &StagehandConfig) -> Result<Collaborators, AdapterError> {
    RetryPolicy::compile(&config.terraform.retryable_errors)?;
    if config.kubectl.node_ready_retries == 0 {
        return Err(AdapterError::Config {
            field: "kubectl.node_ready_retries".to_owned(),
            reason: "must be at least 1".to_owned(),
        });
    }

    let shell: Arc<dyn ShellExecutor> = Arc::new(CommandExecutor::new());

    Ok(Collaborators {
        inputs: Arc::new(TempCopyPreparer::new()),
        ids: Arc::new(RandomIds),
        metadata: Arc::new(GcpMetadata::new(
            config.gcp.project.clone(),
            config.gcp.regions.clone(),
        )),
        provisioner: Arc::new(TerraformCli::new(
            config.terraform.binary.clone(),
            Arc::clone(&shell),
        )),
        verifier: Arc::new(
            KubectlNodeVerifier::new(config.kubectl.kubectl_binary.clone(), Arc::clone(&shell))
                .with_polling(
                    config.kubectl.node_ready_retries,
                    Duration::from_secs(config.kubectl.node_ready_interval_secs),
                )
                .with_expected_nodes(config.kubectl.expected_nodes),
        ),
        shell,
    })
}
