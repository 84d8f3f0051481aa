//! 워커 노드 준비 상태 확인 -- `kubectl` 폴링
//!
//! [`KubectlNodeVerifier`]는 모든 노드가 `Ready=True`가 되거나 재시도 횟수가
//! 소진될 때까지 `kubectl --kubeconfig <케이스 kubeconfig> get nodes -o json`을
//! 폴링합니다. kubeconfig는 항상 케이스의 [`ClusterContext`]에서 가져오며
//! 프로세스의 `KUBECONFIG`는 참조하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use stagehand_core::{
    BoxFuture, ClusterContext, ClusterVerifier, ExternalError, ShellCommand, ShellExecutor,
};

#[derive(Debug, Default, Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<Node>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Node {
    metadata: NodeMetadata,
    status: NodeStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NodeMetadata {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NodeStatus {
    conditions: Vec<NodeCondition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NodeCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

impl Node {
    fn is_ready(&self) -> bool {
        self.status
            .conditions
            .iter()
            .any(|c| c.kind == "Ready" && c.status == "True")
    }
}

/// `kubectl get nodes -o json` 결과의 준비 상태 요약
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReadiness {
    pub total: usize,
    pub not_ready: Vec<String>,
}

impl NodeReadiness {
    pub fn ready(&self) -> usize {
        self.total - self.not_ready.len()
    }

    /// 노드가 하나 이상이고 모두 준비됐는지 (`expected`가 0이 아니면 개수도 확인)
    pub fn is_satisfied(&self, expected: usize) -> bool {
        self.total > 0 && self.not_ready.is_empty() && (expected == 0 || self.total == expected)
    }

    fn describe(&self, expected: usize) -> String {
        let mut msg = format!("{} of {} nodes ready", self.ready(), self.total);
        if expected > 0 && self.total != expected {
            msg.push_str(&format!(", expected {expected} nodes"));
        }
        if !self.not_ready.is_empty() {
            msg.push_str(&format!(", not ready: {}", self.not_ready.join(", ")));
        }
        msg
    }
}

/// 노드 목록 JSON을 파싱합니다.
pub fn node_readiness(json: &str) -> Result<NodeReadiness, ExternalError> {
    let list: NodeList = serde_json::from_str(json)
        .map_err(|e| ExternalError::check("kubectl", format!("unparseable node list: {e}")))?;
    Ok(NodeReadiness {
        total: list.items.len(),
        not_ready: list
            .items
            .iter()
            .filter(|n| !n.is_ready())
            .map(|n| n.metadata.name.clone())
            .collect(),
    })
}

pub struct KubectlNodeVerifier {
    binary: String,
    shell: Arc<dyn ShellExecutor>,
    retries: u32,
    interval: Duration,
    expected_nodes: usize,
}

impl KubectlNodeVerifier {
    pub fn new(binary: impl Into<String>, shell: Arc<dyn ShellExecutor>) -> Self {
        Self {
            binary: binary.into(),
            shell,
            retries: 30,
            interval: Duration::from_secs(10),
            expected_nodes: 0,
        }
    }

    /// 최대 `retries`회(최소 1회) 폴링하고, 사이마다 `interval`만큼 대기합니다.
    pub fn with_polling(mut self, retries: u32, interval: Duration) -> Self {
        self.retries = retries.max(1);
        self.interval = interval;
        self
    }

    pub fn with_expected_nodes(mut self, expected: usize) -> Self {
        self.expected_nodes = expected;
        self
    }

    /// `kubectl --kubeconfig <path> get nodes -o json`
    pub fn get_nodes_command(&self, context: &ClusterContext) -> ShellCommand {
        ShellCommand::new(
            &self.binary,
            [
                "--kubeconfig".to_owned(),
                context.kubeconfig.display().to_string(),
                "get".to_owned(),
                "nodes".to_owned(),
                "-o".to_owned(),
                "json".to_owned(),
            ],
        )
    }

    async fn poll_once(&self, command: &ShellCommand) -> Result<NodeReadiness, ExternalError> {
        let output = self.shell.run(command).await?;
        node_readiness(&output.stdout)
    }

    pub async fn wait_for_ready(&self, context: &ClusterContext) -> Result<(), ExternalError> {
        let command = self.get_nodes_command(context);
        let mut last = String::new();

        for attempt in 1..=self.retries {
            match self.poll_once(&command).await {
                Ok(readiness) if readiness.is_satisfied(self.expected_nodes) => {
                    info!(
                        cluster = context.cluster_name.as_str(),
                        nodes = readiness.total,
                        attempt,
                        "all worker nodes ready"
                    );
                    return Ok(());
                }
                Ok(readiness) => {
                    last = readiness.describe(self.expected_nodes);
                    debug!(
                        cluster = context.cluster_name.as_str(),
                        attempt,
                        status = %last,
                        "nodes not ready yet"
                    );
                }
                Err(e) => {
                    last = e.to_string();
                    warn!(
                        cluster = context.cluster_name.as_str(),
                        attempt,
                        error = %e,
                        "node listing failed"
                    );
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(ExternalError::check(
            "kubectl",
            format!(
                "cluster '{}' nodes not ready after {} attempts: {last}",
                context.cluster_name, self.retries
            ),
        ))
    }
}

impl ClusterVerifier for KubectlNodeVerifier {
    fn verify<'a>(
        &'a self,
        context: &'a ClusterContext,
    ) -> BoxFuture<'a, Result<(), ExternalError>> {
        Box::pin(self.wait_for_ready(context))
    }
}
