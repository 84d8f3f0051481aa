//! shell 명령 실행 -- `tokio::process`
//!
//! [`CommandExecutor`]는 운영용 [`ShellExecutor`]입니다. CLI를 호출하는 다른
//! 어댑터(terraform, kubectl)는 모두 `ShellExecutor` trait을 거치므로
//! 테스트에서는 스크립트된 실행기로 바꿔 끼울 수 있습니다.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info, warn};

use stagehand_core::{BoxFuture, CommandOutput, ExternalError, ShellCommand, ShellExecutor};

/// [`ShellCommand`]를 자식 프로세스로 실행하고 출력을 수집합니다.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    timeout: Option<Duration>,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `timeout`보다 오래 걸리면 자식 프로세스를 종료하고 실패합니다.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 명령을 끝까지 실행합니다.
    ///
    /// 0이 아닌 종료 코드는 stdout/stderr를 합친 출력을 담은
    /// [`ExternalError::CommandFailed`]가 되어, 호출자가 재시도 패턴을 매칭할 수 있습니다.
    pub async fn execute(&self, command: &ShellCommand) -> Result<CommandOutput, ExternalError> {
        let line = command.display_line();
        let mut cmd = Command::new(&command.command);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        debug!(command = %line, "running command");
        let started = Instant::now();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| {
                    warn!(command = %line, timeout = ?limit, "command timed out");
                    ExternalError::check("shell", format!("'{line}' timed out after {limit:?}"))
                })?,
            None => cmd.output().await,
        }
        .map_err(|e| ExternalError::Spawn {
            command: line.clone(),
            reason: e.to_string(),
        })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if output.status.success() {
            info!(command = %line, elapsed_ms, "command succeeded");
            Ok(result)
        } else {
            warn!(
                command = %line,
                code = ?output.status.code(),
                elapsed_ms,
                "command failed"
            );
            Err(ExternalError::CommandFailed {
                command: line,
                code: output.status.code(),
                output: result.combined(),
            })
        }
    }
}

impl ShellExecutor for CommandExecutor {
    fn run<'a>(
        &'a self,
        command: &'a ShellCommand,
    ) -> BoxFuture<'a, Result<CommandOutput, ExternalError>> {
        Box::pin(self.execute(command))
    }
}
