//! Terraform CLI 프로비저너
//!
//! [`TerraformCli`]는 번들의 `terraform_dir`에서 [`ShellExecutor`]로
//! `terraform init`/`apply`/`destroy`를 실행해 [`Provisioner`]를 구현합니다.
//! 출력이 번들의 재시도 가능 에러 패턴과 맞는 실패는 `max_retries`회까지 재시도합니다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use stagehand_core::{
    BoxFuture, CommandOutput, ExternalError, OptionsBundle, Provisioner, ShellCommand,
    ShellExecutor,
};

use crate::error::AdapterError;

/// 컴파일된 재시도 가능 에러 패턴 (정규식 -> 설명)
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    patterns: Vec<(Regex, String)>,
}

impl RetryPolicy {
    /// 모든 패턴을 컴파일합니다. 첫 번째로 잘못된 패턴을 보고합니다.
    pub fn compile(patterns: &BTreeMap<String, String>) -> Result<Self, AdapterError> {
        let patterns = patterns
            .iter()
            .map(|(pattern, description)| {
                Regex::new(pattern)
                    .map(|re| (re, description.clone()))
                    .map_err(|e| AdapterError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// `output`과 처음 일치하는 패턴의 설명
    pub fn matching(&self, output: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(re, _)| re.is_match(output))
            .map(|(_, description)| description.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// shell 실행기로 구동하는 `terraform`
pub struct TerraformCli {
    binary: String,
    shell: Arc<dyn ShellExecutor>,
}

impl TerraformCli {
    pub fn new(binary: impl Into<String>, shell: Arc<dyn ShellExecutor>) -> Self {
        Self {
            binary: binary.into(),
            shell,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self, options: &OptionsBundle, args: Vec<String>) -> ShellCommand {
        let mut command =
            ShellCommand::new(&self.binary, args).current_dir(&options.terraform_dir);
        for (key, value) in &options.env_vars {
            command = command.env(key, value);
        }
        command
    }

    async fn run_with_retries(
        &self,
        description: &str,
        command: ShellCommand,
        options: &OptionsBundle,
    ) -> Result<CommandOutput, ExternalError> {
        let policy = RetryPolicy::compile(&options.retryable_errors)
            .map_err(|e| ExternalError::check("terraform", e.to_string()))?;
        let wait = Duration::from_secs(options.time_between_retries_secs);

        let mut attempt = 0u32;
        loop {
            let err = match self.shell.run(&command).await {
                Ok(output) => return Ok(output),
                Err(err) => err,
            };

            let retryable = err.output().and_then(|output| policy.matching(output));
            match retryable {
                Some(reason) if attempt < options.max_retries => {
                    attempt += 1;
                    warn!(
                        step = description,
                        attempt,
                        max_retries = options.max_retries,
                        reason,
                        "retryable terraform error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                _ => return Err(err),
            }
        }
    }

    pub async fn init_and_apply(&self, options: &OptionsBundle) -> Result<(), ExternalError> {
        info!(dir = %options.terraform_dir.display(), "terraform init");
        self.run_with_retries("init", self.command(options, init_args(options)), options)
            .await?;

        info!(dir = %options.terraform_dir.display(), "terraform apply");
        self.run_with_retries("apply", self.command(options, apply_args(options)), options)
            .await?;
        Ok(())
    }

    pub async fn destroy(&self, options: &OptionsBundle) -> Result<(), ExternalError> {
        info!(dir = %options.terraform_dir.display(), "terraform destroy");
        self.run_with_retries(
            "destroy",
            self.command(options, destroy_args(options)),
            options,
        )
        .await?;
        Ok(())
    }
}

impl Provisioner for TerraformCli {
    fn init_and_apply<'a>(
        &'a self,
        options: &'a OptionsBundle,
    ) -> BoxFuture<'a, Result<(), ExternalError>> {
        Box::pin(TerraformCli::init_and_apply(self, options))
    }

    fn destroy<'a>(
        &'a self,
        options: &'a OptionsBundle,
    ) -> BoxFuture<'a, Result<(), ExternalError>> {
        Box::pin(TerraformCli::destroy(self, options))
    }
}

// ─── Argument builders ───────────────────────────────────────────────

/// `terraform init -input=false -upgrade=false`
pub fn init_args(options: &OptionsBundle) -> Vec<String> {
    let mut args = vec![
        "init".to_owned(),
        "-input=false".to_owned(),
        "-upgrade=false".to_owned(),
    ];
    push_no_color(&mut args, options);
    args
}

/// `terraform apply -input=false -auto-approve [-var-file f]... [-var k=v]...`
pub fn apply_args(options: &OptionsBundle) -> Vec<String> {
    let mut args = vec![
        "apply".to_owned(),
        "-input=false".to_owned(),
        "-auto-approve".to_owned(),
    ];
    push_var_args(&mut args, options);
    push_no_color(&mut args, options);
    args
}

/// `terraform destroy -auto-approve -input=false [-var-file f]... [-var k=v]...`
pub fn destroy_args(options: &OptionsBundle) -> Vec<String> {
    let mut args = vec![
        "destroy".to_owned(),
        "-auto-approve".to_owned(),
        "-input=false".to_owned(),
    ];
    push_var_args(&mut args, options);
    push_no_color(&mut args, options);
    args
}

fn push_var_args(args: &mut Vec<String>, options: &OptionsBundle) {
    for file in &options.var_files {
        args.push("-var-file".to_owned());
        args.push(file.display().to_string());
    }
    for (key, value) in &options.vars {
        args.push("-var".to_owned());
        args.push(format!("{key}={}", var_value(value)));
    }
}

fn push_no_color(args: &mut Vec<String>, options: &OptionsBundle) {
    if options.no_color {
        args.push("-no-color".to_owned());
    }
}

/// 문자열은 그대로, 리스트/맵/스칼라는 HCL이 받아들이는 JSON 문법으로 넘깁니다.
fn var_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
