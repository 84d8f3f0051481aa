//! `stagehand stages` command handler

use std::io::Write;

use serde::Serialize;

use stagehand_core::{SkipPolicy, Stage, StagehandConfig};

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `stages` command.
pub fn execute(config: &StagehandConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let report = StagesReport::new(&config.suite.skip_env_prefix, &config.skip_policy());
    writer.render(&report)
}

/// Stage listing with the variable that skips each one.
#[derive(Serialize)]
pub struct StagesReport {
    pub skip_env_prefix: String,
    pub stages: Vec<StageEntry>,
}

#[derive(Serialize)]
pub struct StageEntry {
    pub name: String,
    pub skip_var: String,
    pub skipped: bool,
}

impl StagesReport {
    pub fn new(prefix: &str, policy: &SkipPolicy) -> Self {
        Self {
            skip_env_prefix: prefix.to_owned(),
            stages: Stage::ALL
                .iter()
                .map(|stage| StageEntry {
                    name: stage.name().to_owned(),
                    skip_var: format!("{prefix}{}", stage.name()),
                    skipped: policy.should_skip(stage.name()),
                })
                .collect(),
        }
    }
}

impl Render for StagesReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{:<4} {:<30} {:<40} Directive", "#", "Stage", "Skip variable")?;
        writeln!(w, "{}", "-".repeat(86))?;
        for (i, stage) in self.stages.iter().enumerate() {
            let directive = if stage.skipped {
                "skip".yellow()
            } else {
                "run".green()
            };
            writeln!(
                w,
                "{:<4} {:<30} {:<40} {}",
                i + 1,
                stage.name,
                stage.skip_var,
                directive
            )?;
        }
        Ok(())
    }
}
