//! `stagehand run` command handler

use std::collections::HashSet;
use std::io::Write;

use tracing::info;

use stagehand_core::{
    Collaborators, SkipPolicy, Stage, StageOutcome, StagehandConfig, SuiteReport, SuiteSettings,
    TestCase, TestCaseDriver,
};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command with the production adapters.
pub async fn execute(
    args: RunArgs,
    config: StagehandConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let collaborators = stagehand_adapters::collaborators(&config)?;
    stagehand_core::metrics::describe_all();
    let report = run_suite(&args, config, collaborators).await?;

    writer.render(&report)?;

    if !report.all_passed() {
        return Err(CliError::TestsFailed {
            failed: report.failed(),
            total: report.cases.len(),
        });
    }
    Ok(())
}

/// Resolve cases and skip policy from `args`, then drive the suite.
pub async fn run_suite(
    args: &RunArgs,
    mut config: StagehandConfig,
    collaborators: Collaborators,
) -> Result<SuiteReport, CliError> {
    if let Some(dir) = &args.stages_dir {
        config.suite.stages_dir = dir.display().to_string();
    }

    let cases = select_cases(&config.suite.test_cases, &args.cases)?;
    let policy = skip_policy(&config, &args.skip)?;

    info!(
        stages_dir = config.suite.stages_dir.as_str(),
        test_cases = cases.len(),
        "running suite"
    );

    let driver = TestCaseDriver::new(SuiteSettings::from_config(&config), collaborators, policy);
    Ok(driver.run(&cases).await)
}

/// Test cases named by `--case`, in configured order; all of them when none given.
pub fn select_cases(configured: &[TestCase], filter: &[String]) -> Result<Vec<TestCase>, CliError> {
    if filter.is_empty() {
        return Ok(configured.to_vec());
    }

    let known: HashSet<&str> = configured.iter().map(|c| c.name.as_str()).collect();
    if let Some(unknown) = filter.iter().find(|name| !known.contains(name.as_str())) {
        let names: Vec<&str> = configured.iter().map(|c| c.name.as_str()).collect();
        return Err(CliError::Command(format!(
            "unknown test case '{unknown}' (configured: {})",
            names.join(", ")
        )));
    }

    Ok(configured
        .iter()
        .filter(|c| filter.contains(&c.name))
        .cloned()
        .collect())
}

/// Config `skip` list plus `SKIP_*` env signals plus `--skip` flags.
pub fn skip_policy(config: &StagehandConfig, extra: &[String]) -> Result<SkipPolicy, CliError> {
    for name in extra {
        name.parse::<Stage>().map_err(CliError::Command)?;
    }
    let from_flags: SkipPolicy = extra.iter().cloned().collect();
    Ok(config.skip_policy().merge(from_flags))
}

impl Render for SuiteReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Suite run {} ({} ms)",
            self.run_id.to_string().bold(),
            self.elapsed_ms
        )?;

        for case in &self.cases {
            writeln!(w)?;
            let verdict = if case.passed {
                "PASSED".green().bold()
            } else {
                "FAILED".red().bold()
            };
            writeln!(w, "{} {} ({})", verdict, case.name.bold(), case.example)?;
            writeln!(w, "  working dir: {}", case.working_dir.display())?;

            for record in &case.stages {
                let outcome = match record.outcome {
                    StageOutcome::Ran => "ran".green(),
                    StageOutcome::Skipped => "skipped".yellow(),
                    StageOutcome::Failed => "failed".red(),
                };
                writeln!(
                    w,
                    "  {:<30} {:<8} {:>8} ms",
                    record.stage, outcome, record.elapsed_ms
                )?;
            }

            writeln!(w, "  state: {}", case.state)?;
            if let Some(error) = &case.error {
                let stage = case.failed_stage.as_deref().unwrap_or("setup");
                writeln!(w, "  error at {}: {}", stage.red(), error)?;
            }
            if let Some(error) = &case.cleanup_error {
                writeln!(w, "  cleanup error: {}", error.red())?;
            }
            if !case.cleanup_ran && case.state.needs_cleanup() {
                writeln!(
                    w,
                    "  {}",
                    "cleanup did not run; provisioned resources may still exist".yellow()
                )?;
            }
        }

        writeln!(w)?;
        let summary = format!("{} passed, {} failed", self.passed(), self.failed());
        if self.all_passed() {
            writeln!(w, "{}", summary.green().bold())
        } else {
            writeln!(w, "{}", summary.red().bold())
        }
    }
}
