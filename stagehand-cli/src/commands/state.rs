//! `stagehand state` command handler
//!
//! Read-only inspection and operator-driven deletion of the values persisted
//! under `<stages_dir>/<case>/.test-data`. Nothing else deletes them.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use stagehand_core::{StagehandConfig, StateStore, allocate};

use crate::cli::{StateAction, StateArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `state` command.
pub fn execute(
    args: StateArgs,
    config: &StagehandConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let stages_dir = Path::new(&config.suite.stages_dir);
    match args.action {
        StateAction::List => writer.render(&list(config, stages_dir)?),
        StateAction::Show { case } => writer.render(&show(stages_dir, &case)?),
        StateAction::Clean { case } => writer.render(&clean(stages_dir, &case)?),
    }
}

/// Configured test cases and their persisted keys.
pub fn list(config: &StagehandConfig, stages_dir: &Path) -> Result<StateListReport, CliError> {
    let mut cases = Vec::new();
    for case in &config.suite.test_cases {
        let wd = allocate(stages_dir, &case.name)?;
        let keys = StateStore::new(&wd).keys()?;
        cases.push(StateListEntry {
            name: case.name.clone(),
            working_dir: wd.path().display().to_string(),
            keys,
        });
    }
    Ok(StateListReport { cases })
}

/// Every persisted value of one case, as raw JSON.
pub fn show(stages_dir: &Path, case: &str) -> Result<StateReport, CliError> {
    let wd = allocate(stages_dir, case)?;
    let store = StateStore::new(&wd);

    let mut values = BTreeMap::new();
    for key in store.keys()? {
        let value = store.load_raw(&key)?;
        values.insert(key, value);
    }

    Ok(StateReport {
        case: case.to_owned(),
        data_dir: store.data_dir().display().to_string(),
        values,
    })
}

/// Delete one case's persisted values.
pub fn clean(stages_dir: &Path, case: &str) -> Result<CleanReport, CliError> {
    let wd = allocate(stages_dir, case)?;
    let store = StateStore::new(&wd);
    let removed = store.clear()?;
    info!(test_case = case, removed, "state cleaned");

    Ok(CleanReport {
        case: case.to_owned(),
        data_dir: store.data_dir().display().to_string(),
        removed,
    })
}

#[derive(Serialize)]
pub struct StateListReport {
    pub cases: Vec<StateListEntry>,
}

#[derive(Serialize)]
pub struct StateListEntry {
    pub name: String,
    pub working_dir: String,
    pub keys: Vec<String>,
}

impl Render for StateListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{:<20} {:<40} Persisted keys", "Test case", "Working dir")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for case in &self.cases {
            let keys = if case.keys.is_empty() {
                "(none)".dimmed()
            } else {
                case.keys.join(", ").normal()
            };
            writeln!(w, "{:<20} {:<40} {}", case.name, case.working_dir, keys)?;
        }
        Ok(())
    }
}

/// Persisted values of a test case.
#[derive(Serialize)]
pub struct StateReport {
    pub case: String,
    pub data_dir: String,
    pub values: BTreeMap<String, serde_json::Value>,
}

impl Render for StateReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "State of {} ({})", self.case.bold(), self.data_dir)?;
        if self.values.is_empty() {
            writeln!(w, "  {}", "no persisted values".dimmed())?;
            return Ok(());
        }
        for (key, value) in &self.values {
            match value {
                serde_json::Value::String(s) => writeln!(w, "  {}: {}", key.bold(), s)?,
                other => {
                    let pretty = serde_json::to_string_pretty(other)
                        .unwrap_or_else(|_| other.to_string());
                    writeln!(w, "  {}:", key.bold())?;
                    for line in pretty.lines() {
                        writeln!(w, "    {line}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct CleanReport {
    pub case: String,
    pub data_dir: String,
    pub removed: bool,
}

impl Render for CleanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.removed {
            writeln!(w, "{} removed {}", "✓".green(), self.data_dir)
        } else {
            writeln!(w, "nothing to remove for {}", self.case.bold())
        }
    }
}
