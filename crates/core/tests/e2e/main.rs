//! E2E tests for the test case driver.
//!
//! These tests run the full stage sequence against recording mock
//! collaborators and a real on-disk state store in a temp directory.
//!
//! # Test Structure
//!
//! - `helpers/` -- mock collaborators, call log, harness builder
//! - `scenarios/` -- one file per behaviour (full run, cleanup, skip/resume, isolation)
//!
//! # Running
//!
//! ```bash
//! cargo test -p stagehand-core --test e2e
//! ```

mod helpers;
