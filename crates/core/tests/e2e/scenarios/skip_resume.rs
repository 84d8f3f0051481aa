//! Skip signals: resume a partially completed run from persisted state.

use stagehand_core::driver::UNIQUE_ID_KEY;
use stagehand_core::{CaseState, SkipPolicy, Stage, StageOutcome, TestCase};

use crate::helpers::harness::*;

fn public_only() -> Vec<TestCase> {
    vec![TestCase::new(PUBLIC, PUBLIC_EXAMPLE)]
}

/// Skipping cleanup leaves the case passed but not cleaned up.
#[tokio::test]
async fn test_e2e_skip_cleanup_keeps_resources() {
    // Given: SKIP_cleanup
    let harness = Harness::new();
    let policy = SkipPolicy::run_all().skip(Stage::Cleanup.name());

    // When
    let report = harness.driver(policy).run(&public_only()).await;

    // Then: No destroy call, state stops at Verified
    let case = report.case(PUBLIC).unwrap();
    assert!(case.passed);
    assert!(!case.cleanup_ran);
    assert_eq!(case.state, CaseState::Verified);
    assert_eq!(
        case.stage(Stage::Cleanup).unwrap().outcome,
        StageOutcome::Skipped
    );
    assert_eq!(harness.log.count("destroy"), 0);
    assert!(harness.store(PUBLIC).load_options().is_ok());
}

/// Second run skips setup stages and reuses the persisted cluster identity.
#[tokio::test]
async fn test_e2e_resume_reuses_persisted_options() {
    // Given: A first run that provisioned and kept the cluster
    let harness = Harness::new();
    let keep = SkipPolicy::run_all().skip(Stage::Cleanup.name());
    let first = harness.driver(keep).run(&public_only()).await;
    assert!(first.all_passed());
    let saved_id = harness
        .store(PUBLIC)
        .load_string(UNIQUE_ID_KEY)
        .expect("unique id persisted");

    // When: Re-running with setup and apply skipped
    let resume: SkipPolicy = [
        Stage::CreateTestCopyOfExamples,
        Stage::CreateTerratestOptions,
        Stage::TerraformApply,
    ]
    .iter()
    .map(|s| s.name())
    .collect();
    let second = harness.driver(resume).run(&public_only()).await;

    // Then: Second run passes without copying, generating ids, or applying
    let case = second.case(PUBLIC).unwrap();
    assert!(case.passed, "report: {case:#?}");
    assert_eq!(harness.log.count("copy"), 1);
    assert_eq!(harness.log.count("apply"), 1);
    assert_eq!(harness.log.count("destroy"), 1);
    assert_eq!(
        harness
            .store(PUBLIC)
            .load_string(UNIQUE_ID_KEY)
            .expect("unique id still persisted"),
        saved_id
    );

    // Both verifications saw the same cluster
    let contexts = harness.verified_contexts();
    assert_eq!(contexts.len(), 2);
    assert_eq!(contexts[0].cluster_name, contexts[1].cluster_name);
    assert_eq!(
        contexts[0].cluster_name,
        format!("gke-cluster-{}", saved_id.to_lowercase())
    );

    let skipped: Vec<&str> = case
        .stages
        .iter()
        .filter(|r| r.outcome == StageOutcome::Skipped)
        .map(|r| r.stage.as_str())
        .collect();
    assert_eq!(
        skipped,
        vec![
            "create_test_copy_of_examples",
            "create_terratest_options",
            "terraform_apply"
        ]
    );
}

/// Skipping options on a fresh working directory surfaces NotFound at the next stage.
#[tokio::test]
async fn test_e2e_skip_options_without_state_fails_not_found() {
    // Given: Nothing persisted and both setup stages skipped
    let harness = Harness::new();
    let policy = SkipPolicy::run_all()
        .skip(Stage::CreateTestCopyOfExamples.name())
        .skip(Stage::CreateTerratestOptions.name());

    // When
    let report = harness.driver(policy).run(&public_only()).await;

    // Then: Apply fails on the missing options bundle
    let case = report.case(PUBLIC).unwrap();
    assert!(!case.passed);
    assert_eq!(case.failed_stage.as_deref(), Some("terraform_apply"));
    let error = case.error.as_deref().unwrap_or_default();
    assert!(error.contains("TerraformOptions"), "error: {error}");
    assert_eq!(harness.log.count("apply"), 0);

    // Cleanup was attempted and hit the same missing state
    assert!(case.cleanup_ran);
    assert!(case.cleanup_error.is_some());
    assert_eq!(harness.log.count("destroy"), 0);
}

/// Only the persisted state of the skipped stage is reused; earlier values survive untouched.
#[tokio::test]
async fn test_e2e_skip_does_not_touch_persisted_values() {
    let harness = Harness::new();
    let keep = SkipPolicy::run_all().skip(Stage::Cleanup.name());
    harness.driver(keep).run(&public_only()).await;

    let store = harness.store(PUBLIC);
    let before = store.keys().expect("keys listed");

    let skip_all: SkipPolicy = Stage::ALL.iter().map(|s| s.name()).collect();
    let report = harness.driver(skip_all).run(&public_only()).await;

    let case = report.case(PUBLIC).unwrap();
    assert!(case.passed);
    assert!(
        case.stages
            .iter()
            .all(|r| r.outcome == StageOutcome::Skipped)
    );
    assert_eq!(store.keys().expect("keys listed"), before);
}
