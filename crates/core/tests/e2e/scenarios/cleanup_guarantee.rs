//! Deferred cleanup: runs exactly once whenever options were built.

use crate::helpers::harness::*;
use crate::helpers::mock_collaborators::Failures;

use stagehand_core::{CaseState, SkipPolicy, Stage, TestCase};

fn public_only() -> Vec<TestCase> {
    vec![TestCase::new(PUBLIC, PUBLIC_EXAMPLE)]
}

/// Apply fails -> configure/verify never run, cleanup runs once.
#[tokio::test]
async fn test_e2e_apply_failure_still_cleans_up() {
    // Given: terraform apply fails for the public example
    let harness = Harness::with_failures(Failures::default().apply(PUBLIC_EXAMPLE));

    // When
    let report = harness
        .driver(SkipPolicy::run_all())
        .run(&public_only())
        .await;

    // Then
    let case = report.case(PUBLIC).unwrap();
    assert!(!case.passed);
    assert_eq!(case.failed_stage.as_deref(), Some("terraform_apply"));
    assert!(case.cleanup_ran);
    assert_eq!(case.state, CaseState::CleanedUp);
    assert_eq!(
        harness.log.timeline(&[PUBLIC, PUBLIC_EXAMPLE]),
        vec!["apply", "destroy"]
    );
    assert!(case.stage(Stage::ConfigureKubectl).is_none());
    assert!(case.stage(Stage::WaitForWorkers).is_none());
}

/// Configure fails -> verify never runs, cleanup runs once.
#[tokio::test]
async fn test_e2e_configure_failure_still_cleans_up() {
    let harness = Harness::with_failures(Failures::default().configure(PUBLIC));

    let report = harness
        .driver(SkipPolicy::run_all())
        .run(&public_only())
        .await;

    let case = report.case(PUBLIC).unwrap();
    assert_eq!(case.failed_stage.as_deref(), Some("configure_kubectl"));
    assert_eq!(
        harness.log.timeline(&[PUBLIC, PUBLIC_EXAMPLE]),
        vec!["apply", "shell", "destroy"]
    );
    assert_eq!(harness.log.count("destroy"), 1);
}

/// Preparing inputs fails -> provisioning never started, nothing to clean up.
#[tokio::test]
async fn test_e2e_prepare_failure_skips_cleanup() {
    let failures = Failures {
        copy: true,
        ..Failures::default()
    };
    let harness = Harness::with_failures(failures);

    let report = harness
        .driver(SkipPolicy::run_all())
        .run(&public_only())
        .await;

    let case = report.case(PUBLIC).unwrap();
    assert!(!case.passed);
    assert_eq!(case.state, CaseState::Init);
    assert_eq!(
        case.failed_stage.as_deref(),
        Some("create_test_copy_of_examples")
    );
    assert!(!case.cleanup_ran);
    assert_eq!(harness.log.count("destroy"), 0);
    assert_eq!(case.stages.len(), 1);
}

/// Building options fails -> state PreparedCopy, no cleanup.
#[tokio::test]
async fn test_e2e_options_failure_skips_cleanup() {
    let failures = Failures {
        project: true,
        ..Failures::default()
    };
    let harness = Harness::with_failures(failures);

    let report = harness
        .driver(SkipPolicy::run_all())
        .run(&public_only())
        .await;

    let case = report.case(PUBLIC).unwrap();
    assert_eq!(case.state, CaseState::PreparedCopy);
    assert_eq!(case.failed_stage.as_deref(), Some("create_terratest_options"));
    assert!(!case.cleanup_ran);
    assert_eq!(harness.log.count("apply"), 0);
    assert_eq!(harness.log.count("destroy"), 0);
}

/// Cleanup itself fails after a clean forward run -> case fails at cleanup.
#[tokio::test]
async fn test_e2e_cleanup_failure_fails_case() {
    let harness = Harness::with_failures(Failures::default().destroy(PUBLIC_EXAMPLE));

    let report = harness
        .driver(SkipPolicy::run_all())
        .run(&public_only())
        .await;

    let case = report.case(PUBLIC).unwrap();
    assert!(!case.passed);
    assert_eq!(case.failed_stage.as_deref(), Some("cleanup"));
    assert!(case.cleanup_ran);
    assert_eq!(case.state, CaseState::Verified);
    assert!(case.cleanup_error.is_none());
}

/// Verify and cleanup both fail -> first failure is reported, cleanup error kept separately.
#[tokio::test]
async fn test_e2e_cleanup_failure_after_verify_failure_keeps_both() {
    let harness = Harness::with_failures(
        Failures::default()
            .verify(PUBLIC)
            .destroy(PUBLIC_EXAMPLE),
    );

    let report = harness
        .driver(SkipPolicy::run_all())
        .run(&public_only())
        .await;

    let case = report.case(PUBLIC).unwrap();
    assert_eq!(case.failed_stage.as_deref(), Some("wait_for_workers"));
    assert!(
        case.cleanup_error
            .as_deref()
            .unwrap_or_default()
            .contains("destroy timed out")
    );
    assert_eq!(harness.log.count("destroy"), 1);
}

/// A failing case never stops the next one.
#[tokio::test]
async fn test_e2e_failure_does_not_cascade() {
    let harness = Harness::with_failures(Failures::default().apply(PUBLIC_EXAMPLE));

    let report = harness.driver(SkipPolicy::run_all()).run(&gke_cases()).await;

    assert!(!report.case(PUBLIC).unwrap().passed);
    assert!(report.case(PRIVATE).unwrap().passed);
    assert_eq!(harness.log.count("destroy"), 2);
}

/// A verifier panic is a stage failure: cleanup still runs and later cases still run.
#[tokio::test]
async fn test_e2e_verify_panic_still_cleans_up_and_continues() {
    // Given: the verifier panics for PrivateCluster, which runs first
    let harness = Harness::with_failures(Failures::default().panic_verify(PRIVATE));
    let driver = harness.driver(SkipPolicy::run_all());
    let cases = vec![
        TestCase::new(PRIVATE, PRIVATE_EXAMPLE),
        TestCase::new(PUBLIC, PUBLIC_EXAMPLE),
    ];

    // When: the suite runs on its own task, so an escaping panic would surface as a JoinError
    let report = tokio::spawn(async move { driver.run(&cases).await })
        .await
        .expect("suite task should not panic");

    // Then: PrivateCluster failed at verify and was destroyed
    let private = report.case(PRIVATE).expect("PrivateCluster reported");
    assert!(!private.passed);
    assert_eq!(private.failed_stage.as_deref(), Some("wait_for_workers"));
    let error = private.error.as_deref().unwrap_or_default();
    assert!(error.contains("panicked"), "{error}");
    assert!(error.contains("kubectl client crashed"), "{error}");
    assert!(private.cleanup_ran);
    assert_eq!(private.state, CaseState::CleanedUp);
    assert_eq!(
        harness.log.timeline(&[PRIVATE, PRIVATE_EXAMPLE]),
        vec!["apply", "shell", "verify", "destroy"]
    );

    // And: PublicCluster still ran to completion
    assert!(report.case(PUBLIC).expect("PublicCluster reported").passed);
    assert_eq!(harness.log.count("destroy"), 2);
}
