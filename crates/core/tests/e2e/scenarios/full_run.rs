//! Full suite run: every stage executes for every test case.

use stagehand_core::driver::{MODULE_PATH_KEY, PROJECT_KEY, REGION_KEY, UNIQUE_ID_KEY};
use stagehand_core::{CaseState, SkipPolicy, Stage, StageOutcome};

use crate::helpers::harness::*;
use crate::helpers::mock_collaborators::Failures;

/// All adapters succeed -> both cases pass and state is persisted per case.
#[tokio::test]
async fn test_e2e_full_run_passes_and_persists_state() {
    // Given: Two GKE cases and no skip signals
    let harness = Harness::new();
    let driver = harness.driver(SkipPolicy::run_all());

    // When: Running the suite
    let report = driver.run(&gke_cases()).await;

    // Then: Both cases pass
    assert!(report.all_passed(), "report: {report:#?}");
    assert_eq!(report.passed(), 2);
    assert_eq!(report.failed(), 0);

    for (case, example) in [(PUBLIC, PUBLIC_EXAMPLE), (PRIVATE, PRIVATE_EXAMPLE)] {
        let store = harness.store(case);

        // Every persisted key exists
        let options = store.load_options().expect("options bundle persisted");
        assert!(options.terraform_dir.ends_with(example));
        assert_eq!(store.load_string(PROJECT_KEY).unwrap(), "test-project");
        assert_eq!(store.load_string(REGION_KEY).unwrap(), "europe-west1");
        assert!(store.contains(UNIQUE_ID_KEY));
        assert!(
            store
                .load_string(MODULE_PATH_KEY)
                .unwrap()
                .ends_with(example)
        );

        // Stage order and outcomes
        let case_report = report.case(case).expect("case reported");
        let stages: Vec<&str> = case_report.stages.iter().map(|r| r.stage.as_str()).collect();
        let expected: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(stages, expected);
        assert!(
            case_report
                .stages
                .iter()
                .all(|r| r.outcome == StageOutcome::Ran)
        );
        assert_eq!(case_report.state, CaseState::CleanedUp);
        assert!(case_report.cleanup_ran);
        assert!(case_report.failed_stage.is_none());

        // Collaborators ran apply -> configure -> verify -> cleanup
        assert_eq!(
            harness.log.timeline(&[case, example]),
            vec!["apply", "shell", "verify", "destroy"],
            "call order for {case}"
        );
    }
}

/// Verify fails for PrivateCluster -> Public passes, Private fails, Private cleanup still runs.
#[tokio::test]
async fn test_e2e_verify_failure_reports_private_failed_and_cleans_up() {
    // Given: The verify check fails only for PrivateCluster
    let harness = Harness::with_failures(Failures::default().verify(PRIVATE));
    let driver = harness.driver(SkipPolicy::run_all());

    // When: Running the suite
    let report = driver.run(&gke_cases()).await;

    // Then: PublicCluster passed, PrivateCluster failed
    let public = report.case(PUBLIC).unwrap();
    let private = report.case(PRIVATE).unwrap();
    assert!(public.passed);
    assert!(!private.passed);
    assert!(!report.all_passed());

    // Failure names the stage
    assert_eq!(private.failed_stage.as_deref(), Some("wait_for_workers"));
    assert!(
        private
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("not ready")
    );

    // Cleanup ran for PrivateCluster
    assert!(private.cleanup_ran);
    assert_eq!(private.state, CaseState::CleanedUp);
    assert_eq!(
        harness.log.timeline(&[PRIVATE, PRIVATE_EXAMPLE]),
        vec!["apply", "shell", "verify", "destroy"]
    );
    assert_eq!(
        private.stage(Stage::WaitForWorkers).unwrap().outcome,
        StageOutcome::Failed
    );
    assert_eq!(
        private.stage(Stage::Cleanup).unwrap().outcome,
        StageOutcome::Ran
    );
}

/// Suite report carries a run id and timing.
#[tokio::test]
async fn test_e2e_report_metadata() {
    let harness = Harness::new();
    let report = harness
        .driver(SkipPolicy::run_all())
        .run(&gke_cases()[..1])
        .await;

    assert_eq!(report.cases.len(), 1);
    assert!(!report.run_id.is_nil());
    let json = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["cases"][0]["name"], PUBLIC);
    assert_eq!(json["cases"][0]["state"], "cleaned_up");
    assert_eq!(json["cases"][0]["stages"][0]["outcome"], "ran");
}
