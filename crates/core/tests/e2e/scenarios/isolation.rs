//! Test case isolation: working directories, state and kubeconfig never leak across cases.

use std::collections::HashSet;
use std::path::PathBuf;

use stagehand_core::driver::UNIQUE_ID_KEY;
use stagehand_core::{SkipPolicy, TestCase, allocate};

use crate::helpers::harness::*;

/// Each case gets its own working directory, and allocation is deterministic.
#[tokio::test]
async fn test_e2e_working_dirs_are_distinct_and_deterministic() {
    let harness = Harness::new();
    let report = harness.driver(SkipPolicy::run_all()).run(&gke_cases()).await;

    let dirs: HashSet<PathBuf> = report.cases.iter().map(|c| c.working_dir.clone()).collect();
    assert_eq!(dirs.len(), 2);

    for case in [PUBLIC, PRIVATE] {
        let again = allocate(harness.stages_dir(), case).expect("valid name");
        assert_eq!(report.case(case).unwrap().working_dir, again.path());
        assert!(again.exists());
    }
}

/// Values saved for one case are invisible to the other.
#[tokio::test]
async fn test_e2e_state_is_namespaced_per_case() {
    let harness = Harness::new();
    harness.driver(SkipPolicy::run_all()).run(&gke_cases()).await;

    let public_id = harness.store(PUBLIC).load_string(UNIQUE_ID_KEY).unwrap();
    let private_id = harness.store(PRIVATE).load_string(UNIQUE_ID_KEY).unwrap();
    assert_eq!(public_id, "AbC000");
    assert_eq!(private_id, "AbC001");

    let public = harness.store(PUBLIC).load_options().unwrap();
    let private = harness.store(PRIVATE).load_options().unwrap();
    assert_ne!(
        public.cluster_name(harness.working_dir(PUBLIC).path()).unwrap(),
        private.cluster_name(harness.working_dir(PRIVATE).path()).unwrap()
    );
}

/// Credentials and verification use the case's own kubeconfig.
#[tokio::test]
async fn test_e2e_kubeconfig_is_per_case() {
    let harness = Harness::new();
    harness.driver(SkipPolicy::run_all()).run(&gke_cases()).await;

    let commands = harness.shell_commands();
    assert_eq!(commands.len(), 2);
    for (command, case) in commands.iter().zip([PUBLIC, PRIVATE]) {
        let expected = harness.working_dir(case).kubeconfig_path();
        assert_eq!(
            command.env.get("KUBECONFIG").map(PathBuf::from),
            Some(expected)
        );
        assert!(command.args.iter().any(|a| a == "get-credentials"));
    }

    let contexts = harness.verified_contexts();
    assert_eq!(contexts.len(), 2);
    assert_eq!(
        contexts[0].kubeconfig,
        harness.working_dir(PUBLIC).kubeconfig_path()
    );
    assert_eq!(
        contexts[1].kubeconfig,
        harness.working_dir(PRIVATE).kubeconfig_path()
    );
    assert_eq!(contexts[0].project, "test-project");
    assert_eq!(contexts[1].region, "europe-west1");
}

/// A case name that cannot be a directory fails alone without touching other cases.
#[tokio::test]
async fn test_e2e_invalid_case_name_fails_only_that_case() {
    let harness = Harness::new();
    let cases = vec![
        TestCase::new("../escape", PUBLIC_EXAMPLE),
        TestCase::new(PRIVATE, PRIVATE_EXAMPLE),
    ];

    let report = harness.driver(SkipPolicy::run_all()).run(&cases).await;

    let bad = report.case("../escape").unwrap();
    assert!(!bad.passed);
    assert!(bad.stages.is_empty());
    assert!(bad.failed_stage.is_none());
    assert!(report.case(PRIVATE).unwrap().passed);
    assert_eq!(harness.log.count("apply"), 1);
}
