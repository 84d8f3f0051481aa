//! Harness wiring mock collaborators to a driver over a temp stages directory.

use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use stagehand_core::{
    ClusterContext, Collaborators, RegionConstraints, ShellCommand, SkipPolicy, StateStore,
    SuiteSettings, TestCase, TestCaseDriver, WorkingDir, allocate,
};

use super::mock_collaborators::*;

pub const PUBLIC: &str = "PublicCluster";
pub const PUBLIC_EXAMPLE: &str = "gke-public-cluster";
pub const PRIVATE: &str = "PrivateCluster";
pub const PRIVATE_EXAMPLE: &str = "gke-private-cluster";

/// The two GKE cluster variants the suite exercises.
pub fn gke_cases() -> Vec<TestCase> {
    vec![
        TestCase::new(PUBLIC, PUBLIC_EXAMPLE),
        TestCase::new(PRIVATE, PRIVATE_EXAMPLE),
    ]
}

/// Temp stages directory plus shared mocks.
///
/// Mocks live behind `Arc`s so that several drivers (e.g. a first run and a
/// resumed run) can share one call log and one id counter.
pub struct Harness {
    pub tmp: TempDir,
    pub log: Arc<CallLog>,
    pub ids: Arc<MockIds>,
    pub shell: Arc<MockShell>,
    pub verifier: Arc<MockVerifier>,
    failures: Failures,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_failures(Failures::default())
    }

    pub fn with_failures(failures: Failures) -> Self {
        let log = CallLog::new();
        Self {
            tmp: TempDir::new().expect("should create temp dir"),
            ids: Arc::new(MockIds {
                counter: AtomicUsize::new(0),
            }),
            shell: Arc::new(MockShell {
                log: Arc::clone(&log),
                failures: failures.clone(),
                commands: Mutex::new(Vec::new()),
            }),
            verifier: Arc::new(MockVerifier {
                log: Arc::clone(&log),
                failures: failures.clone(),
                contexts: Mutex::new(Vec::new()),
            }),
            log,
            failures,
        }
    }

    /// Replace the failure set for subsequent drivers (shell/verifier keep theirs).
    pub fn set_failures(&mut self, failures: Failures) {
        self.shell = Arc::new(MockShell {
            log: Arc::clone(&self.log),
            failures: failures.clone(),
            commands: Mutex::new(Vec::new()),
        });
        self.verifier = Arc::new(MockVerifier {
            log: Arc::clone(&self.log),
            failures: failures.clone(),
            contexts: Mutex::new(Vec::new()),
        });
        self.failures = failures;
    }

    pub fn stages_dir(&self) -> PathBuf {
        self.tmp.path().join("stages")
    }

    pub fn copy_root(&self) -> PathBuf {
        self.tmp.path().join("copy")
    }

    pub fn settings(&self) -> SuiteSettings {
        SuiteSettings {
            stages_dir: self.stages_dir(),
            examples_root: self.tmp.path().join("src"),
            examples_subdir: "examples".to_owned(),
            skip_env_prefix: "SKIP_".to_owned(),
            gcloud_binary: "gcloud".to_owned(),
            regions: RegionConstraints {
                approved: vec!["europe-west1".to_owned()],
                forbidden: Vec::new(),
            },
            max_retries: 0,
            time_between_retries_secs: 0,
            retryable_errors: Default::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            inputs: Arc::new(MockInputs {
                log: Arc::clone(&self.log),
                copy_root: self.copy_root(),
                fail: self.failures.copy,
            }),
            ids: self.ids.clone(),
            metadata: Arc::new(MockMetadata {
                log: Arc::clone(&self.log),
                fail_project: self.failures.project,
            }),
            provisioner: Arc::new(MockProvisioner {
                log: Arc::clone(&self.log),
                failures: self.failures.clone(),
            }),
            shell: self.shell.clone(),
            verifier: self.verifier.clone(),
        }
    }

    pub fn driver(&self, policy: SkipPolicy) -> TestCaseDriver {
        TestCaseDriver::new(self.settings(), self.collaborators(), policy)
    }

    pub fn working_dir(&self, case: &str) -> WorkingDir {
        allocate(self.stages_dir(), case).expect("valid test case name")
    }

    pub fn store(&self, case: &str) -> StateStore {
        StateStore::new(&self.working_dir(case))
    }

    pub fn shell_commands(&self) -> Vec<ShellCommand> {
        self.shell.commands.lock().expect("poisoned").clone()
    }

    pub fn verified_contexts(&self) -> Vec<ClusterContext> {
        self.verifier.contexts.lock().expect("poisoned").clone()
    }
}
