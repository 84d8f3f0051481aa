//! Recording mock implementations of every external collaborator.
//!
//! All mocks append to a shared [`CallLog`] so scenarios can assert
//! which collaborator ran, for which test case, and in what order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use stagehand_core::{
    BoxFuture, CloudMetadata, ClusterContext, ClusterVerifier, CommandOutput, ExternalError,
    IdGenerator, InputPreparer, OptionsBundle, Provisioner, RegionConstraints, ShellCommand,
    ShellExecutor,
};

/// Ordered log of collaborator calls, e.g. `apply:gke-public-cluster`.
#[derive(Default)]
pub struct CallLog {
    entries: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, entry: String) {
        self.entries.lock().expect("call log poisoned").push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().expect("call log poisoned").clone()
    }

    /// Call kinds (`apply`, `shell`, ...) whose subject is one of `subjects`, in order.
    pub fn timeline(&self, subjects: &[&str]) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| {
                let (kind, subject) = e.split_once(':')?;
                subjects.contains(&subject).then(|| kind.to_owned())
            })
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.split(':').next() == Some(kind))
            .count()
    }
}

/// Which collaborator calls should fail, keyed by example or test case name.
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub copy: bool,
    pub project: bool,
    pub apply_examples: HashSet<String>,
    pub destroy_examples: HashSet<String>,
    pub configure_cases: HashSet<String>,
    pub verify_cases: HashSet<String>,
    pub panic_verify_cases: HashSet<String>,
}

#[allow(dead_code)]
impl Failures {
    pub fn verify(mut self, case: &str) -> Self {
        self.verify_cases.insert(case.to_owned());
        self
    }

    /// The verifier panics instead of returning an error.
    pub fn panic_verify(mut self, case: &str) -> Self {
        self.panic_verify_cases.insert(case.to_owned());
        self
    }

    pub fn configure(mut self, case: &str) -> Self {
        self.configure_cases.insert(case.to_owned());
        self
    }

    pub fn apply(mut self, example: &str) -> Self {
        self.apply_examples.insert(example.to_owned());
        self
    }

    pub fn destroy(mut self, example: &str) -> Self {
        self.destroy_examples.insert(example.to_owned());
        self
    }
}

/// Example name a bundle was built for (last segment of `terraform_dir`).
pub fn example_of(options: &OptionsBundle) -> String {
    options
        .terraform_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Test case a kubeconfig belongs to (its parent directory name).
pub fn case_of(kubeconfig: &Path) -> String {
    kubeconfig
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------

pub struct MockInputs {
    pub log: Arc<CallLog>,
    pub copy_root: PathBuf,
    pub fail: bool,
}

impl InputPreparer for MockInputs {
    fn copy_to_temp(&self, _root: &Path, subdir: &str) -> Result<PathBuf, ExternalError> {
        self.log.push(format!("copy:{subdir}"));
        if self.fail {
            return Err(ExternalError::check("copy", "examples folder missing"));
        }
        Ok(self.copy_root.join(subdir))
    }
}

pub struct MockIds {
    pub counter: AtomicUsize,
}

impl IdGenerator for MockIds {
    fn unique_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("AbC{n:03}")
    }
}

pub struct MockMetadata {
    pub log: Arc<CallLog>,
    pub fail_project: bool,
}

impl CloudMetadata for MockMetadata {
    fn project_id(&self) -> Result<String, ExternalError> {
        if self.fail_project {
            return Err(ExternalError::check("gcp", "GOOGLE_CLOUD_PROJECT not set"));
        }
        Ok("test-project".to_owned())
    }

    fn random_region<'a>(
        &'a self,
        project: &'a str,
        constraints: &'a RegionConstraints,
    ) -> BoxFuture<'a, Result<String, ExternalError>> {
        Box::pin(async move {
            self.log.push(format!("region:{project}"));
            Ok(constraints
                .approved
                .first()
                .cloned()
                .unwrap_or_else(|| "us-central1".to_owned()))
        })
    }
}

pub struct MockProvisioner {
    pub log: Arc<CallLog>,
    pub failures: Failures,
}

impl Provisioner for MockProvisioner {
    fn init_and_apply<'a>(
        &'a self,
        options: &'a OptionsBundle,
    ) -> BoxFuture<'a, Result<(), ExternalError>> {
        Box::pin(async move {
            let example = example_of(options);
            self.log.push(format!("apply:{example}"));
            if self.failures.apply_examples.contains(&example) {
                return Err(ExternalError::CommandFailed {
                    command: "terraform apply".to_owned(),
                    code: Some(1),
                    output: "Error: quota exceeded".to_owned(),
                });
            }
            Ok(())
        })
    }

    fn destroy<'a>(
        &'a self,
        options: &'a OptionsBundle,
    ) -> BoxFuture<'a, Result<(), ExternalError>> {
        Box::pin(async move {
            let example = example_of(options);
            self.log.push(format!("destroy:{example}"));
            if self.failures.destroy_examples.contains(&example) {
                return Err(ExternalError::check("terraform", "destroy timed out"));
            }
            Ok(())
        })
    }
}

pub struct MockShell {
    pub log: Arc<CallLog>,
    pub failures: Failures,
    pub commands: Mutex<Vec<ShellCommand>>,
}

impl ShellExecutor for MockShell {
    fn run<'a>(
        &'a self,
        command: &'a ShellCommand,
    ) -> BoxFuture<'a, Result<CommandOutput, ExternalError>> {
        Box::pin(async move {
            let case = command
                .env
                .get("KUBECONFIG")
                .map(|k| case_of(Path::new(k)))
                .unwrap_or_default();
            self.log.push(format!("shell:{case}"));
            self.commands
                .lock()
                .expect("commands poisoned")
                .push(command.clone());
            if self.failures.configure_cases.contains(&case) {
                return Err(ExternalError::CommandFailed {
                    command: command.display_line(),
                    code: Some(1),
                    output: "ERROR: (gcloud) cluster not found".to_owned(),
                });
            }
            Ok(CommandOutput::default())
        })
    }
}

pub struct MockVerifier {
    pub log: Arc<CallLog>,
    pub failures: Failures,
    pub contexts: Mutex<Vec<ClusterContext>>,
}

impl ClusterVerifier for MockVerifier {
    fn verify<'a>(
        &'a self,
        context: &'a ClusterContext,
    ) -> BoxFuture<'a, Result<(), ExternalError>> {
        Box::pin(async move {
            let case = case_of(&context.kubeconfig);
            self.log.push(format!("verify:{case}"));
            self.contexts
                .lock()
                .expect("contexts poisoned")
                .push(context.clone());
            if self.failures.panic_verify_cases.contains(&case) {
                panic!("kubectl client crashed while checking {case}");
            }
            if self.failures.verify_cases.contains(&case) {
                return Err(ExternalError::check("kubectl", "1 of 3 nodes not ready"));
            }
            Ok(())
        })
    }
}
