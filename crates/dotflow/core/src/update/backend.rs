// Dotflow
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use crate::fs::FileSystem;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unknown job: {0}")]
    UnknownJob(String),
    #[error("This backend cannot wait on externally spawned jobs")]
    ChildJobsUnsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Exited(i32),
}

/// Everything a backend needs to run one operation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Qualified operation name, `module.part`.
    pub script: String,
    /// Workspace-relative path of the script file.
    pub script_file: String,
    /// Absolute directory the runner executes in.
    pub workdir: PathBuf,
    /// Runner binary.
    pub runner: String,
    /// Where captured stdout/stderr goes.
    pub log_path: PathBuf,
    /// Where the operation writes its run output payload.
    pub output_path: PathBuf,
}

/// How scripts get executed. The driver submits every script of a round,
/// then waits on each; a synchronous backend may run the job inside
/// [`ExecutionBackend::submit`] and make the wait trivial.
pub trait ExecutionBackend: Send + Sync {
    /// Start the job, returning a backend-scoped job id.
    fn submit(&self, invocation: &Invocation) -> Result<String, BackendError>;

    fn poll(&self, job: &str) -> Result<JobStatus, BackendError>;

    /// Block until the job exits and return its exit code.
    fn wait(&self, job: &str) -> Result<i32, BackendError>;

    /// Block on jobs the operation spawned itself, outside this backend.
    fn wait_external(&self, _jobs: &[String]) -> Result<Vec<i32>, BackendError> {
        Err(BackendError::ChildJobsUnsupported)
    }
}

/// Runs each operation as a local subprocess, synchronously at submit time.
#[derive(Default)]
pub struct DirectBackend {
    exits: Mutex<HashMap<String, i32>>,
}

impl DirectBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionBackend for DirectBackend {
    fn submit(&self, invocation: &Invocation) -> Result<String, BackendError> {
        let log = std::fs::File::create(&invocation.log_path)?;
        let status = Command::new(&invocation.runner)
            .arg("run")
            .arg(&invocation.script_file)
            .arg(&invocation.script)
            .current_dir(&invocation.workdir)
            .env("DOTFLOW_OUTPUT", &invocation.output_path)
            .stdout(log.try_clone()?)
            .stderr(log)
            .status();
        let code = match status {
            Ok(s) => s.code().unwrap_or(-1),
            Err(e) => {
                warn!(script = %invocation.script, error = %e, "runner did not start");
                -1
            }
        };
        self.exits.lock().insert(invocation.script.clone(), code);
        Ok(invocation.script.clone())
    }

    fn poll(&self, job: &str) -> Result<JobStatus, BackendError> {
        match self.exits.lock().get(job) {
            Some(&code) => Ok(JobStatus::Exited(code)),
            None => Err(BackendError::UnknownJob(job.to_string())),
        }
    }

    fn wait(&self, job: &str) -> Result<i32, BackendError> {
        match self.exits.lock().remove(job) {
            Some(code) => Ok(code),
            None => Err(BackendError::UnknownJob(job.to_string())),
        }
    }
}

/// Submit-and-poll backend: submission spawns the subprocess without
/// blocking, so a whole round runs concurrently before the driver starts
/// waiting.
#[derive(Default)]
pub struct SpawnBackend {
    children: Mutex<HashMap<String, Child>>,
}

impl SpawnBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionBackend for SpawnBackend {
    fn submit(&self, invocation: &Invocation) -> Result<String, BackendError> {
        let log = std::fs::File::create(&invocation.log_path)?;
        let child = Command::new(&invocation.runner)
            .arg("run")
            .arg(&invocation.script_file)
            .arg(&invocation.script)
            .current_dir(&invocation.workdir)
            .env("DOTFLOW_OUTPUT", &invocation.output_path)
            .stdout(log.try_clone()?)
            .stderr(log)
            .spawn()?;
        self.children.lock().insert(invocation.script.clone(), child);
        Ok(invocation.script.clone())
    }

    fn poll(&self, job: &str) -> Result<JobStatus, BackendError> {
        let mut children = self.children.lock();
        let child = children.get_mut(job).ok_or_else(|| BackendError::UnknownJob(job.to_string()))?;
        match child.try_wait()? {
            Some(status) => Ok(JobStatus::Exited(status.code().unwrap_or(-1))),
            None => Ok(JobStatus::Running),
        }
    }

    fn wait(&self, job: &str) -> Result<i32, BackendError> {
        let child = self.children.lock().remove(job);
        match child {
            Some(mut child) => Ok(child.wait()?.code().unwrap_or(-1)),
            None => Err(BackendError::UnknownJob(job.to_string())),
        }
    }
}

/// Payload an operation leaves behind for the driver. Fast operations
/// report per-target difference flags; operations that spawn their own
/// jobs report the ids to wait on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunOutput {
    #[serde(default)]
    pub child_jobs: Vec<String>,
    #[serde(default)]
    pub diffs: BTreeMap<String, bool>,
}

/// Run output of a finished job, or the default payload when the file is
/// absent or unreadable.
pub fn read_run_output(fs: &dyn FileSystem, path: &Path) -> RunOutput {
    let Ok(data) = fs.read(path) else { return RunOutput::default() };
    match serde_json::from_slice(&data) {
        Ok(output) => output,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable run output, ignoring it");
            RunOutput::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StdFileSystem;
    use tempfile::TempDir;

    #[test]
    fn test_run_output_defaults_when_absent() {
        let dir = TempDir::new().unwrap();
        let output = read_run_output(&StdFileSystem, &dir.path().join("missing.json"));
        assert!(output.child_jobs.is_empty());
        assert!(output.diffs.is_empty());
    }

    #[test]
    fn test_run_output_parses_diffs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, br#"{"diffs":{"out/data":false},"child_jobs":["12"]}"#).unwrap();
        let output = read_run_output(&StdFileSystem, &path);
        assert_eq!(output.diffs.get("out/data"), Some(&false));
        assert_eq!(output.child_jobs, vec!["12".to_string()]);
    }

    #[test]
    fn test_direct_backend_reports_failed_start() {
        let dir = TempDir::new().unwrap();
        let backend = DirectBackend::new();
        let invocation = Invocation {
            script: "gen.build".to_string(),
            script_file: "gen.flow".to_string(),
            workdir: dir.path().to_path_buf(),
            runner: dir.path().join("no-such-runner").display().to_string(),
            log_path: dir.path().join("log"),
            output_path: dir.path().join("out.json"),
        };
        let job = backend.submit(&invocation).unwrap();
        assert_eq!(backend.poll(&job).unwrap(), JobStatus::Exited(-1));
        assert_eq!(backend.wait(&job).unwrap(), -1);
        assert!(backend.wait(&job).is_err());
    }
}
