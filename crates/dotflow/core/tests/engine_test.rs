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

//! End-to-end update scenarios over a real temp workspace: a generator
//! script feeding a consumer script, driven through a scripted in-process
//! backend instead of real subprocesses.

use dotflow_core::context::{LayoutConfig, WorkspaceContext};
use dotflow_core::update::{
    BackendError, ExecutionBackend, ExitType, Invocation, JobStatus, NoopNotifier, UpdateOptions,
    Updater,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;

type ScriptBody = Box<dyn Fn(&Invocation) -> i32 + Send + Sync>;

/// Backend that runs registered closures instead of subprocesses.
#[derive(Default)]
struct ScriptedBackend {
    bodies: Mutex<HashMap<String, ScriptBody>>,
    exits: Mutex<HashMap<String, i32>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new() -> Self {
        Self::default()
    }

    fn on(&self, script: &str, body: impl Fn(&Invocation) -> i32 + Send + Sync + 'static) {
        self.bodies.lock().insert(script.to_string(), Box::new(body));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl ExecutionBackend for ScriptedBackend {
    fn submit(&self, invocation: &Invocation) -> Result<String, BackendError> {
        self.calls.lock().push(invocation.script.clone());
        let code = match self.bodies.lock().get(&invocation.script) {
            Some(body) => body(invocation),
            None => -1,
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

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read_file(root: &Path, rel: &str) -> String {
    String::from_utf8(std::fs::read(root.join(rel)).unwrap()).unwrap()
}

/// src/raw.csv -> gen.build -> out/data.csv -> use.consume -> out/report.txt
fn chain_workspace() -> (TempDir, WorkspaceContext) {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/raw.csv", "a,b\n1,2\n");
    // Keep scripts strictly newer than the source data.
    std::thread::sleep(Duration::from_millis(20));
    write_file(
        dir.path(),
        "gen.flow",
        "fn build(depends_on=[\"src/raw.csv\"], creates=[\"out/data.csv\"]) {\n    \"copy the raw table\"\n}\n",
    );
    write_file(
        dir.path(),
        "use.flow",
        "fn consume(depends_on=[\"out/data.csv\"], creates=[\"out/report.txt\"]) {\n    \"summarize the data\"\n}\n",
    );
    let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
    (dir, ctx)
}

fn seeds() -> Vec<String> {
    vec!["src/raw.csv".to_string(), "gen.flow".to_string(), "use.flow".to_string()]
}

fn working_backend(root: &Path) -> Arc<ScriptedBackend> {
    let backend = Arc::new(ScriptedBackend::new());
    let data = root.join("out/data.csv");
    let report = root.join("out/report.txt");
    backend.on("gen.build", move |_inv| {
        std::fs::create_dir_all(data.parent().unwrap()).unwrap();
        std::fs::write(&data, "a,b\n1,2\n").unwrap();
        0
    });
    backend.on("use.consume", move |_inv| {
        std::fs::create_dir_all(report.parent().unwrap()).unwrap();
        std::fs::write(&report, "2 rows\n").unwrap();
        0
    });
    backend
}

/// Body that writes a fresh payload on every call, so reruns always diff.
fn counting_writer(
    path: PathBuf,
    tag: &'static str,
) -> impl Fn(&Invocation) -> i32 + Send + Sync + 'static {
    let runs = AtomicU64::new(0);
    move |_inv| {
        let n = runs.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!("{tag} {n}\n")).unwrap();
        0
    }
}

#[test]
fn test_full_update_builds_chain_then_settles() {
    let (dir, ctx) = chain_workspace();
    let backend = working_backend(dir.path());
    let mut updater =
        Updater::with_backend(ctx, backend.clone(), Arc::new(NoopNotifier));

    let report = updater.full_update(&seeds(), &UpdateOptions::default()).unwrap();
    assert_eq!(report.rounds, vec![vec!["gen.build".to_string()], vec!["use.consume".to_string()]]);
    assert!(report.failed_scripts().is_empty());
    assert_eq!(read_file(dir.path(), "out/data.csv"), "a,b\n1,2\n");
    assert_eq!(read_file(dir.path(), "out/report.txt"), "2 rows\n");
    assert_eq!(backend.calls(), vec!["gen.build".to_string(), "use.consume".to_string()]);

    // Everything up to date now, a second pass must not call anything.
    let report = updater.full_update(&seeds(), &UpdateOptions::default()).unwrap();
    assert!(report.rounds.is_empty());
    assert_eq!(backend.calls().len(), 2);
}

#[test]
fn test_failure_restores_outputs_and_cancels_downstream() {
    let (dir, ctx) = chain_workspace();
    write_file(dir.path(), "out/data.csv", "old data\n");
    write_file(dir.path(), "out/report.txt", "old report\n");

    let backend = Arc::new(ScriptedBackend::new());
    backend.on("gen.build", |_inv| 1);
    backend.on("use.consume", |_inv| 0);
    let mut updater =
        Updater::with_backend(ctx, backend.clone(), Arc::new(NoopNotifier));

    let opts = UpdateOptions { forced: true, ..UpdateOptions::default() };
    let report = updater.full_update(&["gen.build".to_string()], &opts).unwrap();

    assert_eq!(report.failed_scripts(), vec!["gen.build"]);
    assert!(!report.outcomes.iter().any(|o| o.script == "use.consume"));
    assert_eq!(backend.calls(), vec!["gen.build".to_string()]);
    // The previous output came back from quarantine.
    assert_eq!(read_file(dir.path(), "out/data.csv"), "old data\n");
    assert_eq!(read_file(dir.path(), "out/report.txt"), "old report\n");
}

#[test]
fn test_identical_output_turns_downstream_into_touch() {
    let (dir, ctx) = chain_workspace();
    let backend = working_backend(dir.path());
    let mut updater =
        Updater::with_backend(ctx.clone(), backend.clone(), Arc::new(NoopNotifier));

    updater.full_update(&seeds(), &UpdateOptions::default()).unwrap();
    assert_eq!(backend.calls().len(), 2);

    // Make the source look newly modified; the regenerated data will be
    // byte-identical, so the consumer only needs a timestamp bump.
    let src = ctx.abs("src/raw.csv");
    let future = ctx.fs().mtime(&src).unwrap() + 120_000_000_000;
    ctx.fs().set_mtime(&src, future).unwrap();

    let report = updater.full_update(&seeds(), &UpdateOptions::default()).unwrap();
    let exits: HashMap<&str, ExitType> =
        report.outcomes.iter().map(|o| (o.script.as_str(), o.exit)).collect();
    assert_eq!(exits["gen.build"], ExitType::Success);
    assert_eq!(exits["use.consume"], ExitType::Touch);
    // Only the generator actually ran again.
    assert_eq!(backend.calls().len(), 3);
    assert_eq!(read_file(dir.path(), "out/report.txt"), "2 rows\n");
}

#[test]
fn test_sibling_failure_leaves_other_branches_running() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/a.src", "a\n");
    write_file(dir.path(), "src/b.src", "b\n");
    write_file(dir.path(), "src/c.src", "c\n");
    write_file(
        dir.path(),
        "fetch.flow",
        "fn pull(depends_on=[\"src/a.src\"], creates=[\"out/pull.csv\"]) {\n    \"pull the table\"\n}\n",
    );
    write_file(
        dir.path(),
        "scan.flow",
        "fn scan(depends_on=[\"src/b.src\"], creates=[\"out/scan.csv\"]) {\n    \"scan the table\"\n}\n",
    );
    write_file(
        dir.path(),
        "crunch.flow",
        "fn crunch(depends_on=[\"src/c.src\"], creates=[\"out/crunch.csv\"]) {\n    \"crunch the table\"\n}\n",
    );
    write_file(
        dir.path(),
        "tally.flow",
        "fn tally(depends_on=[\"out/crunch.csv\"], creates=[\"out/tally.txt\"]) {\n    \"tally the crunched table\"\n}\n",
    );
    write_file(
        dir.path(),
        "plot.flow",
        "fn plot(depends_on=[\"out/pull.csv\"], creates=[\"out/plot.txt\"]) {\n    \"plot the pulled table\"\n}\n",
    );
    let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();

    let backend = Arc::new(ScriptedBackend::new());
    backend.on("fetch.pull", counting_writer(dir.path().join("out/pull.csv"), "pull"));
    backend.on("scan.scan", counting_writer(dir.path().join("out/scan.csv"), "scan"));
    backend.on("tally.tally", counting_writer(dir.path().join("out/tally.txt"), "tally"));
    backend.on("plot.plot", counting_writer(dir.path().join("out/plot.txt"), "plot"));
    let crunch_out = dir.path().join("out/crunch.csv");
    let crunch_runs = AtomicU64::new(0);
    backend.on("crunch.crunch", move |_inv| {
        // Succeeds once to seed the workspace, then breaks.
        if crunch_runs.fetch_add(1, Ordering::SeqCst) == 0 {
            std::fs::create_dir_all(crunch_out.parent().unwrap()).unwrap();
            std::fs::write(&crunch_out, "crunch 0\n").unwrap();
            0
        } else {
            1
        }
    });

    let mut updater =
        Updater::with_backend(ctx.clone(), backend.clone(), Arc::new(NoopNotifier));
    let scripts: Vec<String> =
        ["fetch.flow", "scan.flow", "crunch.flow", "tally.flow", "plot.flow"]
            .iter()
            .map(|s| s.to_string())
            .collect();
    let report = updater.full_update(&scripts, &UpdateOptions::default()).unwrap();
    assert!(report.failed_scripts().is_empty());
    assert_eq!(backend.calls().len(), 5);

    // All three raw inputs look freshly modified, so the whole pipeline
    // is stale again.
    for rel in ["src/a.src", "src/b.src", "src/c.src"] {
        let p = ctx.abs(rel);
        let future = ctx.fs().mtime(&p).unwrap() + 120_000_000_000;
        ctx.fs().set_mtime(&p, future).unwrap();
    }

    let seeds: Vec<String> =
        ["src/a.src", "src/b.src", "src/c.src"].iter().map(|s| s.to_string()).collect();
    let report = updater.full_update(&seeds, &UpdateOptions::default()).unwrap();

    assert_eq!(report.failed_scripts(), vec!["crunch.crunch"]);
    let calls = backend.calls();
    let second: BTreeSet<&str> = calls[5..].iter().map(String::as_str).collect();
    // Siblings in the failed round still ran, as did the branch hanging
    // off a succeeding sibling; only the failed branch was cancelled.
    assert!(second.contains("fetch.pull"));
    assert!(second.contains("scan.scan"));
    assert!(second.contains("plot.plot"));
    assert!(!second.contains("tally.tally"));
    assert_eq!(read_file(dir.path(), "out/crunch.csv"), "crunch 0\n");
    assert_eq!(read_file(dir.path(), "out/tally.txt"), "tally 0\n");
    assert_eq!(read_file(dir.path(), "out/plot.txt"), "plot 1\n");
}

#[test]
fn test_preview_names_rounds_without_running() {
    let (dir, ctx) = chain_workspace();
    let backend = Arc::new(ScriptedBackend::new());
    let mut updater =
        Updater::with_backend(ctx, backend.clone(), Arc::new(NoopNotifier));

    let rounds = updater.preview_update(&seeds(), &UpdateOptions::default()).unwrap();
    assert_eq!(rounds, vec![vec!["gen.build".to_string()], vec!["use.consume".to_string()]]);
    assert!(backend.calls().is_empty());
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_corrupt_link_cache_heals_itself() {
    let (dir, ctx) = chain_workspace();
    let backend = working_backend(dir.path());
    let mut updater =
        Updater::with_backend(ctx.clone(), backend.clone(), Arc::new(NoopNotifier));

    updater.full_update(&seeds(), &UpdateOptions::default()).unwrap();
    std::fs::write(ctx.links_dir().join("links.bin"), b"not a link cache").unwrap();

    let report = updater.full_update(&seeds(), &UpdateOptions::default()).unwrap();
    assert!(report.rounds.is_empty());
    assert_eq!(backend.calls().len(), 2);
}
