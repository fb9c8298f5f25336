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

use super::backend::{
    BackendError, DirectBackend, ExecutionBackend, Invocation, RunOutput, read_run_output,
};
use super::created::CreatedTimes;
use super::notify::{NoopNotifier, Notifier};
use super::session::Session;
use crate::context::WorkspaceContext;
use crate::fs::{FsError, recursive_files, trees_differ};
use crate::graph::{
    Direction, PropagateOptions, propagate_reach, propagate_with_times,
};
use crate::links::{Link, LinkCache, LinkKind, LinkQuery};
use crate::store::OperationStore;
use dotflow_common::{
    dirname, epoch_seconds_label, is_script_path, now_nanos, path_along, suffix_below,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Take directory mtimes at face value instead of scanning below them.
    pub simple: bool,
    /// Run everything reachable from the seed, stale or not.
    pub forced: bool,
    /// Build propagation rounds only from activated links.
    pub pruning: bool,
    /// Treat targets modified after their last recorded creation as stale.
    pub protect_computed: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self { simple: false, forced: false, pruning: true, protect_computed: false }
    }
}

impl UpdateOptions {
    fn propagate(&self) -> PropagateOptions {
        PropagateOptions {
            simple: self.simple,
            pruning: self.pruning,
            protect_computed: self.protect_computed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitType {
    Success,
    Failure,
    /// Outputs were known unchanged upstream, so only timestamps moved.
    Touch,
}

#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub script: String,
    pub round: usize,
    pub exit: ExitType,
    pub creates: Vec<String>,
}

/// What a run did: the script rounds as planned, and how each call ended.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub session: Option<String>,
    pub rounds: Vec<Vec<String>>,
    pub outcomes: Vec<ScriptOutcome>,
}

impl UpdateReport {
    pub fn failed_scripts(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.exit == ExitType::Failure)
            .map(|o| o.script.as_str())
            .collect()
    }
}

/// The update driver.
///
/// Resolves the current link graph, propagates staleness from a seed, and
/// calls the stale scripts round by round through the configured backend.
/// Previous outputs are quarantined before a call so a failed script can be
/// rolled back; outputs that come back identical turn their downstream
/// consumers into timestamp touches.
pub struct Updater {
    ctx: WorkspaceContext,
    cache: LinkCache,
    store: OperationStore,
    backend: Arc<dyn ExecutionBackend>,
    notifier: Arc<dyn Notifier>,
}

struct Pending {
    script: String,
    creates: Vec<String>,
    targets: Vec<String>,
    is_fast: bool,
    touch: bool,
    /// Parent directory mtime and listing per target, before the call.
    dir_info: BTreeMap<String, (u64, Vec<String>)>,
    job: Option<String>,
    before: u64,
}

impl Updater {
    pub fn new(ctx: WorkspaceContext) -> Self {
        Self::with_backend(ctx, Arc::new(DirectBackend::new()), Arc::new(NoopNotifier))
    }

    pub fn with_backend(
        ctx: WorkspaceContext,
        backend: Arc<dyn ExecutionBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cache = LinkCache::new(ctx.clone());
        let store = OperationStore::new(ctx.clone());
        Self { ctx, cache, store, backend, notifier }
    }

    pub fn context(&self) -> &WorkspaceContext {
        &self.ctx
    }

    /// Downstream update from `seeds`.
    pub fn full_update(
        &mut self,
        seeds: &[String],
        opts: &UpdateOptions,
    ) -> Result<UpdateReport, UpdateError> {
        self.link_update(seeds, opts)
    }

    /// Upstream update: everything `targets` depend on, then downstream
    /// propagation from those sources.
    pub fn make_updated(
        &mut self,
        targets: &[String],
        opts: &UpdateOptions,
    ) -> Result<UpdateReport, UpdateError> {
        let links = self.current_links(&LinkQuery::default());
        let upstream = propagate_reach(&links, targets, Direction::Up);
        let mut seeds: Vec<String> = Vec::new();
        for &i in upstream.iter().flatten() {
            for s in [&links[i].source_file, &links[i].source] {
                if !seeds.contains(s) {
                    seeds.push(s.clone());
                }
            }
        }
        if seeds.is_empty() {
            info!("nothing upstream of the requested targets");
            return Ok(UpdateReport::default());
        }
        self.link_update(&seeds, opts)
    }

    /// The script rounds a downstream update from `seeds` would run, without
    /// running anything.
    pub fn preview_update(
        &mut self,
        seeds: &[String],
        opts: &UpdateOptions,
    ) -> Result<Vec<Vec<String>>, UpdateError> {
        let (all_links, activated) = self.links_below(seeds, opts);
        let mut rounds = reduce_script_rounds(&activated);
        remove_scripts_to_be_created(&all_links, &mut rounds);
        rounds.retain(|r| !r.is_empty());
        Ok(rounds)
    }

    fn link_update(
        &mut self,
        seeds: &[String],
        opts: &UpdateOptions,
    ) -> Result<UpdateReport, UpdateError> {
        let (_, activated) = self.links_below(seeds, opts);
        self.update_links(activated, seeds, opts)
    }

    fn current_links(&mut self, query: &LinkQuery) -> Vec<Link> {
        let files = self.ctx.live_scripts();
        self.cache.links_from_operations(&mut self.store, &files, query)
    }

    /// All current links plus the activated rounds of a downstream walk.
    fn links_below(
        &mut self,
        seeds: &[String],
        opts: &UpdateOptions,
    ) -> (Vec<Link>, Vec<Vec<Link>>) {
        let query = LinkQuery { add_implied: true, add_dummies: true, ..LinkQuery::default() };
        let links = self.current_links(&query);
        let rounds = if opts.forced {
            propagate_reach(&links, seeds, Direction::Down)
                .into_iter()
                .map(|r| r.into_iter().map(|i| links[i].clone()).collect())
                .collect()
        } else {
            let created = CreatedTimes::load(&self.ctx);
            propagate_with_times(&self.ctx, &mut self.store, &created, &links, seeds, &opts.propagate())
                .into_iter()
                .map(|round| {
                    round.into_iter().filter(|a| a.activated).map(|a| a.link).collect()
                })
                .collect()
        };
        (links, rounds)
    }

    /// Scripts a fresh timed walk over `links` would still activate.
    fn active_scripts(
        &mut self,
        links: &[Link],
        seeds: &[String],
        opts: &UpdateOptions,
        created: &CreatedTimes,
    ) -> BTreeSet<String> {
        propagate_with_times(&self.ctx, &mut self.store, created, links, seeds, &opts.propagate())
            .into_iter()
            .flatten()
            .filter(|a| a.activated)
            .filter_map(|a| a.link.update_script)
            .collect()
    }

    fn update_links(
        &mut self,
        activated: Vec<Vec<Link>>,
        seeds: &[String],
        opts: &UpdateOptions,
    ) -> Result<UpdateReport, UpdateError> {
        let mut remaining: Vec<Link> = Vec::new();
        for link in activated.iter().flatten() {
            if !remaining.contains(link) {
                remaining.push(link.clone());
            }
        }

        let mut script_rounds = reduce_script_rounds(&activated);
        remove_scripts_to_be_created(&remaining, &mut script_rounds);
        if script_rounds.iter().all(Vec::is_empty) {
            info!("no scripts to be called");
            return Ok(UpdateReport::default());
        }

        let session = Session::begin(&self.ctx)?;
        info!(session = session.name(), rounds = script_rounds.iter().filter(|r| !r.is_empty()).count(), "starting update");
        for (i, round) in script_rounds.iter().enumerate() {
            if !round.is_empty() {
                session.log_line(&format!("round {i}: {}", round.join(", ")));
            }
        }

        let (creates_map, fast_map, file_map) = creates_and_fast(&remaining);
        let dep_list: Vec<String> = {
            let mut deps = Vec::new();
            for link in &remaining {
                if link.kind == LinkKind::DependsOn && !deps.contains(&link.source) {
                    deps.push(link.source.clone());
                }
            }
            deps
        };

        let mut created_times = CreatedTimes::load(&self.ctx);
        let mut touch_list: BTreeSet<String> = BTreeSet::new();
        let mut new_scripts: BTreeSet<String> = BTreeSet::new();
        let mut outcomes: Vec<ScriptOutcome> = Vec::new();

        for round in 0..script_rounds.len() {
            let scripts = script_rounds[round].clone();
            if scripts.is_empty() {
                continue;
            }
            info!(round, scripts = ?scripts, "calling round");

            let mut pending: Vec<Pending> = Vec::new();
            for script in &scripts {
                let p = self.launch(
                    script,
                    &creates_map,
                    &fast_map,
                    &file_map,
                    &dep_list,
                    &touch_list,
                    &session,
                )?;
                pending.push(p);
            }

            let mut failures: Vec<String> = Vec::new();
            let mut no_diff: BTreeSet<String> = BTreeSet::new();
            for p in pending {
                let exit = self.finish(&p, &session, &mut created_times, &mut new_scripts, &mut no_diff)?;
                if exit == ExitType::Failure {
                    failures.push(p.script.clone());
                }
                if !p.touch {
                    session.absorb_script_log(&p.script);
                }
                outcomes.push(ScriptOutcome {
                    script: p.script,
                    round,
                    exit,
                    creates: p.creates,
                });
            }

            if !failures.is_empty() {
                remaining.retain(|l| {
                    l.update_script.as_deref().is_none_or(|s| !failures.iter().any(|f| f == s))
                });
                let still = self.active_scripts(&remaining, seeds, opts, &created_times);
                let scheduled: BTreeSet<String> =
                    script_rounds.iter().flatten().cloned().collect();
                let drop: BTreeSet<String> = scheduled
                    .into_iter()
                    .filter(|s| !failures.contains(s) && !still.contains(s))
                    .collect();
                for later in script_rounds.iter_mut().skip(round + 1) {
                    later.retain(|s| {
                        let keep = !drop.contains(s);
                        if !keep {
                            warn!(script = %s, failed = ?failures, "cancelling downstream call after failure");
                            session.log_line(&format!(
                                "cancelling {s} after failure of {}",
                                failures.join(", ")
                            ));
                        }
                        keep
                    });
                }
            }

            if !no_diff.is_empty() {
                remaining.retain(|l| !no_diff.contains(&l.source));
                let live: Vec<Link> =
                    remaining.iter().filter(|l| l.kind != LinkKind::Dummy).cloned().collect();
                let still = self.active_scripts(&live, seeds, opts, &created_times);
                for s in script_rounds.iter().flatten() {
                    if !still.contains(s) && touch_list.insert(s.clone()) {
                        info!(script = %s, "inputs unchanged, downstream call becomes a touch");
                    }
                }
            }
        }

        created_times.persist(&self.ctx);

        let mut report = UpdateReport {
            session: Some(session.name().to_string()),
            rounds: script_rounds.iter().filter(|r| !r.is_empty()).cloned().collect(),
            outcomes,
        };

        if let Err(e) = self.notifier.run_finished(session.name(), &session.log_path()) {
            warn!(error = %e, "completion notification failed");
        }
        session.release();

        if !new_scripts.is_empty() {
            info!(scripts = ?new_scripts, "re-running update for regenerated scripts");
            for script in &new_scripts {
                self.store.invalidate(script);
            }
            let mut next_seeds: Vec<String> = new_scripts.into_iter().collect();
            for s in seeds {
                if !next_seeds.contains(s) {
                    next_seeds.push(s.clone());
                }
            }
            let nested = self.link_update(&next_seeds, opts)?;
            report.rounds.extend(nested.rounds);
            report.outcomes.extend(nested.outcomes);
        }

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn launch(
        &self,
        script: &str,
        creates_map: &BTreeMap<String, Vec<String>>,
        fast_map: &BTreeMap<String, bool>,
        file_map: &BTreeMap<String, String>,
        dep_list: &[String],
        touch_list: &BTreeSet<String>,
        session: &Session,
    ) -> Result<Pending, UpdateError> {
        let fs = self.ctx.fs();
        let creates = creates_map.get(script).cloned().unwrap_or_default();
        let is_fast = fast_map.get(script).copied().unwrap_or(false);
        let deps: Vec<String> = dep_list
            .iter()
            .filter(|d| creates.iter().any(|c| path_along(d, c)))
            .cloned()
            .collect();
        let mut targets = creates.clone();
        for d in &deps {
            if !targets.contains(d) {
                targets.push(d.clone());
            }
        }

        let mut dir_info = BTreeMap::new();
        for t in &targets {
            if let Some(dir) = dirname(t) {
                let abs = self.ctx.abs(&dir);
                if let (Ok(m), Ok(listing)) = (fs.mtime(&abs), fs.list(&abs)) {
                    dir_info.entry(dir).or_insert((m, listing));
                }
            }
        }

        let touch = touch_list.contains(script);
        let before = now_nanos();
        let job = if touch {
            session.log_line(&format!("touching outputs of {script}: {}", creates.join(", ")));
            None
        } else {
            self.quarantine(&creates, is_fast, session)?;
            session.log_line(&format!("calling {script}, which makes {}", creates.join(", ")));
            let output_path = session.script_output(script);
            if fs.exists(&output_path) {
                fs.remove(&output_path)?;
            }
            let invocation = Invocation {
                script: script.to_string(),
                script_file: file_map.get(script).cloned().unwrap_or_default(),
                workdir: self.ctx.root().to_path_buf(),
                runner: self.ctx.config().runner.clone(),
                log_path: session.script_log(script),
                output_path,
            };
            Some(self.backend.submit(&invocation)?)
        };

        Ok(Pending {
            script: script.to_string(),
            creates,
            targets,
            is_fast,
            touch,
            dir_info,
            job,
            before,
        })
    }

    /// Displace previous outputs so a failed run can fall back to them.
    /// Fast operations rewrite in place and keep their old output where
    /// it is.
    fn quarantine(
        &self,
        creates: &[String],
        is_fast: bool,
        session: &Session,
    ) -> Result<(), UpdateError> {
        let fs = self.ctx.fs();
        for f in creates {
            let temp = session.quarantine_path(f);
            if fs.exists(&temp) {
                let old = stamped_sibling(&temp, "_old_");
                fs.rename(&temp, &old)?;
            }
            let abs = self.ctx.abs(f);
            if fs.exists(&abs) && !is_fast {
                fs.rename(&abs, &temp)?;
            }
        }
        Ok(())
    }

    fn finish(
        &self,
        p: &Pending,
        session: &Session,
        created_times: &mut CreatedTimes,
        new_scripts: &mut BTreeSet<String>,
        no_diff: &mut BTreeSet<String>,
    ) -> Result<ExitType, UpdateError> {
        let fs = self.ctx.fs();

        let Some(job) = &p.job else {
            // Touch: move timestamps forward without recomputing.
            for f in &p.creates {
                let abs = self.ctx.abs(f);
                if let Ok(m) = fs.mtime(&abs) {
                    if m < p.before {
                        if let Err(e) = fs.set_mtime(&abs, p.before) {
                            warn!(target = %f, error = %e, "could not touch output");
                        }
                    }
                }
            }
            return Ok(ExitType::Touch);
        };

        let mut status = self.backend.wait(job)?;
        let output = read_run_output(fs, &session.script_output(&p.script));
        if !output.child_jobs.is_empty() {
            session.log_line(&format!(
                "{} spawned jobs {}, waiting for them",
                p.script,
                output.child_jobs.join(", ")
            ));
            match self.backend.wait_external(&output.child_jobs) {
                Ok(codes) => {
                    if codes.iter().any(|&c| c != 0) {
                        status = -1;
                    }
                }
                Err(e) => {
                    error!(script = %p.script, error = %e, "could not wait on spawned jobs");
                    status = -1;
                }
            }
        }

        let all_created = p.creates.iter().all(|f| fs.exists(&self.ctx.abs(f)));
        if status != 0 || !all_created {
            self.report_failure(p, status, session);
            self.revert(p, session)?;
            return Ok(ExitType::Failure);
        }

        for f in &p.creates {
            let abs = self.ctx.abs(f);
            match fs.mtime(&abs) {
                Ok(m) => {
                    let stamp = m.max(p.before);
                    if m < p.before {
                        if let Err(e) = fs.set_mtime(&abs, stamp) {
                            warn!(target = %f, error = %e, "could not bump output mtime");
                        }
                    }
                    created_times.record(f, stamp);
                }
                Err(e) => warn!(target = %f, error = %e, "created output vanished"),
            }
            for found in self.scripts_under(f) {
                new_scripts.insert(found);
            }
        }
        session.log_line(&format!(
            "{} ran successfully, creating {}",
            p.script,
            p.creates.join(", ")
        ));

        self.check_diffs(p, &output, session, no_diff)?;

        // Re-running a script must not look like a change to the directory
        // holding its outputs when nothing inside was added or removed.
        for (dir, (m, listing)) in &p.dir_info {
            let abs = self.ctx.abs(dir);
            if fs.list(&abs).is_ok_and(|now| now == *listing) {
                if let Err(e) = fs.set_mtime(&abs, *m) {
                    warn!(dir = %dir, error = %e, "could not restore directory mtime");
                }
            }
        }

        Ok(ExitType::Success)
    }

    fn report_failure(&self, p: &Pending, status: i32, session: &Session) {
        let uncreated: Vec<&str> = p
            .creates
            .iter()
            .filter(|f| !self.ctx.fs().exists(&self.ctx.abs(f)))
            .map(String::as_str)
            .collect();
        if status != 0 {
            error!(script = %p.script, status, "script exited abnormally, reverting its outputs");
            session.log_line(&format!(
                "{} exited with status {status}; reverting {}",
                p.script,
                p.creates.join(", ")
            ));
        } else {
            error!(script = %p.script, uncreated = ?uncreated, "script ran but did not create its declared outputs");
            session.log_line(&format!(
                "{} ran but never created {}; reverting",
                p.script,
                uncreated.join(", ")
            ));
        }
    }

    /// Move partial outputs aside and put the quarantined previous versions
    /// back.
    fn revert(&self, p: &Pending, session: &Session) -> Result<(), UpdateError> {
        let fs = self.ctx.fs();
        for f in &p.creates {
            let abs = self.ctx.abs(f);
            if fs.exists(&abs) {
                let garbage = stamped_sibling(&session.quarantine_path(f), "_garbage_");
                info!(target = %f, to = %garbage.display(), "moving partial output aside");
                fs.rename(&abs, &garbage)?;
            }
        }
        if !p.is_fast {
            for f in &p.creates {
                let temp = session.quarantine_path(f);
                if fs.exists(&temp) {
                    info!(target = %f, "restoring previous version");
                    fs.rename(&temp, &self.ctx.abs(f))?;
                }
            }
            for (dir, (m, _)) in &p.dir_info {
                let abs = self.ctx.abs(dir);
                if fs.exists(&abs) {
                    if let Err(e) = fs.set_mtime(&abs, *m) {
                        warn!(dir = %dir, error = %e, "could not restore directory mtime");
                    }
                }
            }
        }
        Ok(())
    }

    /// Compare new outputs against the quarantined previous versions, then
    /// archive the previous versions. Targets that came back identical go
    /// into `no_diff`.
    fn check_diffs(
        &self,
        p: &Pending,
        output: &RunOutput,
        session: &Session,
        no_diff: &mut BTreeSet<String>,
    ) -> Result<(), UpdateError> {
        let fs = self.ctx.fs();
        for f in &p.creates {
            let temp = session.quarantine_path(f);
            for t in p.targets.iter().filter(|t| path_along(t, f)) {
                let temp_path = match suffix_below(t, f) {
                    Some(suffix) if !suffix.is_empty() => temp.join(suffix),
                    _ => temp.clone(),
                };
                if fs.exists(&temp_path) {
                    if !trees_differ(fs, &temp_path, &self.ctx.abs(t)) {
                        info!(target = %t, "new version identical to previous one");
                        no_diff.insert(t.clone());
                    }
                } else if p.is_fast && output.diffs.get(t) == Some(&false) {
                    info!(script = %p.script, target = %t, "fast operation reported no differences");
                    no_diff.insert(t.clone());
                }
            }
            if fs.exists(&temp) {
                let label = fs.mtime(&temp).map(epoch_seconds_label).unwrap_or_default();
                let flat = f.trim_end_matches('/').replace('/', "__");
                let archive = self.ctx.archive_dir().join(format!("{flat}{label}"));
                if !fs.exists(&archive) {
                    fs.rename(&temp, &archive)?;
                }
            }
        }
        Ok(())
    }

    /// Script files at or below a created target, workspace-relative.
    fn scripts_under(&self, target: &str) -> Vec<String> {
        let abs = self.ctx.abs(target);
        let fs = self.ctx.fs();
        let mut found = Vec::new();
        if fs.is_file(&abs) {
            if is_script_path(target) {
                found.push(target.trim_start_matches("./").to_string());
            }
            return found;
        }
        for path in recursive_files(fs, &abs) {
            if let Ok(rel) = path.strip_prefix(self.ctx.root()) {
                let rel = rel.to_string_lossy().replace('\\', "/");
                if is_script_path(&rel) {
                    found.push(rel);
                }
            }
        }
        found
    }
}

fn stamped_sibling(path: &std::path::Path, infix: &str) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let label = epoch_seconds_label(now_nanos());
    path.with_file_name(format!("{name}{infix}{label}"))
}

/// One call per script: the last round a script appears in wins, so a
/// script triggered both directly and through a longer path runs after all
/// its inputs settled.
fn reduce_script_rounds(rounds: &[Vec<Link>]) -> Vec<Vec<String>> {
    let sets: Vec<BTreeSet<String>> = rounds
        .iter()
        .map(|r| r.iter().filter_map(|l| l.update_script.clone()).collect())
        .collect();
    let mut last: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, set) in sets.iter().enumerate() {
        for s in set {
            last.insert(s.as_str(), i);
        }
    }
    sets.iter()
        .enumerate()
        .map(|(i, set)| {
            set.iter().filter(|s| last.get(s.as_str()) == Some(&i)).cloned().collect()
        })
        .collect()
}

/// Drop calls to scripts that are themselves about to be regenerated; they
/// run in the recursive pass over their new contents instead.
fn remove_scripts_to_be_created(links: &[Link], script_rounds: &mut [Vec<String>]) {
    let mut bad_seeds: Vec<String> = Vec::new();
    for link in links {
        let Some(file) = link.update_script_file.as_deref() else { continue };
        let overwritten = links.iter().any(|c| {
            c.kind == LinkKind::CreatedBy && path_along(file, &c.target_file)
        });
        if overwritten {
            if let Some(script) = &link.update_script {
                if !bad_seeds.contains(script) {
                    bad_seeds.push(script.clone());
                }
            }
        }
    }
    if bad_seeds.is_empty() {
        return;
    }
    let mut bad: BTreeSet<String> = bad_seeds.iter().cloned().collect();
    for round in propagate_reach(links, &bad_seeds, Direction::Down) {
        for i in round {
            if let Some(s) = &links[i].update_script {
                bad.insert(s.clone());
            }
        }
    }
    warn!(scripts = ?bad, "cancelling calls to scripts that are about to be overwritten");
    for round in script_rounds.iter_mut() {
        round.retain(|s| !bad.contains(s));
    }
}

/// Per script: its created targets, its fast flag and its file.
#[allow(clippy::type_complexity)]
fn creates_and_fast(
    links: &[Link],
) -> (BTreeMap<String, Vec<String>>, BTreeMap<String, bool>, BTreeMap<String, String>) {
    let mut creates: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut fast: BTreeMap<String, bool> = BTreeMap::new();
    let mut files: BTreeMap<String, String> = BTreeMap::new();
    for link in links {
        let Some(script) = &link.update_script else { continue };
        if let Some(file) = &link.update_script_file {
            files.entry(script.clone()).or_insert_with(|| file.clone());
        }
        if link.kind != LinkKind::CreatedBy {
            continue;
        }
        let targets = creates.entry(script.clone()).or_default();
        if !targets.contains(&link.target) {
            targets.push(link.target.clone());
        }
        fast.entry(script.clone()).or_insert(link.is_fast);
    }
    for targets in creates.values_mut() {
        targets.sort();
    }
    (creates, fast, files)
}
