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

//! Timestamp-aware downstream propagation.
//!
//! Each round evaluates a candidate set of links against the modification
//! stamps flowing into them. A link whose target is missing or older than
//! its incoming stamp activates; along non-create links the concrete time
//! keeps flowing, while a stale create taints everything downstream with
//! [`Stamp::Forced`]. The next candidate set is built from activated
//! targets by exact name match plus path containment around created
//! directories.

use super::seed::seed_indices;
use crate::context::WorkspaceContext;
use crate::fs::recursive_mtime;
use crate::links::{Link, LinkKind};
use crate::store::OperationStore;
use dotflow_common::{Stamp, is_script_path, module_name, path_along};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::warn;

/// Where the propagator asks for last-successful-creation times when
/// `protect_computed` is on. `None` means no record, which never protects.
pub trait CreatedTimeSource {
    fn created_time(&self, target: &str) -> Option<u64>;
}

/// A source that protects nothing.
pub struct NoCreatedTimes;

impl CreatedTimeSource for NoCreatedTimes {
    fn created_time(&self, _target: &str) -> Option<u64> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct PropagateOptions {
    /// Take the plain mtime of directories instead of the latest mtime in
    /// their tree.
    pub simple: bool,
    /// Build the next round only from activated links.
    pub pruning: bool,
    /// Also activate targets modified after their recorded creation, on
    /// the grounds that hand-edited outputs are suspect.
    pub protect_computed: bool,
}

impl Default for PropagateOptions {
    fn default() -> Self {
        Self { simple: false, pruning: true, protect_computed: false }
    }
}

/// One evaluated link in one round.
#[derive(Debug, Clone)]
pub struct Activation {
    pub link_index: usize,
    pub link: Link,
    /// Stamp flowing into the link this round.
    pub in_mark: Stamp,
    /// Stamp the link passes downstream.
    pub out_mark: Stamp,
    /// Indices of the links in the previous round that fed this one.
    pub triggers: BTreeSet<usize>,
    pub target_mtime: Option<u64>,
    pub activated: bool,
}

/// Propagate downstream from `seeds`, returning the evaluated links of
/// each round. Rounds include non-activated links; callers filter on
/// [`Activation::activated`]. On a cycle the rounds completed so far are
/// returned and a warning names the scripts involved.
pub fn propagate_with_times(
    ctx: &WorkspaceContext,
    store: &mut OperationStore,
    created: &dyn CreatedTimeSource,
    links: &[Link],
    seeds: &[String],
    opts: &PropagateOptions,
) -> Vec<Vec<Activation>> {
    let seed_idx = seed_indices(ctx, links, seeds);
    if seed_idx.is_empty() {
        return Vec::new();
    }
    let mut resolver = MtimeResolver { ctx, store, simple: opts.simple, cache: HashMap::new() };

    // Candidate entries: link index -> (incoming stamp, triggering links).
    let mut current: BTreeMap<usize, (Stamp, BTreeSet<usize>)> = BTreeMap::new();
    for i in seed_idx {
        let link = &links[i];
        let stamp = stamp_of(resolver.mtime(&link.source_file, &link.source));
        current.insert(i, (stamp, BTreeSet::new()));
    }

    let mut rounds: Vec<Vec<Activation>> = Vec::new();
    let mut previous_sets: Vec<HashSet<(usize, Stamp)>> = Vec::new();
    previous_sets.push(current.iter().map(|(i, (s, _))| (*i, *s)).collect());

    while !current.is_empty() {
        let mut round: Vec<Activation> = Vec::new();
        for (&i, (in_mark, triggers)) in &current {
            round.push(evaluate(
                ctx,
                &mut resolver,
                created,
                links,
                i,
                *in_mark,
                triggers.clone(),
                opts.protect_computed,
            ));
        }

        let candidates: Vec<&Activation> = if opts.pruning {
            round.iter().filter(|a| a.activated).collect()
        } else {
            round.iter().collect()
        };

        let mut next: BTreeMap<usize, (Stamp, BTreeSet<usize>)> = BTreeMap::new();
        let mut feed = |j: usize, stamp: Stamp, source: usize| {
            let entry = next.entry(j).or_insert((stamp, BTreeSet::new()));
            entry.0 = entry.0.join(stamp);
            entry.1.insert(source);
        };
        let creates: Vec<&Activation> =
            candidates.iter().filter(|a| a.link.kind == LinkKind::CreatedBy).copied().collect();
        for (j, link) in links.iter().enumerate() {
            for cand in &candidates {
                if link.source == cand.link.target {
                    feed(j, cand.out_mark, cand.link_index);
                }
            }
            for cand in &creates {
                if path_along(&cand.link.target, &link.source)
                    || path_along(&link.source, &cand.link.target)
                {
                    feed(j, cand.out_mark, cand.link_index);
                }
            }
        }
        rounds.push(round);

        let next_set: HashSet<(usize, Stamp)> =
            next.iter().map(|(i, (s, _))| (*i, *s)).collect();
        if !next.is_empty() && previous_sets.iter().any(|p| p.is_subset(&next_set)) {
            let mut scripts: BTreeSet<&str> = BTreeSet::new();
            for i in next.keys() {
                if let Some(s) = links[*i].update_script.as_deref() {
                    scripts.insert(s);
                }
            }
            warn!(
                scripts = ?scripts,
                "link graph cycle detected, propagation stopped after {} rounds",
                rounds.len()
            );
            return rounds;
        }
        previous_sets.push(next_set);
        current = next;
    }
    rounds
}

fn stamp_of(mtime: Option<u64>) -> Stamp {
    match mtime {
        Some(t) => Stamp::At(t),
        None => Stamp::Forced,
    }
}

#[allow(clippy::too_many_arguments)]
fn evaluate(
    ctx: &WorkspaceContext,
    resolver: &mut MtimeResolver<'_>,
    created: &dyn CreatedTimeSource,
    links: &[Link],
    index: usize,
    in_mark: Stamp,
    triggers: BTreeSet<usize>,
    protect_computed: bool,
) -> Activation {
    let link = &links[index];
    let target_exists = ctx.fs().exists(&ctx.abs(&link.target_file));
    let target_mtime =
        if target_exists { resolver.mtime(&link.target_file, &link.target) } else { None };

    let triggered = in_mark.is_forced();
    let is_create = link.kind == LinkKind::CreatedBy;
    let not_too_old = match target_mtime {
        Some(m) => in_mark.at_or_before(m),
        None => false,
    };
    let not_too_young = !protect_computed
        || match (created.created_time(&link.target), target_mtime) {
            (None, _) => true,
            (Some(p), Some(m)) => m <= p,
            (Some(_), None) => false,
        };

    let pass = target_exists
        && !triggered
        && (!is_create || not_too_old)
        && (!is_create || not_too_young);

    let (out_mark, activated) = if pass {
        let out = match target_mtime {
            Some(m) => in_mark.join(Stamp::At(m)),
            None => Stamp::Forced,
        };
        (out, !not_too_old)
    } else {
        (Stamp::Forced, true)
    };

    Activation {
        link_index: index,
        link: link.clone(),
        in_mark,
        out_mark,
        triggers,
        target_mtime,
        activated,
    }
}

/// Lazily computed modification times, keyed by (file, object) so that a
/// script file queried for two of its operations yields two answers.
struct MtimeResolver<'a> {
    ctx: &'a WorkspaceContext,
    store: &'a mut OperationStore,
    simple: bool,
    cache: HashMap<(String, String), Option<u64>>,
}

impl MtimeResolver<'_> {
    fn mtime(&mut self, file: &str, object: &str) -> Option<u64> {
        let key = (file.to_string(), object.to_string());
        if let Some(v) = self.cache.get(&key) {
            return *v;
        }
        let v = self.compute(file, object);
        self.cache.insert(key, v);
        v
    }

    fn compute(&mut self, file: &str, object: &str) -> Option<u64> {
        let abs = self.ctx.abs(file);
        if !self.ctx.fs().exists(&abs) {
            return None;
        }
        // Operation names inside a script resolve to per-part times.
        if is_script_path(file) && object != file {
            if let Some(module_nm) = module_name(file) {
                if let Some(part) = object.strip_prefix(&format!("{module_nm}.")) {
                    if !part.contains('.') {
                        if let Some(t) = self.store.operation_time(file, part) {
                            return Some(t);
                        }
                    }
                }
            }
        }
        if self.ctx.fs().is_dir(&abs) && !self.simple {
            recursive_mtime(self.ctx.fs(), &abs)
        } else {
            self.ctx.fs().mtime(&abs).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LayoutConfig;
    use tempfile::TempDir;

    const T0: u64 = 1_600_000_000_000_000_000;
    const T1: u64 = 1_600_000_100_000_000_000;
    const T2: u64 = 1_600_000_200_000_000_000;

    fn setup() -> (TempDir, WorkspaceContext, OperationStore) {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        let store = OperationStore::new(ctx.clone());
        (dir, ctx, store)
    }

    fn write_at(ctx: &WorkspaceContext, rel: &str, mtime: u64) {
        let p = ctx.abs(rel);
        ctx.fs().write(&p, b"x").unwrap();
        ctx.fs().set_mtime(&p, mtime).unwrap();
    }

    fn created_by(op: &str, script: &str, target: &str) -> Link {
        Link {
            kind: LinkKind::CreatedBy,
            source: op.to_string(),
            source_file: script.to_string(),
            target: target.to_string(),
            target_file: target.to_string(),
            update_script: Some(op.to_string()),
            update_script_file: Some(script.to_string()),
            is_fast: false,
        }
    }

    fn depends_on(source: &str, op: &str, script: &str) -> Link {
        Link {
            kind: LinkKind::DependsOn,
            source: source.to_string(),
            source_file: source.to_string(),
            target: op.to_string(),
            target_file: script.to_string(),
            update_script: None,
            update_script_file: Some(script.to_string()),
            is_fast: false,
        }
    }

    fn activated_targets(rounds: &[Vec<Activation>]) -> Vec<String> {
        rounds
            .iter()
            .flatten()
            .filter(|a| a.activated)
            .map(|a| a.link.target.clone())
            .collect()
    }

    #[test]
    fn test_fresh_target_not_activated() {
        let (_dir, ctx, mut store) = setup();
        write_at(&ctx, "src/raw.csv", T0);
        write_at(&ctx, "gen.flow", T0);
        write_at(&ctx, "out/data", T1);
        let links = vec![
            depends_on("src/raw.csv", "gen.build", "gen.flow"),
            created_by("gen.build", "gen.flow", "out/data"),
        ];
        // gen.flow has no parseable op times here; file mtime T0 is used.
        let rounds = propagate_with_times(
            &ctx,
            &mut store,
            &NoCreatedTimes,
            &links,
            &["src".to_string()],
            &PropagateOptions::default(),
        );
        assert!(activated_targets(&rounds).is_empty());
    }

    #[test]
    fn test_stale_chain_activates_downstream() {
        let (_dir, ctx, mut store) = setup();
        write_at(&ctx, "src/raw.csv", T2);
        write_at(&ctx, "gen.flow", T0);
        write_at(&ctx, "out/data", T1);
        write_at(&ctx, "use.flow", T0);
        write_at(&ctx, "out/report", T1);
        let links = vec![
            depends_on("src/raw.csv", "gen.build", "gen.flow"),
            created_by("gen.build", "gen.flow", "out/data"),
            depends_on("out/data", "use.consume", "use.flow"),
            created_by("use.consume", "use.flow", "out/report"),
        ];
        let rounds = propagate_with_times(
            &ctx,
            &mut store,
            &NoCreatedTimes,
            &links,
            &["src".to_string()],
            &PropagateOptions::default(),
        );
        let targets = activated_targets(&rounds);
        assert!(targets.contains(&"gen.build".to_string()));
        assert!(targets.contains(&"out/data".to_string()));
        assert!(targets.contains(&"use.consume".to_string()));
        assert!(targets.contains(&"out/report".to_string()));
    }

    #[test]
    fn test_missing_target_forces() {
        let (_dir, ctx, mut store) = setup();
        write_at(&ctx, "src/raw.csv", T0);
        write_at(&ctx, "gen.flow", T1);
        // out/data never created.
        let links = vec![
            depends_on("src/raw.csv", "gen.build", "gen.flow"),
            created_by("gen.build", "gen.flow", "out/data"),
        ];
        let rounds = propagate_with_times(
            &ctx,
            &mut store,
            &NoCreatedTimes,
            &links,
            &["gen.build".to_string()],
            &PropagateOptions::default(),
        );
        let missing: Vec<&Activation> = rounds
            .iter()
            .flatten()
            .filter(|a| a.link.target == "out/data")
            .collect();
        assert!(!missing.is_empty());
        assert!(missing.iter().all(|a| a.activated && a.out_mark.is_forced()));
    }

    #[test]
    fn test_cycle_returns_partial_rounds() {
        let (_dir, ctx, mut store) = setup();
        write_at(&ctx, "a.flow", T2);
        write_at(&ctx, "b.flow", T0);
        write_at(&ctx, "out/a", T0);
        write_at(&ctx, "out/b", T1);
        let links = vec![
            created_by("a.make", "a.flow", "out/a"),
            depends_on("out/a", "b.make", "b.flow"),
            created_by("b.make", "b.flow", "out/b"),
            depends_on("out/b", "a.make", "a.flow"),
        ];
        let rounds = propagate_with_times(
            &ctx,
            &mut store,
            &NoCreatedTimes,
            &links,
            &["a.make".to_string()],
            &PropagateOptions::default(),
        );
        assert!(!rounds.is_empty());
    }

    #[test]
    fn test_protect_computed_flags_hand_edit() {
        struct Fixed(u64);
        impl CreatedTimeSource for Fixed {
            fn created_time(&self, target: &str) -> Option<u64> {
                (target == "out/data").then_some(self.0)
            }
        }
        let (_dir, ctx, mut store) = setup();
        write_at(&ctx, "src/raw.csv", T0);
        write_at(&ctx, "gen.flow", T0);
        // Target modified after its recorded creation time.
        write_at(&ctx, "out/data", T2);
        let links = vec![
            depends_on("src/raw.csv", "gen.build", "gen.flow"),
            created_by("gen.build", "gen.flow", "out/data"),
        ];
        let mut opts = PropagateOptions::default();
        opts.protect_computed = true;
        let rounds = propagate_with_times(
            &ctx,
            &mut store,
            &Fixed(T1),
            &links,
            &["gen.build".to_string()],
            &opts,
        );
        assert!(activated_targets(&rounds).contains(&"out/data".to_string()));
    }
}
