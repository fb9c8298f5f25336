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

use super::derive::{dummy_links, implied_links};
use super::extract::compute_links;
use super::link::{Link, LinkKind, LinkQuery, NOT_EXISTS};
use crate::context::WorkspaceContext;
use crate::store::OperationStore;
use crate::store::blob::{read_blob, write_blob};
use dotflow_common::longest_existing_path;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

const LINKS_FILE: &str = "links.bin";
const TIMES_FILE: &str = "times.bin";
const IMPLIED_FILE: &str = "implied.bin";
const DUMMY_FILE: &str = "dummy.bin";

/// Incrementally maintained link cache under `links/`.
///
/// Four artifacts: the extracted links, the per-script analysis times they
/// were computed at, and the derived implied and dummy link sets. Pruning
/// of links whose script vanished happens before any recomputation, so a
/// deleted script can never resurrect cached edges.
pub struct LinkCache {
    ctx: WorkspaceContext,
}

impl LinkCache {
    pub fn new(ctx: WorkspaceContext) -> Self {
        Self { ctx }
    }

    /// Current links of `files`, re-analyzing only what changed.
    pub fn links_from_operations(
        &self,
        store: &mut OperationStore,
        files: &[String],
        query: &LinkQuery,
    ) -> Vec<Link> {
        let fs = self.ctx.fs();
        let dir = self.ctx.links_dir();

        // Times only count while the link artifact itself is readable;
        // otherwise everything gets re-analyzed.
        let stored_links: Option<Vec<Link>> = read_blob(fs, &dir.join(LINKS_FILE));
        let stored_times: BTreeMap<String, u64> = if stored_links.is_some() {
            read_blob(fs, &dir.join(TIMES_FILE)).unwrap_or_default()
        } else {
            BTreeMap::new()
        };
        let stored_links = stored_links.unwrap_or_default();

        // Step 1: prune entries whose script file no longer exists.
        let mut exists: HashMap<String, bool> = HashMap::new();
        let mut exists_of = |path: &str| -> bool {
            if let Some(v) = exists.get(path) {
                return *v;
            }
            let v = fs.exists(&self.ctx.abs(path));
            exists.insert(path.to_string(), v);
            v
        };

        let mut retained: Vec<Link> = Vec::new();
        let mut deleted: Vec<Link> = Vec::new();
        for link in &stored_links {
            let alive = link
                .update_script_file
                .as_deref()
                .is_some_and(|f| exists_of(f));
            if alive {
                retained.push(link.clone());
            } else {
                deleted.push(link.clone());
            }
        }
        let times_filtered: BTreeMap<String, u64> = stored_times
            .into_iter()
            .filter(|(f, _)| exists_of(f))
            .collect();

        // Step 2: decide which scripts need re-analysis.
        let file_set: BTreeSet<&str> = files.iter().map(String::as_str).collect();
        let mut to_get: Vec<String> = Vec::new();
        let mut push = |v: &mut Vec<String>, s: String| {
            if !v.contains(&s) {
                v.push(s);
            }
        };
        for f in files {
            if query.recompute || !times_filtered.contains_key(f) {
                push(&mut to_get, f.clone());
            }
        }
        let mut changed: BTreeSet<String> = BTreeSet::new();
        for (f, analyzed_at) in &times_filtered {
            let stale = query.recompute
                || fs.mtime(&self.ctx.abs(f)).map(|m| m > *analyzed_at).unwrap_or(true);
            if stale {
                changed.insert(f.clone());
                push(&mut to_get, f.clone());
            }
        }
        // A use that had no source may have gained one, and one that had a
        // source may have lost it; both force re-analysis of the user.
        for link in &retained {
            if link.kind != LinkKind::Uses {
                continue;
            }
            if link.source_file == NOT_EXISTS {
                if file_set.contains(link.target_file.as_str())
                    && longest_existing_path(&link.source, |p| fs.is_file(&self.ctx.abs(p)))
                        .is_some()
                {
                    push(&mut to_get, link.target_file.clone());
                }
            } else if !exists_of(&link.source_file) {
                push(&mut to_get, link.target_file.clone());
            }
        }

        // Step 3: recompute and merge.
        let (links_to_add, succeeded) = compute_links(&self.ctx, store, &to_get);
        debug!(
            queried = files.len(),
            reanalyzed = to_get.len(),
            added = links_to_add.len(),
            "link cache refresh"
        );

        let mut new_times: BTreeMap<String, u64> = times_filtered
            .iter()
            .filter(|(f, _)| !changed.contains(*f))
            .map(|(f, t)| (f.clone(), *t))
            .collect();
        for f in &succeeded {
            if let Ok(m) = fs.mtime(&self.ctx.abs(f)) {
                new_times.insert(f.clone(), m);
            }
        }

        let recomputed: BTreeSet<&str> = links_to_add
            .iter()
            .filter_map(|l| l.update_script_file.as_deref())
            .chain(succeeded.iter().map(String::as_str))
            .collect();
        let mut kept: Vec<Link> = Vec::new();
        for link in retained {
            let replaced = link
                .update_script_file
                .as_deref()
                .is_some_and(|f| recomputed.contains(f));
            if replaced {
                deleted.push(link);
            } else {
                kept.push(link);
            }
        }
        let mut new_links = kept.clone();
        new_links.extend(links_to_add.iter().cloned());

        let _ = write_blob(fs, &dir.join(LINKS_FILE), &new_links);
        let _ = write_blob(fs, &dir.join(TIMES_FILE), &new_times);

        // Step 4: maintain derived link sets incrementally.
        let stored_implied: Vec<Link> =
            read_blob(fs, &dir.join(IMPLIED_FILE)).unwrap_or_default();
        let implied_added = implied_links(&links_to_add, &kept);
        let implied_deleted: BTreeSet<Link> =
            implied_links(&deleted, &stored_links).into_iter().collect();
        let mut implied_new: Vec<Link> = stored_implied
            .into_iter()
            .filter(|l| !implied_deleted.contains(l))
            .collect();
        for l in implied_added {
            if !implied_new.contains(&l) {
                implied_new.push(l);
            }
        }
        let _ = write_blob(fs, &dir.join(IMPLIED_FILE), &implied_new);

        let stored_dummy: Vec<Link> = read_blob(fs, &dir.join(DUMMY_FILE)).unwrap_or_default();
        let dummy_added = dummy_links(&links_to_add, &kept, query.tie_break);
        let dummy_deleted: BTreeSet<Link> =
            dummy_links(&deleted, &stored_links, query.tie_break).into_iter().collect();
        let mut dummy_new: Vec<Link> = stored_dummy
            .into_iter()
            .filter(|l| !dummy_deleted.contains(l))
            .collect();
        for l in dummy_added {
            if !dummy_new.contains(&l) {
                dummy_new.push(l);
            }
        }
        let _ = write_blob(fs, &dir.join(DUMMY_FILE), &dummy_new);

        if !deleted.is_empty() {
            info!(pruned = deleted.len(), "retired links of removed or re-analyzed scripts");
        }

        // Step 5: select what the caller asked for.
        let mut out: Vec<Link> = new_links
            .into_iter()
            .filter(|l| l.update_script_file.as_deref().is_some_and(|f| file_set.contains(f)))
            .collect();
        if query.add_implied {
            out.extend(implied_new);
        }
        if query.add_dummies {
            out.extend(
                dummy_new.into_iter().filter(|l| file_set.contains(l.target_file.as_str())),
            );
        }
        if query.filter_not_exists {
            out.retain(|l| l.source_file != NOT_EXISTS);
        }
        if query.filter_internal {
            out.retain(|l| l.kind != LinkKind::Uses || file_set.contains(l.source_file.as_str()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LayoutConfig;
    use tempfile::TempDir;

    fn setup() -> (TempDir, WorkspaceContext, OperationStore, LinkCache) {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        let store = OperationStore::new(ctx.clone());
        let cache = LinkCache::new(ctx.clone());
        (dir, ctx, store, cache)
    }

    fn write(ctx: &WorkspaceContext, rel: &str, src: &str) {
        ctx.fs().write(&ctx.abs(rel), src.as_bytes()).unwrap();
    }

    #[test]
    fn test_cached_second_query_matches_first() {
        let (_dir, ctx, mut store, cache) = setup();
        write(&ctx, "gen.flow", "fn build(creates = \"out/data\") { run() }");
        let files = vec!["gen.flow".to_string()];
        let q = LinkQuery::default();
        let first = cache.links_from_operations(&mut store, &files, &q);
        let second = cache.links_from_operations(&mut store, &files, &q);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_deleted_script_links_pruned() {
        let (_dir, ctx, mut store, cache) = setup();
        write(&ctx, "gen.flow", "fn build(creates = \"out/data\") { run() }");
        write(&ctx, "other.flow", "fn keep(creates = \"out/kept\") { run() }");
        let files = vec!["gen.flow".to_string(), "other.flow".to_string()];
        let q = LinkQuery::default();
        cache.links_from_operations(&mut store, &files, &q);

        ctx.fs().remove(&ctx.abs("gen.flow")).unwrap();
        store.invalidate("gen.flow");
        let after =
            cache.links_from_operations(&mut store, &["other.flow".to_string()], &q);
        assert!(after.iter().all(|l| l.update_script_file.as_deref() == Some("other.flow")));
        assert!(!after.is_empty());
    }

    #[test]
    fn test_not_exists_use_recovers_when_source_appears() {
        let (_dir, ctx, mut store, cache) = setup();
        write(&ctx, "report.flow", "fn make(uses = \"tools.load\") { run() }");
        let files = vec!["report.flow".to_string()];
        let mut q = LinkQuery::default();
        q.filter_not_exists = false;
        q.filter_internal = false;
        let before = cache.links_from_operations(&mut store, &files, &q);
        assert!(before.iter().any(|l| l.source_file == NOT_EXISTS));

        write(&ctx, "tools.flow", "fn load() { read() }");
        let after = cache.links_from_operations(&mut store, &files, &q);
        let link = after.iter().find(|l| l.source == "tools.load").unwrap();
        assert_eq!(link.source_file, "tools.flow");
    }

    #[test]
    fn test_derived_links_returned_on_request() {
        let (_dir, ctx, mut store, cache) = setup();
        write(&ctx, "gen.flow", "fn build(creates = \"out\") { run() }");
        write(
            &ctx,
            "fill.flow",
            "fn add(creates = \"out/part\", depends_on = \"out\") { run() }",
        );
        let files = vec!["gen.flow".to_string(), "fill.flow".to_string()];
        let mut q = LinkQuery::default();
        q.add_implied = true;
        q.add_dummies = true;
        let links = cache.links_from_operations(&mut store, &files, &q);
        assert!(links.iter().any(|l| l.kind == LinkKind::Implied));
        assert!(
            links
                .iter()
                .any(|l| l.kind == LinkKind::Dummy && l.target == "fill.add")
        );
    }
}
