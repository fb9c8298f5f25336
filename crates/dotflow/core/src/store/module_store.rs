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

use super::blob::{decode_blob, encode_blob, read_blob};
use super::part::{DeclaredMeta, Fingerprint, PartKind, StoredPart};
use crate::context::WorkspaceContext;
use crate::fs::write_atomic;
use crate::script::{Module, Stmt, parse_module};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

const PARTS_FILE: &str = "parts.bin";
const TIMES_FILE: &str = "times.bin";

/// The refreshed view of one script: its parts with per-part modification
/// times in epoch nanoseconds.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub parts: BTreeMap<String, StoredPart>,
    pub times: BTreeMap<String, u64>,
    pub script_mtime: u64,
}

/// Times artifact. `parts_hash` ties it to the exact bytes of the parts
/// artifact it was computed against; a mismatch means the pair is stale as
/// a whole and both are rebuilt.
#[derive(Debug, Serialize, Deserialize)]
struct TimesBlob {
    script_mtime: u64,
    times: BTreeMap<String, u64>,
    parts_hash: [u8; 32],
}

struct Slot {
    checked_mtime: u64,
    record: Option<ModuleRecord>,
}

/// Store of per-operation modification times, one cache directory per
/// script under `modules/`.
///
/// Access goes through [`OperationStore::record`], which refreshes the
/// persisted artifacts against the script file: unchanged parts keep their
/// recorded time, changed or new parts take the script's mtime. A script
/// that fails to parse yields `None` and leaves the previous artifacts in
/// place.
pub struct OperationStore {
    ctx: WorkspaceContext,
    slots: HashMap<String, Slot>,
}

impl OperationStore {
    pub fn new(ctx: WorkspaceContext) -> Self {
        Self { ctx, slots: HashMap::new() }
    }

    /// The current record for `script` (a workspace-relative path), or
    /// `None` when the script is missing or unparseable.
    pub fn record(&mut self, script: &str) -> Option<&ModuleRecord> {
        let Ok(script_mtime) = self.ctx.fs().mtime(&self.ctx.abs(script)) else {
            self.slots.remove(script);
            return None;
        };
        let fresh = match self.slots.get(script) {
            Some(slot) => slot.checked_mtime == script_mtime,
            None => false,
        };
        if !fresh {
            let record = self.refresh(script, script_mtime);
            self.slots.insert(script.to_string(), Slot { checked_mtime: script_mtime, record });
        }
        self.slots.get(script).and_then(|s| s.record.as_ref())
    }

    /// Modification time of one operation, `None` when the script or the
    /// operation does not exist.
    pub fn operation_time(&mut self, script: &str, part: &str) -> Option<u64> {
        self.record(script).and_then(|r| r.times.get(part).copied())
    }

    /// Drop the memoized view of `script`, forcing a re-read on next access.
    pub fn invalidate(&mut self, script: &str) {
        self.slots.remove(script);
    }

    fn refresh(&self, script: &str, script_mtime: u64) -> Option<ModuleRecord> {
        let fs = self.ctx.fs();
        let dir = self.ctx.module_cache_dir(script);
        let parts_path = dir.join(PARTS_FILE);
        let times_path = dir.join(TIMES_FILE);

        let parts_bytes = fs.read(&parts_path).ok();
        let cached_parts: Option<BTreeMap<String, StoredPart>> =
            parts_bytes.as_deref().and_then(|b| decode_blob(b));
        let times: Option<TimesBlob> = read_blob(fs, &times_path);

        let cached = match (cached_parts, times, parts_bytes) {
            (Some(parts), Some(tb), Some(bytes)) => {
                let digest: [u8; 32] = Sha3_256::digest(&bytes).into();
                if tb.parts_hash == digest {
                    Some((parts, tb))
                } else {
                    debug!(
                        script,
                        stored = %hex::encode(&tb.parts_hash[..8]),
                        actual = %hex::encode(&digest[..8]),
                        "operation cache hash mismatch, rebuilding"
                    );
                    None
                }
            }
            _ => None,
        };

        if let Some((parts, tb)) = &cached {
            if script_mtime <= tb.script_mtime {
                return Some(ModuleRecord {
                    parts: parts.clone(),
                    times: tb.times.clone(),
                    script_mtime: tb.script_mtime,
                });
            }
        }

        let source = fs.read(&self.ctx.abs(script)).ok()?;
        let module = match parse_module(&String::from_utf8_lossy(&source)) {
            Ok(m) => m,
            Err(e) => {
                warn!(script, error = %e, "script does not parse, keeping previous store");
                return None;
            }
        };
        let new_parts = parts_of(&module);

        let mut new_times = BTreeMap::new();
        for (name, part) in &new_parts {
            let kept = cached.as_ref().and_then(|(old_parts, tb)| {
                let old = old_parts.get(name)?;
                if old.fingerprint == part.fingerprint { tb.times.get(name).copied() } else { None }
            });
            new_times.insert(name.clone(), kept.unwrap_or(script_mtime));
        }
        debug!(script, parts = new_parts.len(), "refreshed operation store");

        self.persist(script, &new_parts, &new_times, script_mtime);
        Some(ModuleRecord { parts: new_parts, times: new_times, script_mtime })
    }

    fn persist(
        &self,
        script: &str,
        parts: &BTreeMap<String, StoredPart>,
        times: &BTreeMap<String, u64>,
        script_mtime: u64,
    ) {
        let fs = self.ctx.fs();
        let dir = self.ctx.module_cache_dir(script);
        let Some(parts_framed) = encode_blob(parts) else { return };
        let parts_hash: [u8; 32] = Sha3_256::digest(&parts_framed).into();
        let tb = TimesBlob { script_mtime, times: times.clone(), parts_hash };
        let Some(times_framed) = encode_blob(&tb) else { return };
        if write_atomic(fs, &dir.join(PARTS_FILE), &parts_framed).is_err()
            || write_atomic(fs, &dir.join(TIMES_FILE), &times_framed).is_err()
        {
            warn!(script, "failed to persist operation store");
        }
    }
}

/// Top-level parts of a module: functions and bindings, by name. A name
/// defined twice keeps its last definition.
fn parts_of(module: &Module) -> BTreeMap<String, StoredPart> {
    let mut parts = BTreeMap::new();
    for stmt in &module.items {
        match stmt {
            Stmt::Fn(def) => {
                parts.insert(
                    def.name.clone(),
                    StoredPart {
                        kind: PartKind::Function,
                        fingerprint: Fingerprint::of_function(def),
                        meta: DeclaredMeta::from_function(def),
                    },
                );
            }
            Stmt::Let { name, value } => {
                parts.insert(
                    name.clone(),
                    StoredPart {
                        kind: PartKind::Binding,
                        fingerprint: Fingerprint::of_binding(value),
                        meta: DeclaredMeta::default(),
                    },
                );
            }
            _ => {}
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LayoutConfig;
    use tempfile::TempDir;

    fn setup() -> (TempDir, WorkspaceContext) {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        (dir, ctx)
    }

    fn write_script(ctx: &WorkspaceContext, rel: &str, src: &str, mtime: u64) {
        let path = ctx.abs(rel);
        ctx.fs().write(&path, src.as_bytes()).unwrap();
        ctx.fs().set_mtime(&path, mtime).unwrap();
    }

    const T0: u64 = 1_600_000_000_000_000_000;
    const T1: u64 = 1_600_000_100_000_000_000;

    #[test]
    fn test_unchanged_part_keeps_time() {
        let (_dir, ctx) = setup();
        write_script(
            &ctx,
            "gen.flow",
            "fn a() { run() }\nfn b() { old() }",
            T0,
        );
        let mut store = OperationStore::new(ctx.clone());
        assert_eq!(store.operation_time("gen.flow", "a"), Some(T0));
        assert_eq!(store.operation_time("gen.flow", "b"), Some(T0));

        // Edit only `b`.
        write_script(
            &ctx,
            "gen.flow",
            "fn a() { run() }\nfn b() { new() }",
            T1,
        );
        store.invalidate("gen.flow");
        assert_eq!(store.operation_time("gen.flow", "a"), Some(T0));
        assert_eq!(store.operation_time("gen.flow", "b"), Some(T1));
    }

    #[test]
    fn test_persisted_across_instances() {
        let (_dir, ctx) = setup();
        write_script(&ctx, "gen.flow", "fn a() { run() }", T0);
        OperationStore::new(ctx.clone()).record("gen.flow").unwrap();

        let mut second = OperationStore::new(ctx.clone());
        assert_eq!(second.operation_time("gen.flow", "a"), Some(T0));
    }

    #[test]
    fn test_parse_failure_returns_none() {
        let (_dir, ctx) = setup();
        write_script(&ctx, "gen.flow", "fn broken( {", T0);
        let mut store = OperationStore::new(ctx.clone());
        assert!(store.record("gen.flow").is_none());
    }

    #[test]
    fn test_missing_script_returns_none() {
        let (_dir, ctx) = setup();
        let mut store = OperationStore::new(ctx);
        assert!(store.record("ghost.flow").is_none());
    }

    #[test]
    fn test_corrupt_cache_self_heals() {
        let (_dir, ctx) = setup();
        write_script(&ctx, "gen.flow", "fn a() { run() }", T0);
        let mut store = OperationStore::new(ctx.clone());
        store.record("gen.flow").unwrap();

        let parts_path = ctx.module_cache_dir("gen.flow").join("parts.bin");
        ctx.fs().write(&parts_path, b"garbage").unwrap();
        let mut second = OperationStore::new(ctx.clone());
        assert_eq!(second.operation_time("gen.flow", "a"), Some(T0));
    }

    #[test]
    fn test_mismatched_parts_blob_rebuilds() {
        let (_dir, ctx) = setup();
        write_script(&ctx, "gen.flow", "fn a() { run() }", T0);
        write_script(&ctx, "other.flow", "fn z() { other() }", T0);
        let mut store = OperationStore::new(ctx.clone());
        store.record("gen.flow").unwrap();
        store.record("other.flow").unwrap();

        // A well-formed parts blob that does not match the times artifact's
        // integrity hash must be treated as corrupt.
        let foreign = ctx.fs().read(&ctx.module_cache_dir("other.flow").join("parts.bin")).unwrap();
        ctx.fs().write(&ctx.module_cache_dir("gen.flow").join("parts.bin"), &foreign).unwrap();

        let mut second = OperationStore::new(ctx.clone());
        assert_eq!(second.operation_time("gen.flow", "a"), Some(T0));
        assert!(second.operation_time("gen.flow", "z").is_none());
    }
}
