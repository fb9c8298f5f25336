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

use super::link::{Link, LinkKind, NOT_EXISTS};
use crate::analysis::full_uses;
use crate::context::WorkspaceContext;
use crate::store::{OperationStore, PartKind};
use dotflow_common::{longest_existing_path, module_name};
use tracing::error;

/// Extract the declared and inferred links of `files`.
///
/// Returns the links plus the subset of `files` whose analysis succeeded;
/// a script that is missing or unparseable contributes nothing and is
/// reported so its cache entry is not refreshed.
pub fn compute_links(
    ctx: &WorkspaceContext,
    store: &mut OperationStore,
    files: &[String],
) -> (Vec<Link>, Vec<String>) {
    let mut links = Vec::new();
    let mut succeeded = Vec::new();

    for script in files {
        let Some(module_nm) = module_name(script) else {
            error!(script, "not a script path, no links extracted");
            continue;
        };
        let Some(record) = store.record(script) else {
            error!(script, "script failed to load, no links extracted");
            continue;
        };
        let record = record.clone();
        succeeded.push(script.clone());
        let resolved = full_uses(ctx, script).unwrap_or_default();

        for (part_name, part) in &record.parts {
            if part.kind != PartKind::Function {
                continue;
            }
            let opname = format!("{module_nm}.{part_name}");
            let meta = &part.meta;

            for created in &meta.creates {
                links.push(Link {
                    kind: LinkKind::CreatedBy,
                    source: opname.clone(),
                    source_file: script.clone(),
                    target: created.clone(),
                    target_file: created.clone(),
                    update_script: Some(opname.clone()),
                    update_script_file: Some(script.clone()),
                    is_fast: meta.is_fast,
                });
            }
            for dep in &meta.depends_on {
                links.push(Link {
                    kind: LinkKind::DependsOn,
                    source: dep.clone(),
                    source_file: dep.clone(),
                    target: opname.clone(),
                    target_file: script.clone(),
                    update_script: None,
                    update_script_file: Some(script.clone()),
                    is_fast: meta.is_fast,
                });
            }

            // Declared uses first, then names found by static analysis.
            let mut uses: Vec<String> = Vec::new();
            for u in &meta.uses {
                if !uses.contains(u) {
                    uses.push(u.clone());
                }
            }
            if let Some(r) = resolved.get(part_name) {
                for (name, _) in &r.resolved {
                    if !uses.contains(name) {
                        uses.push(name.clone());
                    }
                }
            }
            for used in uses {
                if used == opname {
                    continue;
                }
                let source_file =
                    longest_existing_path(&used, |p| ctx.fs().is_file(&ctx.abs(p)))
                        .unwrap_or_else(|| NOT_EXISTS.to_string());
                links.push(Link {
                    kind: LinkKind::Uses,
                    source: used,
                    source_file,
                    target: opname.clone(),
                    target_file: script.clone(),
                    update_script: None,
                    update_script_file: Some(script.clone()),
                    is_fast: meta.is_fast,
                });
            }
        }
    }
    (links, succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LayoutConfig;
    use tempfile::TempDir;

    fn setup() -> (TempDir, WorkspaceContext, OperationStore) {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        let store = OperationStore::new(ctx.clone());
        (dir, ctx, store)
    }

    fn write(ctx: &WorkspaceContext, rel: &str, src: &str) {
        ctx.fs().write(&ctx.abs(rel), src.as_bytes()).unwrap();
    }

    #[test]
    fn test_declared_links() {
        let (_dir, ctx, mut store) = setup();
        write(
            &ctx,
            "gen.flow",
            r#"
            #[fast]
            fn build(depends_on = "src/raw.csv", creates = "out/data") {
                run()
            }
            "#,
        );
        let (links, ok) = compute_links(&ctx, &mut store, &["gen.flow".to_string()]);
        assert_eq!(ok, vec!["gen.flow"]);

        let created: Vec<&Link> =
            links.iter().filter(|l| l.kind == LinkKind::CreatedBy).collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].source, "gen.build");
        assert_eq!(created[0].target, "out/data");
        assert_eq!(created[0].update_script.as_deref(), Some("gen.build"));
        assert!(created[0].is_fast);

        let deps: Vec<&Link> = links.iter().filter(|l| l.kind == LinkKind::DependsOn).collect();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].source, "src/raw.csv");
        assert_eq!(deps[0].target, "gen.build");
        assert_eq!(deps[0].update_script, None);
    }

    #[test]
    fn test_inferred_use_link() {
        let (_dir, ctx, mut store) = setup();
        write(&ctx, "tools/csv.flow", "fn load(p) { read(p) }");
        write(
            &ctx,
            "report.flow",
            "import tools.csv as csv\nfn make(creates = \"out/r.txt\") { csv.load(\"a\") }",
        );
        let (links, _) = compute_links(&ctx, &mut store, &["report.flow".to_string()]);
        let uses: Vec<&Link> = links
            .iter()
            .filter(|l| l.kind == LinkKind::Uses && l.source == "tools.csv.load")
            .collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].source_file, "tools/csv.flow");
        assert_eq!(uses[0].target, "report.make");
    }

    #[test]
    fn test_missing_use_marked_not_exists() {
        let (_dir, ctx, mut store) = setup();
        write(&ctx, "report.flow", "fn make(uses = \"ghost.thing\") { run() }");
        let (links, _) = compute_links(&ctx, &mut store, &["report.flow".to_string()]);
        let ghost = links.iter().find(|l| l.source == "ghost.thing").unwrap();
        assert_eq!(ghost.source_file, NOT_EXISTS);
    }

    #[test]
    fn test_broken_script_excluded() {
        let (_dir, ctx, mut store) = setup();
        write(&ctx, "bad.flow", "fn oops( {");
        write(&ctx, "good.flow", "fn a(creates = \"out/x\") { run() }");
        let (links, ok) =
            compute_links(&ctx, &mut store, &["bad.flow".to_string(), "good.flow".to_string()]);
        assert_eq!(ok, vec!["good.flow"]);
        assert!(links.iter().all(|l| l.update_script_file.as_deref() == Some("good.flow")));
    }
}
