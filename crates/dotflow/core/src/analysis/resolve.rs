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

use super::uses::{MODULE_SCOPE, UsesInfo, collect_uses};
use crate::context::WorkspaceContext;
use crate::script::parse_module;
use dotflow_common::{candidate_paths, module_name, to_slash, with_trailing_slash};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Resolution outcome for one scope: `resolved` pairs each qualified name
/// with the workspace path it refers to, `unresolved` keeps the names no
/// source could be found for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedUses {
    pub resolved: Vec<(String, String)>,
    pub unresolved: Vec<String>,
}

/// Resolve every name mentioned in `script` against the workspace.
///
/// Returns a map keyed by scope ([`MODULE_SCOPE`] plus each function name).
/// `None` when the script cannot be read or parsed; callers treat that the
/// same as a script with no resolvable uses.
pub fn full_uses(ctx: &WorkspaceContext, script: &str) -> Option<BTreeMap<String, ResolvedUses>> {
    let source = ctx.fs().read(&ctx.abs(script)).ok()?;
    let module = parse_module(&String::from_utf8_lossy(&source)).ok()?;
    let info = collect_uses(&module);
    let module_nm = module_name(script)?;

    let mut mentions: Vec<String> = Vec::new();
    for ms in info.scope_mentions.values() {
        for m in ms {
            if !mentions.contains(m) {
                mentions.push(m.clone());
            }
        }
    }

    // Names defined in this very module resolve to it.
    let internals: BTreeSet<&String> = mentions
        .iter()
        .filter(|m| info.name_defs.contains_key(*m) || info.scope_mentions.contains_key(*m))
        .collect();
    let internal_refs: BTreeMap<String, (String, String)> = internals
        .iter()
        .map(|x| ((*x).clone(), (format!("{module_nm}.{x}"), script.to_string())))
        .collect();

    let global = check_scope(ctx, &info, &mentions, &internals, &module_nm, script, MODULE_SCOPE);

    let mut out = BTreeMap::new();
    for (scope, scope_mentions) in &info.scope_mentions {
        let mut local = check_scope(ctx, &info, &mentions, &internals, &module_nm, script, scope);
        local.externals.extend(global.externals.clone());
        local.star_uses.extend(global.star_uses.clone());
        local.more_internals.extend(global.more_internals.clone());

        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for m in scope_mentions {
            let mut hit = false;
            for table in [&internal_refs, &local.externals, &local.star_uses, &local.more_internals]
            {
                if let Some(pair) = table.get(m) {
                    hit = true;
                    if !resolved.contains(pair) {
                        resolved.push(pair.clone());
                    }
                }
            }
            if !hit {
                unresolved.push(m.clone());
            }
        }
        out.insert(scope.clone(), ResolvedUses { resolved, unresolved });
    }
    debug!(script, scopes = out.len(), "resolved uses");
    Some(out)
}

#[derive(Default, Clone)]
struct ScopeCheck {
    /// Mention -> (qualified name, existing script or directory path).
    externals: BTreeMap<String, (String, String)>,
    /// Mentions resolved through a star import.
    star_uses: BTreeMap<String, (String, String)>,
    /// Import-shaped mentions with no external source; attributed to this
    /// module so they still produce a link endpoint.
    more_internals: BTreeMap<String, (String, String)>,
}

fn check_scope(
    ctx: &WorkspaceContext,
    info: &UsesInfo,
    mentions: &[String],
    internals: &BTreeSet<&String>,
    module_nm: &str,
    script: &str,
    scope: &str,
) -> ScopeCheck {
    let Some(imports) = info.imports.get(scope) else { return ScopeCheck::default() };

    // Pair each mention with the import binding it goes through, rewriting
    // the aliased head to its qualified name.
    let mut qualified: Vec<(String, String)> = Vec::new();
    let mut heads: Vec<(String, String)> = Vec::new();
    for x in mentions {
        if let Some(q) = imports.get(x) {
            qualified.push((x.clone(), q.clone()));
            heads.push((x.clone(), x.clone()));
        } else {
            for (alias, q) in imports {
                if let Some(rest) = x.strip_prefix(&format!("{alias}.")) {
                    qualified.push((x.clone(), format!("{q}.{rest}")));
                    heads.push((x.clone(), alias.clone()));
                }
            }
        }
    }

    let mut check = ScopeCheck::default();
    for (x, q) in &qualified {
        if let Some(path) = existing_source(ctx, q) {
            check.externals.insert(x.clone(), (q.clone(), path));
        }
    }
    for (x, head) in &heads {
        check
            .more_internals
            .insert(x.clone(), (format!("{module_nm}.{head}"), script.to_string()));
    }

    // Whatever is neither import-shaped nor internal may come in through a
    // star import; chase those one level.
    let imported_heads: BTreeSet<&String> = heads.iter().map(|(x, _)| x).collect();
    let remainder: Vec<&String> = mentions
        .iter()
        .filter(|m| !imported_heads.contains(m) && !internals.contains(m))
        .collect();
    if !remainder.is_empty() {
        for star in info.name_defs.keys().filter_map(|k| k.strip_suffix(".*")) {
            let path = format!("{}.flow", to_slash(star));
            if !ctx.fs().is_file(&ctx.abs(&path)) {
                continue;
            }
            let Ok(source) = ctx.fs().read(&ctx.abs(&path)) else { continue };
            let Ok(module) = parse_module(&String::from_utf8_lossy(&source)) else { continue };
            let star_info = collect_uses(&module);
            for r in &remainder {
                if star_info.name_defs.contains_key(r.as_str())
                    || star_info.scope_mentions.contains_key(r.as_str())
                {
                    check
                        .star_uses
                        .insert((*r).clone(), (format!("{star}.{r}"), path.clone()));
                }
            }
        }
    }
    check
}

/// The workspace source a qualified dotted name lives in: the longest
/// proper-prefix script file, else the longest prefix directory.
fn existing_source(ctx: &WorkspaceContext, qualified: &str) -> Option<String> {
    let file = candidate_paths(qualified)
        .into_iter()
        .rev()
        .find(|p| ctx.fs().is_file(&ctx.abs(p)));
    if let Some(f) = file {
        return Some(f);
    }
    let segs: Vec<&str> = qualified.split('.').collect();
    (1..segs.len())
        .rev()
        .map(|j| segs[..j].join("/"))
        .find(|d| ctx.fs().is_dir(&ctx.abs(d)))
        .map(|d| with_trailing_slash(&d))
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

    fn write(ctx: &WorkspaceContext, rel: &str, src: &str) {
        ctx.fs().write(&ctx.abs(rel), src.as_bytes()).unwrap();
    }

    #[test]
    fn test_resolves_import_to_script_file() {
        let (_dir, ctx) = setup();
        write(&ctx, "tools/csv.flow", "fn load(path) { read(path) }");
        write(
            &ctx,
            "report.flow",
            "import tools.csv as csv\nfn make() { csv.load(\"a\") }",
        );
        let fu = full_uses(&ctx, "report.flow").unwrap();
        let make = &fu["make"];
        assert!(
            make.resolved
                .contains(&("tools.csv.load".to_string(), "tools/csv.flow".to_string()))
        );
    }

    #[test]
    fn test_internal_reference() {
        let (_dir, ctx) = setup();
        write(&ctx, "report.flow", "fn helper() { run() }\nfn make() { helper() }");
        let fu = full_uses(&ctx, "report.flow").unwrap();
        assert!(
            fu["make"]
                .resolved
                .contains(&("report.helper".to_string(), "report.flow".to_string()))
        );
    }

    #[test]
    fn test_star_import_chased_one_level() {
        let (_dir, ctx) = setup();
        write(&ctx, "helpers.flow", "fn tidy(x) { x }");
        write(&ctx, "report.flow", "from helpers import *\nfn make() { tidy(1) }");
        let fu = full_uses(&ctx, "report.flow").unwrap();
        assert!(
            fu["make"]
                .resolved
                .contains(&("helpers.tidy".to_string(), "helpers.flow".to_string()))
        );
    }

    #[test]
    fn test_unresolved_kept() {
        let (_dir, ctx) = setup();
        write(&ctx, "report.flow", "fn make() { mystery() }");
        let fu = full_uses(&ctx, "report.flow").unwrap();
        assert_eq!(fu["make"].unresolved, vec!["mystery"]);
    }

    #[test]
    fn test_unparseable_is_none() {
        let (_dir, ctx) = setup();
        write(&ctx, "broken.flow", "fn oops( {");
        assert!(full_uses(&ctx, "broken.flow").is_none());
    }
}
