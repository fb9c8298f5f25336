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

use crate::context::WorkspaceContext;
use crate::links::Link;
use dotflow_common::{is_dot_path, path_along, to_slash};

/// Seed entry points for timed propagation.
///
/// A seed is either a workspace path or a dotted operation name. A path
/// seed selects links whose source file lies under it; a dotted seed
/// selects links whose update script is the named operation or one nested
/// below it. Either way the link's source file must exist right now, so a
/// stale cache entry cannot start a propagation.
pub fn seed_indices(ctx: &WorkspaceContext, links: &[Link], seeds: &[String]) -> Vec<usize> {
    let mut seen: Vec<&str> = Vec::new();
    let mut path_seeds: Vec<&str> = Vec::new();
    let mut dot_seeds: Vec<String> = Vec::new();
    for seed in seeds {
        if seen.contains(&seed.as_str()) {
            continue;
        }
        seen.push(seed);
        if is_dot_path(seed) {
            dot_seeds.push(to_slash(seed));
        } else {
            path_seeds.push(seed);
        }
    }

    let mut out = Vec::new();
    for (i, link) in links.iter().enumerate() {
        if !ctx.fs().exists(&ctx.abs(&link.source_file)) {
            continue;
        }
        let by_path = path_seeds.iter().any(|s| path_along(&link.source_file, s));
        let by_op = link.update_script.as_deref().is_some_and(|script| {
            let slash = to_slash(script);
            dot_seeds.iter().any(|s| path_along(&slash, s))
        });
        if by_path || by_op {
            out.push(i);
        }
    }
    out
}

/// Seed entry points for pure reachability: containment in either
/// direction against the propagation column, no existence checks.
pub fn reach_seed_indices<'a>(
    links: &[Link],
    seeds: &[String],
    column: impl Fn(&Link) -> &str,
) -> Vec<usize> {
    links
        .iter()
        .enumerate()
        .filter(|(_, link)| {
            let v = column(link);
            seeds.iter().any(|s| path_along(v, s) || path_along(s, v))
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LayoutConfig;
    use crate::links::LinkKind;
    use tempfile::TempDir;

    fn link(kind: LinkKind, source: &str, source_file: &str, target: &str, script: &str) -> Link {
        Link {
            kind,
            source: source.to_string(),
            source_file: source_file.to_string(),
            target: target.to_string(),
            target_file: target.to_string(),
            update_script: Some(script.to_string()),
            update_script_file: Some("gen.flow".to_string()),
            is_fast: false,
        }
    }

    #[test]
    fn test_path_seed_needs_existing_source() {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        ctx.fs().write(&ctx.abs("src/raw.csv"), b"x").unwrap();
        let links = vec![
            link(LinkKind::DependsOn, "src/raw.csv", "src/raw.csv", "gen.build", "gen.build"),
            link(LinkKind::DependsOn, "src/gone.csv", "src/gone.csv", "gen.build", "gen.build"),
        ];
        assert_eq!(seed_indices(&ctx, &links, &["src".to_string()]), vec![0]);
    }

    #[test]
    fn test_dotted_seed_matches_update_script() {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        ctx.fs().write(&ctx.abs("gen.flow"), b"").unwrap();
        let links = vec![link(LinkKind::CreatedBy, "gen.build", "gen.flow", "out", "gen.build")];
        assert_eq!(seed_indices(&ctx, &links, &["gen.build".to_string()]), vec![0]);
        assert!(seed_indices(&ctx, &links, &["other.op".to_string()]).is_empty());
    }

    #[test]
    fn test_reach_seed_containment_both_ways() {
        let links = vec![
            link(LinkKind::CreatedBy, "gen.build", "gen.flow", "out/a", "gen.build"),
            link(LinkKind::CreatedBy, "gen.build", "gen.flow", "elsewhere", "gen.build"),
        ];
        let by_target = reach_seed_indices(&links, &["out".to_string()], |l| &l.target);
        assert_eq!(by_target, vec![0]);
        let inner = reach_seed_indices(&links, &["out/a/deep.txt".to_string()], |l| &l.target);
        assert_eq!(inner, vec![0]);
    }
}
