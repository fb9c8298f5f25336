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

//! Dotted operation names and their mapping to script paths.
//!
//! Operations are addressed by dotted names (`stats.daily.make_report`) while
//! the filesystem speaks slash paths (`stats/daily.flow`). The convention is
//! fixed: the dotted name of a script is its workspace-relative path with the
//! extension dropped and `/` replaced by `.`; an operation name is the script
//! name plus one trailing segment.

/// File extension of pipeline scripts.
pub const SCRIPT_EXT: &str = "flow";

/// True if `name` looks like a dotted operation/module name rather than a
/// filesystem path: at least one dot, no slashes, identifier-like segments.
pub fn is_dot_path(name: &str) -> bool {
    if name.contains('/') || !name.contains('.') {
        return false;
    }
    name.split('.').all(|seg| {
        !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_')
    })
}

/// True if `path` names a pipeline script file.
pub fn is_script_path(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|f| f.ends_with(&format!(".{SCRIPT_EXT}")) && f.len() > SCRIPT_EXT.len() + 1)
}

/// Dotted module name of a script path, or `None` if the path is not a
/// script. `stats/daily.flow` -> `stats.daily`.
pub fn module_name(path: &str) -> Option<String> {
    if !is_script_path(path) {
        return None;
    }
    let stem = &path[..path.len() - SCRIPT_EXT.len() - 1];
    Some(stem.replace('/', "."))
}

/// Slash form of a dotted name: `a.b.c` -> `a/b/c`.
pub fn to_slash(dotted: &str) -> String {
    dotted.replace('.', "/")
}

/// Candidate script paths for a dotted name, shortest prefix first.
///
/// For `a.b.c` this yields `a.flow`, `a/b.flow` (every proper prefix; the
/// full name itself is not a candidate since the last segment names the
/// operation inside the script).
pub fn candidate_paths(dotted: &str) -> Vec<String> {
    let segs: Vec<&str> = dotted.split('.').collect();
    (1..segs.len()).map(|j| format!("{}.{}", segs[..j].join("/"), SCRIPT_EXT)).collect()
}

/// Longest candidate script path of `dotted` for which `exists` holds.
pub fn longest_existing_path<F>(dotted: &str, exists: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    candidate_paths(dotted).into_iter().rev().find(|p| exists(p))
}
