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

//! Path containment tests on workspace-relative slash paths.
//!
//! Containment ("along") is the central relation of the link graph: creating
//! a directory implicitly touches everything logically inside it, so the
//! propagator constantly asks whether one path lies within another.

/// Returns `path` with exactly one trailing `/`.
pub fn with_trailing_slash(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    format!("{trimmed}/")
}

/// Strip a leading `./` and any trailing `/` so that equal paths compare
/// equal regardless of how the caller spelled them.
pub fn normalize(path: &str) -> String {
    let p = path.strip_prefix("./").unwrap_or(path);
    p.trim_end_matches('/').to_string()
}

/// True if `child` is `parent` or lies below it in the component sense.
/// `out/a/b` is along `out/a` and along `out`, but not along `ou`.
pub fn path_along(child: &str, parent: &str) -> bool {
    let c = normalize(child);
    let p = normalize(parent);
    c == p || c.starts_with(&with_trailing_slash(&p))
}

/// Containment excluding equality.
pub fn strictly_along(child: &str, parent: &str) -> bool {
    let c = normalize(child);
    let p = normalize(parent);
    c != p && c.starts_with(&with_trailing_slash(&p))
}

/// The portion of `child` below `parent`, if `child` is strictly along it.
pub fn suffix_below(child: &str, parent: &str) -> Option<String> {
    let c = normalize(child);
    let p = with_trailing_slash(&normalize(parent));
    c.strip_prefix(&p).map(str::to_string)
}

/// Parent directory of a path, if any.
pub fn dirname(path: &str) -> Option<String> {
    let p = normalize(path);
    p.rfind('/').map(|i| p[..i].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_along() {
        assert!(path_along("out/a/b.txt", "out/a"));
        assert!(path_along("out/a", "out/a"));
        assert!(path_along("out/a", "out/a/"));
        assert!(!path_along("out/ab", "out/a"));
        assert!(!path_along("out", "out/a"));
    }

    #[test]
    fn test_strictly_along() {
        assert!(strictly_along("out/a/b", "out/a"));
        assert!(!strictly_along("out/a", "out/a"));
    }

    #[test]
    fn test_suffix_below() {
        assert_eq!(suffix_below("out/a/b.txt", "out/a").as_deref(), Some("b.txt"));
        assert_eq!(suffix_below("out/a", "out/a"), None);
    }

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("out/a/b.txt").as_deref(), Some("out/a"));
        assert_eq!(dirname("gen.flow"), None);
    }
}
