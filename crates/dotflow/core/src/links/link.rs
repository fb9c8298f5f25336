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

use serde::{Deserialize, Serialize};

/// Placeholder source file for a use whose defining script cannot be found.
/// Such links stay in the cache so the source can be re-checked later, but
/// are filtered out of query results by default.
pub const NOT_EXISTS: &str = "NOTEXIST";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Target object is produced by the source operation.
    CreatedBy,
    /// Target operation declares the source object as an input.
    DependsOn,
    /// Target operation calls the source name.
    Uses,
    /// Derived: source creation contains the target path.
    Implied,
    /// Derived: a creation nested inside another operation's created
    /// directory; forces the inner script when the outer one reruns.
    Dummy,
}

/// One edge of the dependency graph. Propagation flows source to target.
///
/// `source`/`target` are object names (dotted operation names or data
/// paths); the `_file` fields locate them in the workspace. `update_script`
/// names the operation that regenerates the target, when one exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    pub kind: LinkKind,
    pub source: String,
    pub source_file: String,
    pub target: String,
    pub target_file: String,
    pub update_script: Option<String>,
    pub update_script_file: Option<String>,
    pub is_fast: bool,
}

/// What [`super::LinkCache::links_from_operations`] should include in its
/// result. Defaults match what update propagation wants: no derived links,
/// internal and existing sources only.
#[derive(Debug, Clone)]
pub struct LinkQuery {
    pub add_implied: bool,
    pub add_dummies: bool,
    /// Drop `Uses` links whose source file is outside the queried set.
    pub filter_internal: bool,
    /// Drop links with a [`NOT_EXISTS`] source file.
    pub filter_not_exists: bool,
    /// Ignore cached results and re-analyze every queried script.
    pub recompute: bool,
    pub tie_break: super::TieBreak,
}

impl Default for LinkQuery {
    fn default() -> Self {
        Self {
            add_implied: false,
            add_dummies: false,
            filter_internal: true,
            filter_not_exists: true,
            recompute: false,
            tie_break: super::TieBreak::MostRecentWins,
        }
    }
}
