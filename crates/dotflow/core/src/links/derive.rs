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

//! Derived links.
//!
//! Neither kind is written by users. Implied links record that creating a
//! path touches everything inside it; dummy links record that an operation
//! creating inside another operation's created directory must rerun when
//! the outer directory is rebuilt.
//!
//! Both functions are incremental: given links being added and the links
//! already present, they produce only the derived links the addition
//! introduces. Called with a deletion set against the full previous graph,
//! the same functions produce the derived links to retire.

use super::link::{Link, LinkKind};
use dotflow_common::{strictly_along, path_along, with_trailing_slash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What happens when one script creates a path inside a tree that the same
/// schedule also creates. [`TieBreak::MostRecentWins`] keeps only the
/// outermost creation per script when deriving dummies, so a directory
/// rebuild is not also triggered by every nested create it performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreak {
    MostRecentWins,
    KeepAll,
}

/// Implied links introduced by adding `new` to `existing`.
pub fn implied_links(new: &[Link], existing: &[Link]) -> Vec<Link> {
    if new.is_empty() {
        return Vec::new();
    }
    let all: Vec<&Link> = new.iter().chain(existing).collect();
    let new_refs: Vec<&Link> = new.iter().collect();

    let mut out: BTreeSet<Link> = BTreeSet::new();
    for (endpoints_of, creators_of) in [(&new_refs, &all), (&all, &new_refs)] {
        let creators: BTreeSet<(&str, &str, Option<&str>, Option<&str>)> = creators_of
            .iter()
            .filter(|l| l.kind == LinkKind::CreatedBy)
            .map(|l| {
                (
                    l.target.as_str(),
                    l.target_file.as_str(),
                    l.update_script.as_deref(),
                    l.update_script_file.as_deref(),
                )
            })
            .collect();
        let endpoints: BTreeSet<(&str, &str)> = endpoints_of
            .iter()
            .flat_map(|l| {
                [
                    (l.source.as_str(), l.source_file.as_str()),
                    (l.target.as_str(), l.target_file.as_str()),
                ]
            })
            .collect();

        for (obj, obj_file, script, script_file) in &creators {
            for (end, end_file) in &endpoints {
                if path_along(end_file, obj_file) {
                    out.insert(Link {
                        kind: LinkKind::Implied,
                        source: obj.to_string(),
                        source_file: obj_file.to_string(),
                        target: end.to_string(),
                        target_file: end_file.to_string(),
                        update_script: script.map(str::to_string),
                        update_script_file: script_file.map(str::to_string),
                        is_fast: false,
                    });
                }
            }
        }
    }
    out.into_iter()
        .filter(|l| with_trailing_slash(&l.source) != with_trailing_slash(&l.target))
        .collect()
}

/// Dummy links introduced by adding `new` to `existing`.
pub fn dummy_links(new: &[Link], existing: &[Link], tie: TieBreak) -> Vec<Link> {
    let new_c: Vec<&Link> = new.iter().filter(|l| l.kind == LinkKind::CreatedBy).collect();
    if new_c.is_empty() {
        return Vec::new();
    }
    let total_c: Vec<&Link> = new
        .iter()
        .chain(existing)
        .filter(|l| l.kind == LinkKind::CreatedBy)
        .collect();

    let mut out: BTreeSet<Link> = BTreeSet::new();
    for (inner_of, outer_of) in [(&new_c, &total_c), (&total_c, &new_c)] {
        let outers: BTreeSet<(&str, &str)> = outer_of
            .iter()
            .map(|l| (l.target.as_str(), l.target_file.as_str()))
            .collect();
        let mut inners: Vec<(&str, &str, Option<&str>, Option<&str>)> = inner_of
            .iter()
            .map(|l| {
                (
                    l.target.as_str(),
                    l.target_file.as_str(),
                    l.update_script.as_deref(),
                    l.update_script_file.as_deref(),
                )
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if tie == TieBreak::MostRecentWins {
            // Per script, drop creations nested inside another of its own
            // creations; only the outermost matters.
            let keys: Vec<String> = inners
                .iter()
                .map(|(_, tf, s, _)| format!("{} ; {}", s.unwrap_or("None"), tf))
                .collect();
            let nested: Vec<bool> = keys
                .iter()
                .map(|k| keys.iter().any(|other| strictly_along(k, other)))
                .collect();
            inners = inners
                .into_iter()
                .zip(nested)
                .filter(|(_, n)| !*n)
                .map(|(i, _)| i)
                .collect();
        }

        for (outer, outer_file) in &outers {
            for (inner, _inner_file, script, script_file) in &inners {
                if strictly_along(inner, outer) {
                    let Some(script) = script else { continue };
                    out.insert(Link {
                        kind: LinkKind::Dummy,
                        source: format!("{}dummy", with_trailing_slash(outer)),
                        source_file: format!("{}dummy", with_trailing_slash(outer_file)),
                        target: script.to_string(),
                        target_file: script_file.unwrap_or_default().to_string(),
                        update_script: None,
                        update_script_file: None,
                        is_fast: false,
                    });
                }
            }
        }
    }
    out.into_iter().filter(|l| l.source != l.target).collect()
}
