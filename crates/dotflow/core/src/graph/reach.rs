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

use super::seed::reach_seed_indices;
use crate::links::{Link, LinkKind};
use dotflow_common::path_along;
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Source to target.
    Down,
    /// Target to source.
    Up,
}

/// Pure reachability through the link graph, ignoring timestamps.
///
/// Returns rounds of link indices: round 0 is the seed matches, each later
/// round the links reachable from the previous one by exact name match or,
/// around `CreatedBy` links, by path containment in either direction. A
/// cycle stops propagation with the rounds completed so far.
pub fn propagate_reach<'a>(
    links: &'a [Link],
    seeds: &[String],
    direction: Direction,
) -> Vec<Vec<usize>> {
    let from = |l: &'a Link| -> &'a str {
        match direction {
            Direction::Down => &l.source,
            Direction::Up => &l.target,
        }
    };
    let to = |l: &'a Link| -> &'a str {
        match direction {
            Direction::Down => &l.target,
            Direction::Up => &l.source,
        }
    };

    let mut current: Vec<usize> = match direction {
        Direction::Down => reach_seed_indices(links, seeds, |l| &l.source),
        Direction::Up => reach_seed_indices(links, seeds, |l| &l.target),
    };
    if current.is_empty() {
        return Vec::new();
    }

    let mut rounds: Vec<Vec<usize>> = vec![current.clone()];
    let mut previous_sets: Vec<BTreeSet<usize>> = vec![current.iter().copied().collect()];

    loop {
        let reached: Vec<(&str, bool)> =
            current.iter().map(|&i| (to(&links[i]), links[i].kind == LinkKind::CreatedBy)).collect();
        let mut next: Vec<usize> = Vec::new();
        for (j, link) in links.iter().enumerate() {
            let v = from(link);
            let hit = reached.iter().any(|(t, is_create)| {
                *t == v || (*is_create && (path_along(v, t) || path_along(t, v)))
            });
            if hit && !next.contains(&j) {
                next.push(j);
            }
        }
        if next.is_empty() {
            return rounds;
        }
        let next_set: BTreeSet<usize> = next.iter().copied().collect();
        if previous_sets.iter().any(|p| p.is_subset(&next_set)) {
            let scripts: BTreeSet<&str> =
                next.iter().filter_map(|&i| links[i].update_script.as_deref()).collect();
            warn!(scripts = ?scripts, "link graph cycle detected, reachability stopped");
            return rounds;
        }
        previous_sets.push(next_set);
        rounds.push(next.clone());
        current = next;
    }
}
