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

//! Propagation timestamps.
//!
//! A stamp entering a link is either a concrete modification time or the
//! `Forced` sentinel, which taints everything downstream regardless of how
//! fresh the targets look. `Forced` is absorbing under [`Stamp::join`] and
//! never satisfies an up-to-date comparison.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch.
pub fn now_nanos() -> u64 {
    time_to_nanos(SystemTime::now())
}

/// Convert a `SystemTime` to epoch nanoseconds, saturating at zero for
/// pre-epoch times.
pub fn time_to_nanos(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// A modification stamp flowing through the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stamp {
    /// Unconditional trigger. Targets downstream of a forced stamp are
    /// rebuilt no matter their recorded times.
    Forced,
    /// A concrete time in epoch nanoseconds.
    At(u64),
}

impl Stamp {
    /// Combine two incoming stamps: `Forced` dominates, otherwise the later
    /// time wins.
    pub fn join(self, other: Stamp) -> Stamp {
        match (self, other) {
            (Stamp::Forced, _) | (_, Stamp::Forced) => Stamp::Forced,
            (Stamp::At(a), Stamp::At(b)) => Stamp::At(a.max(b)),
        }
    }

    /// True only when this stamp is a concrete time no later than `nanos`.
    /// `Forced` is never "old enough".
    pub fn at_or_before(self, nanos: u64) -> bool {
        match self {
            Stamp::Forced => false,
            Stamp::At(t) => t <= nanos,
        }
    }

    pub fn is_forced(self) -> bool {
        matches!(self, Stamp::Forced)
    }

    /// The concrete time, if any.
    pub fn nanos(self) -> Option<u64> {
        match self {
            Stamp::Forced => None,
            Stamp::At(t) => Some(t),
        }
    }
}

/// Epoch seconds rendered for archive file suffixes.
pub fn epoch_seconds_label(nanos: u64) -> String {
    format!("{}", nanos / 1_000_000_000)
}
