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

//! Round-based propagation through the link graph.
//!
//! Two propagators share the seeding logic: [`timed`] walks downstream
//! honoring modification stamps and only activates stale targets, while
//! [`reach`] ignores time entirely and reports plain reachability in
//! either direction. Both stop on cycles and return the rounds completed
//! so far.

pub mod reach;
pub mod seed;
pub mod timed;

pub use reach::{Direction, propagate_reach};
pub use seed::{reach_seed_indices, seed_indices};
pub use timed::{Activation, CreatedTimeSource, PropagateOptions, propagate_with_times};
