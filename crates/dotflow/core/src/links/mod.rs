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

//! The dependency link graph and its on-disk cache.
//!
//! Links are extracted from scripts ([`extract`]), augmented with derived
//! containment links ([`derive`]) and cached incrementally ([`cache`]) so
//! that only scripts whose files changed are re-analyzed.

pub mod cache;
pub mod derive;
pub mod extract;
pub mod link;

pub use cache::LinkCache;
pub use derive::{TieBreak, dummy_links, implied_links};
pub use extract::compute_links;
pub use link::{Link, LinkKind, LinkQuery, NOT_EXISTS};
