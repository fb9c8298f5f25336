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

//! Shared primitives for the dotflow engine
//!
//! Everything in here is about the three currencies the dependency engine
//! trades in: workspace-relative slash paths, dotted operation names, and
//! modification stamps. Higher layers (link extraction, graph propagation,
//! the update driver) all speak these types.

pub mod name;
pub mod pathing;
pub mod stamp;

pub use name::{
    SCRIPT_EXT, candidate_paths, is_dot_path, is_script_path, longest_existing_path, module_name,
    to_slash,
};
pub use pathing::{dirname, normalize, path_along, strictly_along, suffix_below, with_trailing_slash};
pub use stamp::{Stamp, epoch_seconds_label, now_nanos, time_to_nanos};
