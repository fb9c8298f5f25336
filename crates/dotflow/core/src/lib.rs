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

//! Dotflow dependency engine
//!
//! Dotflow keeps a workspace of data and the scripts that produce it
//! consistent. Scripts declare what they depend on, create and use; the
//! engine extracts a link graph from those declarations, tracks staleness
//! per operation through structural fingerprints, propagates modification
//! stamps through the graph and re-runs exactly the scripts whose outputs
//! are out of date.
//!
//! The layers, bottom up:
//! - [`fs`]: the filesystem facade everything calls through.
//! - [`context`]: workspace layout and cache locations.
//! - [`script`]: the script language lexer, parser and AST.
//! - [`store`]: per-script operation stores with fingerprints and times.
//! - [`analysis`]: name-use extraction and resolution to files.
//! - [`links`]: link extraction, derived links and the on-disk link cache.
//! - [`graph`]: timed and pure-reachability propagation.
//! - [`update`]: the driver that actually calls scripts.

pub mod analysis;
pub mod context;
pub mod fs;
pub mod graph;
pub mod links;
pub mod script;
pub mod store;
pub mod update;

pub use context::{LayoutConfig, WorkspaceContext};
pub use update::{UpdateOptions, UpdateReport, Updater};
