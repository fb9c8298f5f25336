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

//! Per-script operation stores.
//!
//! Staleness is tracked per operation, not per file: editing one function in
//! a script must not mark the whole script's outputs stale. Each script gets
//! a store holding a structural fingerprint and a modification time for every
//! top-level part, refreshed against the script file on access.

pub mod blob;
pub mod module_store;
pub mod part;

pub use module_store::{ModuleRecord, OperationStore};
pub use part::{DeclaredMeta, Fingerprint, PartKind, StoredPart};
