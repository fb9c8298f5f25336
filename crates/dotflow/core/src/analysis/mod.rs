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

//! Static analysis of scripts.
//!
//! Two layers: [`collect_uses`] walks a parsed module and records, per
//! scope, which dotted names it mentions and what the imports bind; then
//! [`full_uses`] checks those names against the workspace to decide which
//! script or directory each one actually refers to. The result feeds link
//! extraction, so a function that calls `tools.csv.load` ends up linked to
//! `tools/csv.flow` without declaring anything.

pub mod resolve;
pub mod uses;

pub use resolve::{ResolvedUses, full_uses};
pub use uses::{MODULE_SCOPE, UsesInfo, collect_uses};
