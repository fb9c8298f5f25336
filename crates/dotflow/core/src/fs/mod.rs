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

//! Filesystem facade.
//!
//! All engine code goes through the [`FileSystem`] trait so that mtime reads,
//! mtime bumps and quarantine moves stay in one place. [`StdFileSystem`] is
//! the only production implementation; tests use it against temp dirs.

mod facade;

pub use facade::{
    FileSystem, FsError, FsResult, StdFileSystem, recursive_files, recursive_mtime, trees_differ,
    write_atomic,
};
