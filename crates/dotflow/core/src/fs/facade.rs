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

use dotflow_common::time_to_nanos;
use filetime::FileTime;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

pub type FsResult<T> = Result<T, FsError>;

/// Minimal filesystem surface the engine needs. All paths are absolute.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> FsResult<Vec<u8>>;
    fn write(&self, path: &Path, data: &[u8]) -> FsResult<()>;
    fn append(&self, path: &Path, data: &[u8]) -> FsResult<()>;
    /// Entry names (not full paths) of a directory, sorted.
    fn list(&self, path: &Path) -> FsResult<Vec<String>>;
    /// Modification time in epoch nanoseconds.
    fn mtime(&self, path: &Path) -> FsResult<u64>;
    fn set_mtime(&self, path: &Path, nanos: u64) -> FsResult<()>;
    fn rename(&self, from: &Path, to: &Path) -> FsResult<()>;
    /// Remove a file, or a directory together with its contents.
    fn remove(&self, path: &Path) -> FsResult<()>;
    fn create_dir_all(&self, path: &Path) -> FsResult<()>;
}

/// Production implementation backed by `std::fs`.
#[derive(Debug, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read(&self, path: &Path) -> FsResult<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn write(&self, path: &Path, data: &[u8]) -> FsResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(fs::write(path, data)?)
    }

    fn append(&self, path: &Path, data: &[u8]) -> FsResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
        f.write_all(data)?;
        Ok(())
    }

    fn list(&self, path: &Path) -> FsResult<Vec<String>> {
        if !path.is_dir() {
            return Err(FsError::NotADirectory(path.to_path_buf()));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn mtime(&self, path: &Path) -> FsResult<u64> {
        let meta = fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            _ => FsError::Io(e),
        })?;
        Ok(time_to_nanos(meta.modified()?))
    }

    fn set_mtime(&self, path: &Path, nanos: u64) -> FsResult<()> {
        let ft = FileTime::from_unix_time((nanos / 1_000_000_000) as i64, (nanos % 1_000_000_000) as u32);
        filetime::set_file_mtime(path, ft)?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(fs::rename(from, to)?)
    }

    fn remove(&self, path: &Path) -> FsResult<()> {
        if path.is_dir() {
            Ok(fs::remove_dir_all(path)?)
        } else {
            Ok(fs::remove_file(path)?)
        }
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        Ok(fs::create_dir_all(path)?)
    }
}

/// Write via a sibling temp file and rename so readers never observe a
/// half-written artifact.
pub fn write_atomic(fs: &dyn FileSystem, path: &Path, data: &[u8]) -> FsResult<()> {
    let tmp = path.with_extension("tmp");
    fs.write(&tmp, data)?;
    fs.rename(&tmp, path)
}

/// Latest mtime anywhere in the tree rooted at `path`, the path itself
/// included. `None` if nothing exists there.
pub fn recursive_mtime(fs: &dyn FileSystem, path: &Path) -> Option<u64> {
    if !fs.exists(path) {
        return None;
    }
    let mut latest = fs.mtime(path).ok()?;
    if fs.is_dir(path) {
        if let Ok(names) = fs.list(path) {
            for name in names {
                if let Some(m) = recursive_mtime(fs, &path.join(name)) {
                    latest = latest.max(m);
                }
            }
        }
    }
    Some(latest)
}

/// All regular files under `path`, depth first, sorted within each level.
pub fn recursive_files(fs: &dyn FileSystem, path: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if fs.is_file(path) {
        out.push(path.to_path_buf());
    } else if fs.is_dir(path) {
        if let Ok(names) = fs.list(path) {
            for name in names {
                out.extend(recursive_files(fs, &path.join(name)));
            }
        }
    }
    out
}

/// Content comparison of two paths. Files differ when their bytes differ;
/// directories differ when their entry sets differ or any shared entry does.
/// A missing side always differs from a present one.
pub fn trees_differ(fs: &dyn FileSystem, a: &Path, b: &Path) -> bool {
    match (fs.exists(a), fs.exists(b)) {
        (false, false) => return false,
        (true, true) => {}
        _ => return true,
    }
    match (fs.is_dir(a), fs.is_dir(b)) {
        (false, false) => {
            let ca = fs.read(a).ok();
            let cb = fs.read(b).ok();
            ca != cb
        }
        (true, true) => {
            let la = fs.list(a).unwrap_or_default();
            let lb = fs.list(b).unwrap_or_default();
            if la != lb {
                return true;
            }
            la.iter().any(|name| trees_differ(fs, &a.join(name), &b.join(name)))
        }
        _ => true,
    }
}
