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

//! Checksummed cache artifacts.
//!
//! Every persisted cache file is `[crc32 LE][bincode payload]`. A failed
//! checksum or decode is never an error for callers: cache artifacts are
//! derived data, so the reader reports "absent" and the writer rebuilds.

use crate::fs::{FileSystem, FsResult, write_atomic};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::warn;

/// Frame a value as `[crc32 LE][bincode]`. `None` only on encoder failure,
/// which no serializable cache type produces in practice.
pub fn encode_blob<T: Serialize>(value: &T) -> Option<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(value, bincode::config::standard()).ok()?;
    let crc = crc32fast::hash(&payload);
    let mut framed = crc.to_le_bytes().to_vec();
    framed.extend_from_slice(&payload);
    Some(framed)
}

pub fn write_blob<T: Serialize>(fs: &dyn FileSystem, path: &Path, value: &T) -> FsResult<()> {
    match encode_blob(value) {
        Some(framed) => write_atomic(fs, path, &framed),
        None => {
            warn!(path = %path.display(), "failed to encode cache artifact");
            Ok(())
        }
    }
}

/// Read a checksummed artifact. `None` means absent or unusable; an
/// unusable file is removed so the next write starts clean.
pub fn read_blob<T: DeserializeOwned>(fs: &dyn FileSystem, path: &Path) -> Option<T> {
    if !fs.is_file(path) {
        return None;
    }
    let bytes = fs.read(path).ok()?;
    let parsed = decode_blob(&bytes);
    if parsed.is_none() {
        warn!(path = %path.display(), "discarding corrupt cache artifact");
        let _ = fs.remove(path);
    }
    parsed
}

/// Decode a framed blob, `None` on any checksum or shape mismatch.
pub fn decode_blob<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    if bytes.len() < 4 {
        return None;
    }
    let stored = u32::from_le_bytes(bytes[..4].try_into().ok()?);
    let payload = &bytes[4..];
    if crc32fast::hash(payload) != stored {
        return None;
    }
    bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .ok()
        .map(|(v, _)| v)
}
