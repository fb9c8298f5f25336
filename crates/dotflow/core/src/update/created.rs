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

use crate::context::WorkspaceContext;
use crate::graph::CreatedTimeSource;
use crate::store::blob::{read_blob, write_blob};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

const CREATED_FILE: &str = "created.bin";

/// Last-successful-creation stamps per target, recorded by the driver after
/// a verified run and read back by the propagator's protect-computed mode.
/// A target with no entry has never been built through the engine.
#[derive(Debug, Default)]
pub struct CreatedTimes {
    times: BTreeMap<String, u64>,
    dirty: bool,
}

impl CreatedTimes {
    pub fn load(ctx: &WorkspaceContext) -> Self {
        let times = read_blob(ctx.fs(), &Self::path(ctx)).unwrap_or_default();
        Self { times, dirty: false }
    }

    fn path(ctx: &WorkspaceContext) -> PathBuf {
        ctx.links_dir().join(CREATED_FILE)
    }

    pub fn record(&mut self, target: &str, nanos: u64) {
        self.times.insert(target.to_string(), nanos);
        self.dirty = true;
    }

    pub fn forget(&mut self, target: &str) {
        if self.times.remove(target).is_some() {
            self.dirty = true;
        }
    }

    pub fn persist(&mut self, ctx: &WorkspaceContext) {
        if !self.dirty {
            return;
        }
        if let Err(e) = write_blob(ctx.fs(), &Self::path(ctx), &self.times) {
            warn!(error = %e, "could not persist creation times");
        } else {
            self.dirty = false;
        }
    }
}

impl CreatedTimeSource for CreatedTimes {
    fn created_time(&self, target: &str) -> Option<u64> {
        self.times.get(target).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LayoutConfig;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_through_disk() {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();

        let mut times = CreatedTimes::load(&ctx);
        assert_eq!(times.created_time("out/data"), None);
        times.record("out/data", 42);
        times.persist(&ctx);

        let reloaded = CreatedTimes::load(&ctx);
        assert_eq!(reloaded.created_time("out/data"), Some(42));
    }

    #[test]
    fn test_forget_removes_entry() {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();

        let mut times = CreatedTimes::load(&ctx);
        times.record("out/data", 7);
        times.forget("out/data");
        times.persist(&ctx);

        let reloaded = CreatedTimes::load(&ctx);
        assert_eq!(reloaded.created_time("out/data"), None);
    }
}
