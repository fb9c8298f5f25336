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

//! Workspace layout and context.
//!
//! A workspace is a directory tree of `.flow` scripts and their data files.
//! Engine state lives under a single hidden cache directory at the root:
//!
//! ```text
//! <root>/.dotflow/
//!     links/      link cache artifacts and created-time records
//!     modules/    per-script operation stores
//!     tmp/        session scratch, quarantine and logs
//!     archive/    replaced outputs, timestamped
//! ```

use crate::fs::{FileSystem, FsResult, StdFileSystem};
use dotflow_common::is_script_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Names of the cache directory and its subdirectories. Defaults are what
/// every workspace uses; tests occasionally relocate the cache.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Workspace root. All script and data paths are relative to this.
    pub root: PathBuf,
    /// Cache directory name under the root.
    pub cache_dir: String,
    pub links_subdir: String,
    pub modules_subdir: String,
    pub tmp_subdir: String,
    pub archive_subdir: String,
    /// Command used to execute a script, invoked as `<runner> <script-file>`.
    pub runner: String,
}

impl LayoutConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_dir: ".dotflow".to_string(),
            links_subdir: "links".to_string(),
            modules_subdir: "modules".to_string(),
            tmp_subdir: "tmp".to_string(),
            archive_subdir: "archive".to_string(),
            runner: "flow".to_string(),
        }
    }
}

/// Shared handle to a workspace: its layout plus the filesystem it lives on.
#[derive(Clone)]
pub struct WorkspaceContext {
    config: Arc<LayoutConfig>,
    fs: Arc<dyn FileSystem>,
}

impl WorkspaceContext {
    /// Open the workspace at `config.root`, creating the cache directories.
    pub fn new(config: LayoutConfig) -> FsResult<Self> {
        Self::with_fs(config, Arc::new(StdFileSystem))
    }

    pub fn with_fs(config: LayoutConfig, fs: Arc<dyn FileSystem>) -> FsResult<Self> {
        let ctx = Self { config: Arc::new(config), fs };
        for dir in [ctx.links_dir(), ctx.modules_dir(), ctx.tmp_dir(), ctx.archive_dir()] {
            ctx.fs.create_dir_all(&dir)?;
        }
        Ok(ctx)
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Absolute path of a workspace-relative slash path.
    pub fn abs(&self, rel: &str) -> PathBuf {
        self.config.root.join(rel)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config.root.join(&self.config.cache_dir)
    }

    pub fn links_dir(&self) -> PathBuf {
        self.cache_dir().join(&self.config.links_subdir)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.cache_dir().join(&self.config.modules_subdir)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.cache_dir().join(&self.config.tmp_subdir)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.cache_dir().join(&self.config.archive_subdir)
    }

    /// Cache directory for one script's operation store. The script path is
    /// flattened so that every store sits directly under `modules/`.
    pub fn module_cache_dir(&self, script: &str) -> PathBuf {
        self.modules_dir().join(script.replace('/', "__"))
    }

    /// All script files currently in the workspace, as relative slash paths,
    /// sorted. The cache directory is never scanned.
    pub fn live_scripts(&self) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_scripts("", &mut found);
        found.sort();
        found
    }

    fn collect_scripts(&self, rel: &str, out: &mut Vec<String>) {
        let dir = if rel.is_empty() { self.config.root.clone() } else { self.abs(rel) };
        let Ok(names) = self.fs.list(&dir) else { return };
        for name in names {
            if rel.is_empty() && name == self.config.cache_dir {
                continue;
            }
            let child_rel = if rel.is_empty() { name.clone() } else { format!("{rel}/{name}") };
            let child_abs = dir.join(&name);
            if self.fs.is_dir(&child_abs) {
                self.collect_scripts(&child_rel, out);
            } else if is_script_path(&child_rel) {
                out.push(child_rel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_created() {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        assert!(ctx.links_dir().is_dir());
        assert!(ctx.modules_dir().is_dir());
        assert!(ctx.tmp_dir().is_dir());
        assert!(ctx.archive_dir().is_dir());
    }

    #[test]
    fn test_live_scripts_skips_cache() {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        let fs = ctx.fs();
        fs.write(&ctx.abs("gen.flow"), b"").unwrap();
        fs.write(&ctx.abs("stats/daily.flow"), b"").unwrap();
        fs.write(&ctx.abs("notes.txt"), b"").unwrap();
        fs.write(&ctx.cache_dir().join("stray.flow"), b"").unwrap();
        assert_eq!(ctx.live_scripts(), vec!["gen.flow", "stats/daily.flow"]);
    }

    #[test]
    fn test_module_cache_dir_flattens() {
        let dir = TempDir::new().unwrap();
        let ctx = WorkspaceContext::new(LayoutConfig::new(dir.path())).unwrap();
        let p = ctx.module_cache_dir("stats/daily.flow");
        assert!(p.ends_with("modules/stats__daily.flow"));
    }
}
