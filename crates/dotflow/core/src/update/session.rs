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
use crate::fs::FsResult;
use std::path::PathBuf;
use tracing::warn;

const SSID_FILE: &str = "ssid";
const RUN_LOG: &str = "run.log";
const QUARANTINE_DIR: &str = "quarantine";

/// One update run's workspace under the temp dir.
///
/// Session ids are allocated through a comma-separated id file shared by
/// concurrent runs; each session gets its own directory holding the run log,
/// per-script logs and outputs, and the quarantine store for displaced
/// previous outputs. [`Session::release`] gives the id back.
pub struct Session {
    ctx: WorkspaceContext,
    id: u64,
    name: String,
    dir: PathBuf,
}

impl Session {
    pub fn begin(ctx: &WorkspaceContext) -> FsResult<Self> {
        let id = allocate_id(ctx)?;
        let name = id.to_string();
        let dir = ctx.tmp_dir().join(&name);
        ctx.fs().create_dir_all(&dir.join(QUARANTINE_DIR))?;
        let log = dir.join(RUN_LOG);
        if ctx.fs().exists(&log) {
            ctx.fs().remove(&log)?;
        }
        Ok(Self { ctx: ctx.clone(), id, name, dir })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(RUN_LOG)
    }

    /// Captured stdout/stderr of one script invocation.
    pub fn script_log(&self, script: &str) -> PathBuf {
        self.dir.join(format!("log_{script}"))
    }

    /// Where the invoked operation writes its run output payload.
    pub fn script_output(&self, script: &str) -> PathBuf {
        self.dir.join(format!("output_{script}.json"))
    }

    /// Quarantine location for a workspace target. Targets are flattened so
    /// every displaced output sits directly in the store.
    pub fn quarantine_path(&self, target: &str) -> PathBuf {
        let flat = target.trim_end_matches('/').replace('/', "__");
        self.dir.join(QUARANTINE_DIR).join(flat)
    }

    /// Append a line to the run log. Logging failures never fail the run.
    pub fn log_line(&self, line: &str) {
        let data = format!("{line}\n");
        if let Err(e) = self.ctx.fs().append(&self.log_path(), data.as_bytes()) {
            warn!(error = %e, "could not write to run log");
        }
    }

    /// Fold a finished script's captured output into the run log.
    pub fn absorb_script_log(&self, script: &str) {
        let path = self.script_log(script);
        match self.ctx.fs().read(&path) {
            Ok(data) if !data.is_empty() => {
                self.log_line(&format!("output of {script}:"));
                if let Err(e) = self.ctx.fs().append(&self.log_path(), &data) {
                    warn!(error = %e, "could not write to run log");
                }
            }
            _ => self.log_line(&format!("{script} wrote no output")),
        }
    }

    /// Give the session id back. The session directory is kept so the run
    /// log and quarantined outputs stay inspectable.
    pub fn release(self) {
        if let Err(e) = release_id(&self.ctx, self.id) {
            warn!(id = self.id, error = %e, "could not release session id");
        }
    }
}

fn ssid_path(ctx: &WorkspaceContext) -> PathBuf {
    ctx.tmp_dir().join(SSID_FILE)
}

fn read_ids(ctx: &WorkspaceContext) -> Vec<u64> {
    let Ok(data) = ctx.fs().read(&ssid_path(ctx)) else { return Vec::new() };
    let text = String::from_utf8_lossy(&data);
    text.trim()
        .trim_matches(',')
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

fn write_ids(ctx: &WorkspaceContext, ids: &[u64]) -> FsResult<()> {
    let text = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
    ctx.fs().write(&ssid_path(ctx), text.as_bytes())
}

fn allocate_id(ctx: &WorkspaceContext) -> FsResult<u64> {
    let mut ids = read_ids(ctx);
    let id = ids.iter().max().map_or(0, |m| m + 1);
    ids.push(id);
    write_ids(ctx, &ids)?;
    Ok(id)
}

fn release_id(ctx: &WorkspaceContext, id: u64) -> FsResult<()> {
    let ids: Vec<u64> = read_ids(ctx).into_iter().filter(|&i| i != id).collect();
    write_ids(ctx, &ids)
}
