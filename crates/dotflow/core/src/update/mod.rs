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

//! Automatic updating.
//!
//! [`Updater`] is the driver: it propagates staleness from a seed through
//! the current link graph and calls the stale scripts in dependency rounds.
//! [`Updater::full_update`] is the downstream style (push changes forward),
//! [`Updater::make_updated`] the upstream, make-like style (bring a target
//! up to date). Execution is pluggable through [`ExecutionBackend`];
//! [`DirectBackend`] runs scripts as local subprocesses.

pub mod backend;
pub mod created;
pub mod driver;
pub mod notify;
pub mod session;

pub use backend::{
    BackendError, DirectBackend, ExecutionBackend, Invocation, JobStatus, RunOutput, SpawnBackend,
};
pub use created::CreatedTimes;
pub use driver::{ExitType, ScriptOutcome, UpdateError, UpdateOptions, UpdateReport, Updater};
pub use notify::{NoopNotifier, Notifier, NotifyResult};
pub use session::Session;
