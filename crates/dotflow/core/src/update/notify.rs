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

use std::path::Path;

pub type NotifyResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Completion hook invoked once per finished run with the session name and
/// the path of the captured run log. Failures are logged by the caller and
/// never abort an update.
pub trait Notifier: Send + Sync {
    fn run_finished(&self, session: &str, log_path: &Path) -> NotifyResult;
}

/// Default hook that does nothing.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn run_finished(&self, _session: &str, _log_path: &Path) -> NotifyResult {
        Ok(())
    }
}
