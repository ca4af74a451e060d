// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexGrains.
//
// PlexGrains is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexGrains is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexGrains. If not, see <https://www.gnu.org/licenses/>.

//! Runtime configuration knobs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a grain node
///
/// All fields have production defaults; deserializing an empty document
/// yields the same configuration as `RuntimeConfig::default()`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Per-key pending-job depth; offers beyond this are refused
    pub max_queue_size: usize,
    /// Period of the idle-activation eviction scan, in milliseconds
    pub cleanup_interval_millis: u64,
    /// How long an activation may sit untouched before eviction, in milliseconds
    pub idle_ttl_millis: u64,
    /// Upper bound on concurrently running jobs
    pub executor_width: usize,
    /// Period of the messenger pending-call timeout sweep, in milliseconds
    pub message_sweep_millis: u64,
    /// Fire pre/post invoke listener notifications on outbound calls
    pub trace_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10_000,
            cleanup_interval_millis: 5 * 60 * 1_000,
            idle_ttl_millis: 10 * 60 * 1_000,
            executor_width: 1_000,
            message_sweep_millis: 5_000,
            trace_enabled: false,
        }
    }
}

impl RuntimeConfig {
    /// Eviction scan period as a `Duration`
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_millis)
    }

    /// Idle TTL as a `Duration`
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_millis(self.idle_ttl_millis)
    }

    /// Messenger timeout sweep period as a `Duration`
    pub fn message_sweep(&self) -> Duration {
        Duration::from_millis(self.message_sweep_millis)
    }
}
