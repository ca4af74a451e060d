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

//! Pluggable time source
//!
//! Activation idle tracking compares wall-clock milliseconds, and the idle
//! eviction tests need to advance time without sleeping, so the runtime
//! reads time through a trait instead of calling `Utc::now()` directly.

use std::sync::atomic::{AtomicI64, Ordering};

/// Wall-clock time source used for activation `last_access` stamps and
/// eviction cutoffs
pub trait RuntimeClock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn millis(&self) -> i64;
}

/// The real clock (chrono UTC)
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl RuntimeClock for SystemClock {
    fn millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A hand-driven clock for tests
///
/// Starts at an arbitrary epoch and only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock pinned at `start_millis`
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// Move the clock forward by `millis`
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Pin the clock at an absolute value
    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl RuntimeClock for ManualClock {
    fn millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.millis(), 1_000);
        clock.advance(250);
        assert_eq!(clock.millis(), 1_250);
        clock.set(5);
        assert_eq!(clock.millis(), 5);
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.millis();
        let b = clock.millis();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000); // after 2020
    }
}
