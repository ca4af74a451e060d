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

//! Per-grain timers and idle eviction
//!
//! ## Purpose
//! `register_timer` schedules a repeating callback that runs under the
//! grain's serializer slot, so ticks never overlap the grain's message
//! handling. Cancellation is cooperative: a tick already queued may still
//! run once and observe the flag.
//!
//! `evict_idle` is the periodic scan that retires activations untouched
//! for longer than the idle TTL. Cleanup runs as a serializer job under the
//! entry's identity, so it cannot overlap in-flight messages for that
//! grain. Singleton entries are removed outright; stateless-worker pools
//! are walked, rotating still-warm activations to the tail and dropping
//! cold ones, and the entry itself is retained so the pool can refill.

use crate::node::GrainNode;
use crate::registry::{ActivationFlavor, ReferenceEntry};
use futures::future::BoxFuture;
use plexgrains_core::{with_runtime, GrainIdentity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Pending-tick bound for timer jobs; far smaller than the inbound queue
/// since a backlog of ticks means the grain is already drowning
const TIMER_QUEUE_DEPTH: usize = 1_000;

/// A repeating timer callback
pub type TimerCallback = Arc<
    dyn Fn() -> BoxFuture<'static, Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + Sync,
>;

/// Cancellation handle returned by `register_timer`
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer; a tick already queued may still run once and
    /// observe the flag
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl GrainNode {
    /// Schedule `callback` to run under `identity`'s serializer slot after
    /// `due`, then every `period`
    pub fn register_timer(
        self: &Arc<Self>,
        identity: GrainIdentity,
        callback: TimerCallback,
        due: Duration,
        period: Duration,
    ) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let node = Arc::clone(self);
        let flag = Arc::clone(&cancelled);
        let task = tokio::spawn(async move {
            tokio::time::sleep(due).await;
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let tick_callback = Arc::clone(&callback);
                let tick_flag = Arc::clone(&flag);
                let tick_runtime = node.context_weak();
                node.serializer.offer(
                    Some(identity.clone()),
                    move || {
                        Box::pin(with_runtime(tick_runtime, async move {
                            if tick_flag.load(Ordering::SeqCst) {
                                return;
                            }
                            if let Err(err) = tick_callback().await {
                                tracing::warn!("error calling timer: {err}");
                            }
                        }))
                    },
                    TIMER_QUEUE_DEPTH,
                );
                ticker.tick().await;
            }
        });
        TimerHandle { cancelled, task }
    }

    /// Scan for idle activations and retire them
    ///
    /// `block` waits for every enqueued cleanup job to finish; the periodic
    /// background scan blocks so overlapping scans cannot pile up.
    pub async fn evict_idle(self: &Arc<Self>, block: bool) {
        let cutoff = self.clock.millis() - self.config.idle_ttl_millis as i64;
        let mut completions = Vec::new();
        for (identity, entry) in self.activations.snapshot() {
            if !entry.is_removable() {
                continue;
            }
            let Some(oldest) = entry.oldest_access() else {
                continue;
            };
            if oldest >= cutoff {
                continue;
            }
            let (done_tx, done_rx) = oneshot::channel::<()>();
            let node = Arc::clone(self);
            let job_entry = Arc::clone(&entry);
            let job_identity = identity.clone();
            let offered = self.serializer.offer(
                Some(identity),
                move || {
                    Box::pin(async move {
                        node.cleanup_entry(job_identity, job_entry, cutoff).await;
                        let _ = done_tx.send(());
                    })
                },
                self.config.max_queue_size,
            );
            if offered && block {
                completions.push(done_rx);
            }
        }
        if block {
            for done in completions {
                let _ = done.await;
            }
        }
    }

    /// Cleanup job body; runs under the entry's serializer slot
    async fn cleanup_entry(
        self: Arc<Self>,
        identity: GrainIdentity,
        entry: Arc<ReferenceEntry>,
        cutoff: i64,
    ) {
        match self.activations.get(&identity) {
            Some(current) if Arc::ptr_eq(&current, &entry) => {}
            _ => {
                // should not be possible: cleanup is serialized with every
                // path that replaces entries
                tracing::warn!(identity = %identity, "activation entry changed during cleanup");
                return;
            }
        }
        let runtime = self.context_weak();
        with_runtime(runtime, async {
            match entry.flavor() {
                ActivationFlavor::Singleton => {
                    let mut activation = entry.check_out(self.clock.millis());
                    if activation.has_instance() && activation.last_access() >= cutoff {
                        // touched while the cleanup job sat in the queue
                        entry.check_in(activation);
                        return;
                    }
                    if activation.has_instance() {
                        self.lifecycle
                            .deactivate(entry.reference(), &mut activation)
                            .await;
                    }
                    self.activations.remove_if_same(&identity, &entry);
                }
                ActivationFlavor::StatelessWorker => {
                    let count = entry.held_activations();
                    for _ in 0..count {
                        let Some(mut activation) = entry.pop_oldest() else {
                            break;
                        };
                        if activation.last_access() >= cutoff {
                            entry.check_in(activation);
                        } else {
                            self.lifecycle
                                .deactivate(entry.reference(), &mut activation)
                                .await;
                        }
                    }
                }
            }
        })
        .await;
    }
}
