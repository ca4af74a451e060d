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

//! Per-key execution serializer
//!
//! ## Purpose
//! Guarantees that jobs sharing a key never overlap and run in enqueue
//! order, while distinct keys run in parallel up to the executor width.
//! This is what turns concurrent inbound traffic into single-threaded grain
//! execution: the inbound dispatcher keys jobs by grain identity.
//!
//! ## Design
//! One map entry per active key holding a FIFO of pending jobs. The first
//! offer for a key installs the entry and spawns a drain task; the drain
//! pops and awaits jobs one at a time and removes the entry when the queue
//! runs dry. Offers against a full queue are refused, which is the node's
//! back-pressure signal. A `None` key means "no ordering required" and runs
//! straight on the executor.
//!
//! Jobs must not block on other jobs for the same key, or the drain
//! deadlocks by construction.

use futures::future::BoxFuture;
use futures::FutureExt;
use plexgrains_core::GrainIdentity;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// A unit of work: invoked once, yields the job's future
pub type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

/// Width-bounded task spawner shared by the serializer and the node
///
/// Spawning is plain `tokio::spawn`; the width bound is enforced by a
/// semaphore permit held for the duration of each job.
#[derive(Clone)]
pub struct TaskExecutor {
    permits: Arc<Semaphore>,
}

impl TaskExecutor {
    /// Create an executor admitting at most `width` concurrent jobs
    pub fn new(width: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(width)),
        }
    }

    /// Spawn a task on the runtime (not width-gated; used for drains and
    /// background loops)
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(fut)
    }

    pub(crate) async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        self.permits.clone().acquire_owned().await.ok()
    }
}

/// Per-key FIFO job queues with bounded depth
pub struct ExecutionSerializer {
    executor: TaskExecutor,
    queues: Arc<Mutex<HashMap<GrainIdentity, VecDeque<Job>>>>,
}

impl ExecutionSerializer {
    /// Create a serializer running jobs on `executor`
    pub fn new(executor: TaskExecutor) -> Self {
        Self {
            executor,
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The executor jobs run on
    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// Offer a job for `key`
    ///
    /// Returns `false` without enqueuing when the key's pending queue is at
    /// `max_depth`. A `None` key always runs (directly on the executor, no
    /// ordering). The job currently running for a key does not count
    /// against the depth; only jobs still waiting do.
    pub fn offer<F>(&self, key: Option<GrainIdentity>, job: F, max_depth: usize) -> bool
    where
        F: FnOnce() -> BoxFuture<'static, ()> + Send + 'static,
    {
        let Some(key) = key else {
            let executor = self.executor.clone();
            self.executor.spawn(async move {
                let _permit = executor.admit().await;
                run_guarded(None, job()).await;
            });
            return true;
        };

        {
            let mut queues = lock_queues(&self.queues);
            if let Some(pending) = queues.get_mut(&key) {
                if pending.len() >= max_depth {
                    return false;
                }
                pending.push_back(Box::new(job));
                return true;
            }
            queues.insert(key.clone(), VecDeque::from([Box::new(job) as Job]));
        }
        self.spawn_drain(key);
        true
    }

    /// Number of jobs waiting (not running) for `key`
    pub fn pending_depth(&self, key: &GrainIdentity) -> usize {
        lock_queues(&self.queues)
            .get(key)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    fn spawn_drain(&self, key: GrainIdentity) {
        let queues = Arc::clone(&self.queues);
        let executor = self.executor.clone();
        self.executor.spawn(async move {
            loop {
                let job = {
                    let mut guard = lock_queues(&queues);
                    match guard.get_mut(&key) {
                        Some(pending) => match pending.pop_front() {
                            Some(job) => job,
                            None => {
                                guard.remove(&key);
                                break;
                            }
                        },
                        None => break,
                    }
                };
                let _permit = executor.admit().await;
                run_guarded(Some(&key), job()).await;
            }
        });
    }
}

async fn run_guarded(key: Option<&GrainIdentity>, fut: BoxFuture<'static, ()>) {
    if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
        match key {
            Some(key) => tracing::error!(identity = %key, "queued job panicked"),
            None => tracing::error!("unordered job panicked"),
        }
    }
}

fn lock_queues(
    queues: &Mutex<HashMap<GrainIdentity, VecDeque<Job>>>,
) -> std::sync::MutexGuard<'_, HashMap<GrainIdentity, VecDeque<Job>>> {
    queues.lock().unwrap_or_else(PoisonError::into_inner)
}
