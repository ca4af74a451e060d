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

//! Observer registry
//!
//! ## Purpose
//! Bidirectional map between locally installed observer objects and their
//! remotely addressable references. Both directions hold the observer
//! weakly: installing an observer must not keep it alive, and once the
//! application drops its last `Arc`, inbound calls to that identity answer
//! "Observer no longer present".
//!
//! ## Design
//! Forward: `(interface_id, id)` → weak observer. Reverse: observer object
//! pointer → (weak observer, reference). The pointer key is only trusted
//! after upgrading the weak and checking `Arc::ptr_eq`, since a dead slot's
//! address may be reused by a new allocation. Dead slots are purged by
//! per-access probing (`purge_dead` runs on every install and inbound
//! observer lookup).

use plexgrains_core::{GrainObserver, GrainRef};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Errors raised while installing observers
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The object is already installed under a different id
    #[error("observer already installed with id {existing}; cannot reinstall as {requested}")]
    IdMismatch {
        /// Id the observer was first installed with
        existing: String,
        /// Id the caller asked for this time
        requested: String,
    },

    /// The requested id is taken by a different live observer
    #[error("observer id clashes with a pre-existing observer: {0}")]
    IdClash(String),

    /// No registered observer interface matches the object
    #[error("no registered observer interface for this object")]
    NoFactory,
}

struct ReverseSlot {
    observer: Weak<dyn GrainObserver>,
    reference: GrainRef,
}

/// Weakly-keyed bidirectional observer map
#[derive(Default)]
pub struct ObserverRegistry {
    instances: Mutex<HashMap<(u32, String), Weak<dyn GrainObserver>>>,
    references: Mutex<HashMap<usize, ReverseSlot>>,
}

fn object_key(observer: &Arc<dyn GrainObserver>) -> usize {
    Arc::as_ptr(observer) as *const () as usize
}

impl ObserverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The reference an observer object was installed under, if it still is
    pub fn lookup_reference(&self, observer: &Arc<dyn GrainObserver>) -> Option<GrainRef> {
        let references = self.lock_references();
        let slot = references.get(&object_key(observer))?;
        match slot.observer.upgrade() {
            Some(live) if Arc::ptr_eq(&live, observer) => Some(slot.reference.clone()),
            _ => None,
        }
    }

    /// The live observer installed at `(interface_id, id)`, if any
    pub fn lookup_instance(&self, interface_id: u32, id: &str) -> Option<Arc<dyn GrainObserver>> {
        self.lock_instances()
            .get(&(interface_id, id.to_string()))
            .and_then(Weak::upgrade)
    }

    /// Install `observer` at `(interface_id, id)` with `reference`
    ///
    /// Idempotent for the same object; a different live object at the same
    /// identity is an `IdClash`.
    pub fn register(
        &self,
        interface_id: u32,
        id: String,
        observer: &Arc<dyn GrainObserver>,
        reference: GrainRef,
    ) -> Result<GrainRef, ObserverError> {
        let mut instances = self.lock_instances();
        let key = (interface_id, id.clone());
        if let Some(existing) = instances.get(&key).and_then(Weak::upgrade) {
            if !Arc::ptr_eq(&existing, observer) {
                return Err(ObserverError::IdClash(id));
            }
            let references = self.lock_references();
            if let Some(slot) = references.get(&object_key(observer)) {
                return Ok(slot.reference.clone());
            }
            return Ok(reference);
        }
        instances.insert(key, Arc::downgrade(observer));
        self.lock_references().insert(
            object_key(observer),
            ReverseSlot {
                observer: Arc::downgrade(observer),
                reference: reference.clone(),
            },
        );
        Ok(reference)
    }

    /// Drop slots whose observer has been collected
    pub fn purge_dead(&self) {
        self.lock_instances()
            .retain(|_, observer| observer.upgrade().is_some());
        self.lock_references()
            .retain(|_, slot| slot.observer.upgrade().is_some());
    }

    /// Number of live installed observers
    pub fn live_count(&self) -> usize {
        self.lock_instances()
            .values()
            .filter(|observer| observer.upgrade().is_some())
            .count()
    }

    fn lock_instances(
        &self,
    ) -> MutexGuard<'_, HashMap<(u32, String), Weak<dyn GrainObserver>>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_references(&self) -> MutexGuard<'_, HashMap<usize, ReverseSlot>> {
        self.references
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl GrainObserver for Probe {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn probe() -> Arc<dyn GrainObserver> {
        Arc::new(Probe)
    }

    #[test]
    fn test_register_and_lookup_both_directions() {
        let registry = ObserverRegistry::new();
        let observer = probe();
        let reference = GrainRef::new(9, Some("obs-1".to_string()));
        registry
            .register(9, "obs-1".to_string(), &observer, reference.clone())
            .unwrap();

        assert_eq!(registry.lookup_reference(&observer), Some(reference));
        assert!(registry.lookup_instance(9, "obs-1").is_some());
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_id_clash_with_different_object() {
        let registry = ObserverRegistry::new();
        let first = probe();
        let second = probe();
        registry
            .register(9, "same".to_string(), &first, GrainRef::new(9, Some("same".to_string())))
            .unwrap();
        let err = registry
            .register(9, "same".to_string(), &second, GrainRef::new(9, Some("same".to_string())))
            .unwrap_err();
        assert!(matches!(err, ObserverError::IdClash(id) if id == "same"));
    }

    #[test]
    fn test_dropping_observer_empties_registry() {
        let registry = ObserverRegistry::new();
        let observer = probe();
        registry
            .register(9, "gone".to_string(), &observer, GrainRef::new(9, Some("gone".to_string())))
            .unwrap();
        drop(observer);

        assert!(registry.lookup_instance(9, "gone").is_none());
        registry.purge_dead();
        assert_eq!(registry.live_count(), 0);
        // the identity is free for a new observer after collection
        let replacement = probe();
        registry
            .register(9, "gone".to_string(), &replacement, GrainRef::new(9, Some("gone".to_string())))
            .unwrap();
        assert!(registry.lookup_instance(9, "gone").is_some());
    }
}
