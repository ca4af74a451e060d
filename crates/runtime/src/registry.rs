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

//! Activation registry
//!
//! ## Purpose
//! Tracks every grain identity that has touched this node. A
//! `ReferenceEntry` records the identity's reference, descriptor, and
//! activation flavor; singleton entries hold at most one activation,
//! stateless-worker entries hold a LIFO pool of interchangeable ones
//! (LIFO keeps recently used activations hot).
//!
//! ## Concurrency
//! Entry mutation happens either under the per-identity serializer slot
//! (normal dispatch) or inside an eviction cleanup job that itself runs
//! under the same slot, so slot access is a short uncontended lock. A
//! checked-out activation is owned exclusively by its in-flight call and is
//! checked back in when the call's future completes.

use plexgrains_core::{Grain, GrainIdentity, GrainRef, InterfaceDescriptor};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle state of one activation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// No instance constructed yet
    Vacant,
    /// Instance constructed and published
    Live,
    /// Teardown hooks running
    Deactivating,
    /// Torn down; eligible for removal
    Retired,
}

/// One in-memory instance slot for a grain
pub struct Activation {
    instance: Option<Box<dyn Grain>>,
    last_access: i64,
    state: LifecycleState,
}

impl Activation {
    fn vacant(now: i64) -> Self {
        Self {
            instance: None,
            last_access: now,
            state: LifecycleState::Vacant,
        }
    }

    /// Stamp the activation as used now
    pub fn touch(&mut self, now: i64) {
        self.last_access = now;
    }

    /// Milliseconds timestamp of the last use
    pub fn last_access(&self) -> i64 {
        self.last_access
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether an instance has been published
    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Exclusive access to the instance, if published
    pub fn instance_mut(&mut self) -> Option<&mut dyn Grain> {
        self.instance.as_deref_mut()
    }

    /// Publish a fully activated instance
    pub(crate) fn publish(&mut self, instance: Box<dyn Grain>) {
        self.instance = Some(instance);
        self.state = LifecycleState::Live;
    }

    /// Enter teardown, surrendering the instance
    pub(crate) fn begin_deactivation(&mut self) -> Option<Box<dyn Grain>> {
        self.state = LifecycleState::Deactivating;
        self.instance.take()
    }

    /// Mark teardown complete
    pub(crate) fn retire(&mut self) {
        self.state = LifecycleState::Retired;
    }
}

/// Activation flavor of an interface, fixed at entry creation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationFlavor {
    /// Unique activation per identity
    Singleton,
    /// Pool of interchangeable activations per identity
    StatelessWorker,
}

enum Slots {
    Single(Option<Activation>),
    Pool(VecDeque<Activation>),
}

/// Registry record for one grain identity known to this node
pub struct ReferenceEntry {
    reference: GrainRef,
    descriptor: Arc<InterfaceDescriptor>,
    flavor: ActivationFlavor,
    removable: AtomicBool,
    slots: Mutex<Slots>,
}

impl ReferenceEntry {
    fn new(reference: GrainRef, descriptor: Arc<InterfaceDescriptor>) -> Self {
        let (flavor, slots) = if descriptor.is_stateless_worker() {
            (ActivationFlavor::StatelessWorker, Slots::Pool(VecDeque::new()))
        } else {
            (ActivationFlavor::Singleton, Slots::Single(None))
        };
        Self {
            reference,
            descriptor,
            flavor,
            removable: AtomicBool::new(false),
            slots: Mutex::new(slots),
        }
    }

    /// The identity's addressable reference
    pub fn reference(&self) -> &GrainRef {
        &self.reference
    }

    /// The interface descriptor
    pub fn descriptor(&self) -> &Arc<InterfaceDescriptor> {
        &self.descriptor
    }

    /// The activation flavor (never changes after creation)
    pub fn flavor(&self) -> ActivationFlavor {
        self.flavor
    }

    /// Whether the eviction scan may drop this entry
    pub fn is_removable(&self) -> bool {
        self.removable.load(Ordering::Relaxed)
    }

    /// Allow or forbid eviction of this entry
    pub fn set_removable(&self, removable: bool) {
        self.removable.store(removable, Ordering::Relaxed);
    }

    /// Take an activation for an in-flight call
    ///
    /// Singleton: the held activation, or a fresh vacant one. Worker: the
    /// most recently returned pool activation, or a fresh vacant one.
    pub fn check_out(&self, now: i64) -> Activation {
        match &mut *self.lock_slots() {
            Slots::Single(slot) => slot.take().unwrap_or_else(|| Activation::vacant(now)),
            Slots::Pool(pool) => pool.pop_back().unwrap_or_else(|| Activation::vacant(now)),
        }
    }

    /// Return an activation after its call completed
    pub fn check_in(&self, activation: Activation) {
        match &mut *self.lock_slots() {
            Slots::Single(slot) => {
                if slot.is_some() {
                    tracing::error!(
                        grain = %self.reference,
                        "more than one activation checked in for a singleton grain"
                    );
                }
                *slot = Some(activation);
            }
            Slots::Pool(pool) => pool.push_back(activation),
        }
    }

    /// `last_access` of the oldest held activation, if any
    ///
    /// For workers this is the head of the pool (the coldest activation);
    /// for singletons the single slot.
    pub fn oldest_access(&self) -> Option<i64> {
        match &*self.lock_slots() {
            Slots::Single(slot) => slot.as_ref().map(Activation::last_access),
            Slots::Pool(pool) => pool.front().map(Activation::last_access),
        }
    }

    /// Number of activations currently held (not checked out)
    pub fn held_activations(&self) -> usize {
        match &*self.lock_slots() {
            Slots::Single(slot) => usize::from(slot.is_some()),
            Slots::Pool(pool) => pool.len(),
        }
    }

    /// Take the coldest held activation, if any (eviction walk)
    pub(crate) fn pop_oldest(&self) -> Option<Activation> {
        match &mut *self.lock_slots() {
            Slots::Single(slot) => slot.take(),
            Slots::Pool(pool) => pool.pop_front(),
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map of grain identity to reference entry
#[derive(Default)]
pub struct ActivationRegistry {
    entries: Mutex<HashMap<GrainIdentity, Arc<ReferenceEntry>>>,
}

impl ActivationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for `identity`, creating it if absent
    ///
    /// Under the per-identity serializer slot only one job at a time can
    /// create a given identity, so the plain get-or-insert is enough.
    pub fn ensure_entry(
        &self,
        identity: &GrainIdentity,
        descriptor: Arc<InterfaceDescriptor>,
        reference: GrainRef,
    ) -> Arc<ReferenceEntry> {
        debug_assert_eq!(reference.identity(), *identity);
        let mut entries = self.lock_entries();
        Arc::clone(
            entries
                .entry(identity.clone())
                .or_insert_with(|| Arc::new(ReferenceEntry::new(reference, descriptor))),
        )
    }

    /// Look up the entry for `identity`
    pub fn get(&self, identity: &GrainIdentity) -> Option<Arc<ReferenceEntry>> {
        self.lock_entries().get(identity).cloned()
    }

    /// Remove the entry for `identity` only if it is still `entry`
    ///
    /// Guards cleanup against an entry that was replaced while the cleanup
    /// job sat in the queue.
    pub fn remove_if_same(&self, identity: &GrainIdentity, entry: &Arc<ReferenceEntry>) -> bool {
        let mut entries = self.lock_entries();
        match entries.get(identity) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                entries.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of all entries, for the eviction scan
    pub fn snapshot(&self) -> Vec<(GrainIdentity, Arc<ReferenceEntry>)> {
        self.lock_entries()
            .iter()
            .map(|(identity, entry)| (identity.clone(), Arc::clone(entry)))
            .collect()
    }

    /// Number of known identities
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Whether no identities are known
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(
        &self,
    ) -> MutexGuard<'_, HashMap<GrainIdentity, Arc<ReferenceEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use plexgrains_core::{DispatchError, DispatchTarget, MethodDispatcher};
    use serde_json::Value;

    struct NullDispatcher;

    #[async_trait]
    impl MethodDispatcher for NullDispatcher {
        async fn invoke(
            &self,
            _target: DispatchTarget<'_>,
            method_id: u32,
            _args: &[Value],
        ) -> Result<Value, DispatchError> {
            Err(DispatchError::UnknownMethod(method_id))
        }
    }

    struct MarkerGrain(u32);

    #[async_trait]
    impl Grain for MarkerGrain {
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    fn singleton_entry() -> ReferenceEntry {
        let descriptor = Arc::new(InterfaceDescriptor::actor(
            1,
            "ISingle",
            Arc::new(NullDispatcher),
        ));
        ReferenceEntry::new(GrainRef::new(1, Some("a".to_string())), descriptor)
    }

    fn worker_entry() -> ReferenceEntry {
        let descriptor = Arc::new(
            InterfaceDescriptor::actor(2, "IWorker", Arc::new(NullDispatcher))
                .with_stateless_worker(),
        );
        ReferenceEntry::new(GrainRef::new(2, Some("w".to_string())), descriptor)
    }

    fn live(marker: u32, now: i64) -> Activation {
        let mut activation = Activation::vacant(now);
        activation.publish(Box::new(MarkerGrain(marker)));
        activation
    }

    fn marker_of(activation: &mut Activation) -> u32 {
        activation
            .instance_mut()
            .and_then(|grain| grain.as_any_mut().downcast_mut::<MarkerGrain>())
            .map(|grain| grain.0)
            .expect("no marker instance")
    }

    #[test]
    fn test_singleton_check_out_empties_slot() {
        let entry = singleton_entry();
        assert_eq!(entry.flavor(), ActivationFlavor::Singleton);
        entry.check_in(live(7, 10));
        assert_eq!(entry.held_activations(), 1);

        let mut activation = entry.check_out(20);
        assert_eq!(marker_of(&mut activation), 7);
        assert_eq!(entry.held_activations(), 0);

        // empty slot hands out a fresh vacant activation
        let fresh = entry.check_out(30);
        assert!(!fresh.has_instance());
        assert_eq!(fresh.state(), LifecycleState::Vacant);
    }

    #[test]
    fn test_worker_pool_is_lifo() {
        let entry = worker_entry();
        entry.check_in(live(1, 10));
        entry.check_in(live(2, 20));

        // most recently returned activation comes out first
        let mut first = entry.check_out(30);
        assert_eq!(marker_of(&mut first), 2);
        let mut second = entry.check_out(30);
        assert_eq!(marker_of(&mut second), 1);
        assert!(!entry.check_out(30).has_instance());
    }

    #[test]
    fn test_oldest_access_reads_pool_head() {
        let entry = worker_entry();
        entry.check_in(live(1, 100));
        entry.check_in(live(2, 200));
        assert_eq!(entry.oldest_access(), Some(100));

        let singleton = singleton_entry();
        assert_eq!(singleton.oldest_access(), None);
        singleton.check_in(live(1, 42));
        assert_eq!(singleton.oldest_access(), Some(42));
    }

    #[test]
    fn test_remove_if_same_requires_pointer_identity() {
        let registry = ActivationRegistry::new();
        let identity = GrainIdentity::new(1, Some("a".to_string()));
        let descriptor = Arc::new(InterfaceDescriptor::actor(
            1,
            "ISingle",
            Arc::new(NullDispatcher),
        ));
        let entry = registry.ensure_entry(
            &identity,
            Arc::clone(&descriptor),
            GrainRef::new(1, Some("a".to_string())),
        );

        let imposter = Arc::new(ReferenceEntry::new(
            GrainRef::new(1, Some("a".to_string())),
            descriptor,
        ));
        assert!(!registry.remove_if_same(&identity, &imposter));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_if_same(&identity, &entry));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ensure_entry_is_idempotent() {
        let registry = ActivationRegistry::new();
        let identity = GrainIdentity::new(3, Some("x".to_string()));
        let descriptor = Arc::new(InterfaceDescriptor::actor(
            3,
            "ISingle",
            Arc::new(NullDispatcher),
        ));
        let first = registry.ensure_entry(
            &identity,
            Arc::clone(&descriptor),
            GrainRef::new(3, Some("x".to_string())),
        );
        let second = registry.ensure_entry(
            &identity,
            descriptor,
            GrainRef::new(3, Some("x".to_string())),
        );
        assert!(Arc::ptr_eq(&first, &second));
    }
}
