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

//! Interface descriptors and method dispatch
//!
//! ## Purpose
//! Every remotely callable interface is described by an
//! `InterfaceDescriptor`: its cluster-stable numeric id, whether it is an
//! observer interface, whether implementations are stateless workers, a
//! factory for references, a dispatcher that turns `(instance, method_id,
//! args)` into an invocation, and a lazily resolved activator for the
//! concrete implementation hosted on this node.
//!
//! Dispatchers are generated per interface by an external code-generation
//! step; the runtime consumes them through the uniform `MethodDispatcher`
//! contract and never reflects over user types.

use crate::grain::{ActivationError, Grain, GrainObserver};
use crate::provider::ImplementationFinder;
use crate::reference::GrainRef;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Constructor for fresh grain instances
pub type GrainConstructor = Arc<dyn Fn() -> Box<dyn Grain> + Send + Sync>;

/// Errors raised by method dispatchers
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The interface has no method with this id
    #[error("unknown method {0}")]
    UnknownMethod(u32),

    /// Arguments did not decode to what the method expects
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The target was not of the kind this dispatcher serves
    #[error("dispatcher cannot serve this target kind")]
    WrongTargetKind,

    /// The user method raised
    #[error("{0}")]
    Application(String),
}

/// The object a dispatcher is asked to invoke on
///
/// Grain methods run under the per-identity serializer and get exclusive
/// `&mut` access; observer methods are invoked on shared references.
pub enum DispatchTarget<'a> {
    /// A grain activation instance
    Grain(&'a mut dyn Grain),
    /// A locally installed observer object
    Observer(&'a dyn GrainObserver),
}

/// Generated per-interface method dispatcher
#[async_trait]
pub trait MethodDispatcher: Send + Sync {
    /// Invoke `method_id` on `target` with `args`, returning the encoded result
    async fn invoke(
        &self,
        target: DispatchTarget<'_>,
        method_id: u32,
        args: &[Value],
    ) -> Result<Value, DispatchError>;
}

/// Constructs reference stubs for one interface
pub trait ReferenceFactory: Send + Sync {
    /// The interface this factory serves
    fn interface_id(&self) -> u32;

    /// Build an unbound reference for `grain_id`
    fn create_reference(&self, grain_id: Option<String>) -> GrainRef {
        GrainRef::new(self.interface_id(), grain_id)
    }
}

/// The plain factory used when generated code does not supply its own
pub struct DefaultReferenceFactory {
    interface_id: u32,
}

impl DefaultReferenceFactory {
    /// Create a factory for `interface_id`
    pub fn new(interface_id: u32) -> Self {
        Self { interface_id }
    }
}

impl ReferenceFactory for DefaultReferenceFactory {
    fn interface_id(&self) -> u32 {
        self.interface_id
    }
}

enum ActivatorState {
    Unresolved,
    CannotActivate,
    Ready {
        implementation: String,
        construct: GrainConstructor,
    },
}

/// Everything the runtime knows about one remotely callable interface
pub struct InterfaceDescriptor {
    interface_id: u32,
    interface_name: String,
    is_observer: bool,
    stateless_worker: bool,
    factory: Arc<dyn ReferenceFactory>,
    dispatcher: Arc<dyn MethodDispatcher>,
    activator: Mutex<ActivatorState>,
}

impl InterfaceDescriptor {
    /// Describe an actor interface (singleton flavor unless
    /// `with_stateless_worker` is applied)
    pub fn actor(
        interface_id: u32,
        interface_name: impl Into<String>,
        dispatcher: Arc<dyn MethodDispatcher>,
    ) -> Self {
        Self {
            interface_id,
            interface_name: interface_name.into(),
            is_observer: false,
            stateless_worker: false,
            factory: Arc::new(DefaultReferenceFactory::new(interface_id)),
            dispatcher,
            activator: Mutex::new(ActivatorState::Unresolved),
        }
    }

    /// Describe an observer interface
    pub fn observer(
        interface_id: u32,
        interface_name: impl Into<String>,
        dispatcher: Arc<dyn MethodDispatcher>,
    ) -> Self {
        Self {
            interface_id,
            interface_name: interface_name.into(),
            is_observer: true,
            stateless_worker: false,
            factory: Arc::new(DefaultReferenceFactory::new(interface_id)),
            dispatcher,
            activator: Mutex::new(ActivatorState::Unresolved),
        }
    }

    /// Mark the interface as a stateless worker (pooled activations,
    /// method-level parallelism within one identity)
    pub fn with_stateless_worker(mut self) -> Self {
        self.stateless_worker = true;
        self
    }

    /// Use a generated reference factory instead of the default one
    pub fn with_factory(mut self, factory: Arc<dyn ReferenceFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Register the concrete implementation up front, skipping the finder
    pub fn with_activator(
        self,
        implementation: impl Into<String>,
        construct: GrainConstructor,
    ) -> Self {
        *self.lock_activator() = ActivatorState::Ready {
            implementation: implementation.into(),
            construct,
        };
        self
    }

    /// The interface's cluster-stable id
    pub fn interface_id(&self) -> u32 {
        self.interface_id
    }

    /// The interface's human-readable name
    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// Whether this is an observer interface
    pub fn is_observer(&self) -> bool {
        self.is_observer
    }

    /// Whether implementations are pooled stateless workers
    pub fn is_stateless_worker(&self) -> bool {
        self.stateless_worker
    }

    /// The interface's method dispatcher
    pub fn dispatcher(&self) -> &Arc<dyn MethodDispatcher> {
        &self.dispatcher
    }

    /// Build an unbound reference for `grain_id`
    pub fn create_reference(&self, grain_id: Option<String>) -> GrainRef {
        self.factory.create_reference(grain_id)
    }

    /// Resolve the activator, consulting `finder` at most once
    ///
    /// Both outcomes are cached: a found constructor is reused for every
    /// later activation, and a miss pins the descriptor at
    /// "cannot activate" until it is rebuilt.
    pub fn resolve_activator(
        &self,
        finder: Option<&dyn ImplementationFinder>,
    ) -> Result<GrainConstructor, ActivationError> {
        let mut state = self.lock_activator();
        match &*state {
            ActivatorState::Ready { construct, .. } => Ok(construct.clone()),
            ActivatorState::CannotActivate => {
                Err(ActivationError::NoImplementation(self.interface_id))
            }
            ActivatorState::Unresolved => {
                match finder.and_then(|f| f.find_implementation(self.interface_id)) {
                    Some(found) => {
                        let construct = found.construct.clone();
                        tracing::debug!(
                            interface = %self.interface_name,
                            implementation = %found.type_name,
                            "resolved grain implementation"
                        );
                        *state = ActivatorState::Ready {
                            implementation: found.type_name,
                            construct: construct.clone(),
                        };
                        Ok(construct)
                    }
                    None => {
                        *state = ActivatorState::CannotActivate;
                        Err(ActivationError::NoImplementation(self.interface_id))
                    }
                }
            }
        }
    }

    /// Whether this node can host activations of the interface
    pub fn can_activate(&self, finder: Option<&dyn ImplementationFinder>) -> bool {
        !self.is_observer && self.resolve_activator(finder).is_ok()
    }

    /// The resolved implementation name, if known
    pub fn implementation_name(&self) -> Option<String> {
        match &*self.lock_activator() {
            ActivatorState::Ready { implementation, .. } => Some(implementation.clone()),
            _ => None,
        }
    }

    fn lock_activator(&self) -> std::sync::MutexGuard<'_, ActivatorState> {
        self.activator.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceDescriptor")
            .field("interface_id", &self.interface_id)
            .field("interface_name", &self.interface_name)
            .field("is_observer", &self.is_observer)
            .field("stateless_worker", &self.stateless_worker)
            .finish()
    }
}

/// Maps interface ids to descriptors
#[derive(Default)]
pub struct InterfaceRegistry {
    by_id: RwLock<HashMap<u32, Arc<InterfaceDescriptor>>>,
}

impl InterfaceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `descriptor`; replaces any previous registration for the id
    pub fn register(&self, descriptor: Arc<InterfaceDescriptor>) {
        let mut by_id = self
            .by_id
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = by_id.insert(descriptor.interface_id(), descriptor) {
            tracing::warn!(
                interface_id = previous.interface_id(),
                interface = %previous.interface_name(),
                "interface descriptor replaced"
            );
        }
    }

    /// Look up the descriptor for `interface_id`
    pub fn get(&self, interface_id: u32) -> Option<Arc<InterfaceDescriptor>> {
        self.by_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&interface_id)
            .cloned()
    }
}
