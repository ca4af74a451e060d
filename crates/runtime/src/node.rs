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

//! The grain node
//!
//! ## Purpose
//! `GrainNode` owns this node's population of grains: it receives wire
//! messages, serializes them per identity, activates grains lazily, evicts
//! idle activations, hosts observers, and routes outbound invocations
//! through the messenger and locator.
//!
//! The inbound path lives in `dispatch`, the outbound path in `outbound`,
//! timers and the eviction scan in `timers`; this module holds the node
//! state, the builder, and the control surface.

use crate::lifecycle::LifecycleOrchestrator;
use crate::observers::{ObserverError, ObserverRegistry};
use crate::registry::ActivationRegistry;
use crate::serializer::{ExecutionSerializer, TaskExecutor};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use plexgrains_core::reminders::{
    METHOD_REGISTER_OR_UPDATE_REMINDER, METHOD_UNREGISTER_REMINDER, REMINDER_CONTROLLER_GRAIN_ID,
    REMINDER_CONTROLLER_INTERFACE,
};
use plexgrains_core::{
    bind_default_runtime, FactoryProvider, GrainId, GrainObserver, GrainRef, InterfaceRegistry,
    InvokeError, InvokeHookProvider, InvokeListenerProvider, Locator, Messenger, NodeAddress,
    ProviderError, ReferenceFactory, RuntimeClock, RuntimeConfig, RuntimeContext, RuntimeProvider,
    SystemClock,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use ulid::Ulid;

/// Errors raised by the node control surface
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// No descriptor is registered for the interface
    #[error("unknown interface {0}")]
    UnknownInterface(u32),

    /// A caller-supplied argument was rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A provider failed to start or stop
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Observer installation failed
    #[error(transparent)]
    Observer(#[from] ObserverError),

    /// An outbound invocation failed
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

/// Snapshot of the node's message counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Wire messages accepted by `on_message_received`
    pub messages_received: u64,
    /// Messages whose handler job actually started
    pub messages_handled: u64,
    /// Offers refused by a saturated per-identity queue
    pub refused_executions: u64,
}

/// The per-node grain execution engine
pub struct GrainNode {
    pub(crate) self_ref: Weak<GrainNode>,
    pub(crate) config: RuntimeConfig,
    pub(crate) clock: Arc<dyn RuntimeClock>,
    pub(crate) executor: TaskExecutor,
    pub(crate) serializer: ExecutionSerializer,
    pub(crate) interfaces: InterfaceRegistry,
    pub(crate) activations: ActivationRegistry,
    pub(crate) observers: ObserverRegistry,
    pub(crate) lifecycle: LifecycleOrchestrator,
    pub(crate) providers: Vec<Arc<dyn RuntimeProvider>>,
    pub(crate) factory_provider: Option<Arc<dyn FactoryProvider>>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) locator: Option<Arc<dyn Locator>>,
    pub(crate) invoke_hook: Option<Arc<dyn InvokeHookProvider>>,
    pub(crate) invoke_listeners: Vec<Arc<dyn InvokeListenerProvider>>,
    hosting_observer: Mutex<Option<Arc<dyn GrainObserver>>>,
    pub(crate) runtime_identity: String,
    pub(crate) trace_counter: AtomicU64,
    pub(crate) messages_received: AtomicU64,
    pub(crate) messages_handled: AtomicU64,
    pub(crate) refused_executions: AtomicU64,
    background: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) shutdown: Notify,
}

impl GrainNode {
    /// Start assembling a node
    pub fn builder() -> GrainNodeBuilder {
        GrainNodeBuilder::new()
    }

    /// Start the node: register factory descriptors, install the hosting
    /// facade, start providers, and schedule the background sweeps
    pub async fn start(self: &Arc<Self>) -> Result<(), NodeError> {
        if let Some(factory) = &self.factory_provider {
            for descriptor in factory.descriptors() {
                self.interfaces.register(descriptor);
            }
        }
        self.bind();
        if let Some(locator) = &self.locator {
            if let Some(observer) = locator.hosting_observer() {
                self.get_observer_reference(None, &observer, Some(String::new()))?;
                *self.lock_hosting() = Some(observer);
            }
        }
        for provider in &self.providers {
            provider.start().await?;
        }
        self.spawn_background_tasks();
        tracing::info!(identity = %self.runtime_identity, "grain node started");
        Ok(())
    }

    /// Stop the node: cancel background tasks and stop every provider
    pub async fn stop(&self) -> Result<(), NodeError> {
        self.shutdown.notify_waiters();
        for handle in self.lock_background().drain(..) {
            handle.abort();
        }
        let results =
            futures::future::join_all(self.providers.iter().map(|provider| provider.stop())).await;
        for result in results {
            result?;
        }
        tracing::info!(identity = %self.runtime_identity, "grain node stopped");
        Ok(())
    }

    /// Build a reference to a grain of `interface_id`; no network activity
    pub fn get_reference(
        &self,
        interface_id: u32,
        grain_id: Option<GrainId>,
    ) -> Result<GrainRef, NodeError> {
        let descriptor = self
            .interfaces
            .get(interface_id)
            .ok_or(NodeError::UnknownInterface(interface_id))?;
        let mut reference = descriptor.create_reference(grain_id);
        reference.bind(self.context_weak());
        Ok(reference)
    }

    /// Install `observer` into this node and return its remote-capable
    /// reference
    ///
    /// Idempotent per object: repeated calls return the same reference, and
    /// a differing explicit `id` on a later call is rejected. With no
    /// `interface_hint` the observer's own interface list is searched for a
    /// registered observer interface.
    pub fn get_observer_reference(
        &self,
        interface_hint: Option<u32>,
        observer: &Arc<dyn GrainObserver>,
        id: Option<String>,
    ) -> Result<GrainRef, ObserverError> {
        self.observers.purge_dead();
        if let Some(existing) = self.observers.lookup_reference(observer) {
            if let Some(requested) = &id {
                let existing_id = existing.grain_id().cloned().unwrap_or_default();
                if existing_id != *requested {
                    return Err(ObserverError::IdMismatch {
                        existing: existing_id,
                        requested: requested.clone(),
                    });
                }
            }
            return Ok(existing);
        }

        let interface_id = match interface_hint {
            Some(hint) => hint,
            None => observer
                .observed_interfaces()
                .into_iter()
                .find(|candidate| {
                    self.interfaces
                        .get(*candidate)
                        .map(|descriptor| descriptor.is_observer())
                        .unwrap_or(false)
                })
                .ok_or(ObserverError::NoFactory)?,
        };
        let descriptor = self
            .interfaces
            .get(interface_id)
            .ok_or(ObserverError::NoFactory)?;
        if !descriptor.is_observer() {
            return Err(ObserverError::NoFactory);
        }

        let generated = id.is_none();
        let observer_id = id.unwrap_or_else(|| Ulid::new().to_string());
        let mut reference = descriptor.create_reference(Some(observer_id.clone()));
        if generated {
            // framework-chosen ids pin the reference here so remote callers
            // route back to the installing node
            reference.set_address(Some(self.messenger.node_address()));
        }
        reference.bind(self.context_weak());
        self.observers
            .register(interface_id, observer_id, observer, reference)
    }

    /// Build a reference to a grain pinned to a specific remote node
    pub fn get_remote_reference(
        &self,
        address: NodeAddress,
        interface_id: u32,
        grain_id: GrainId,
    ) -> Result<GrainRef, NodeError> {
        let descriptor = self
            .interfaces
            .get(interface_id)
            .ok_or(NodeError::UnknownInterface(interface_id))?;
        let mut reference = descriptor.create_reference(Some(grain_id));
        reference.set_address(Some(address));
        reference.bind(self.context_weak());
        Ok(reference)
    }

    /// Reference an observer known to live on another node
    ///
    /// Only sound when the caller knows an observer with this id exists
    /// there; intended for providers, not application code.
    pub fn get_remote_observer_reference(
        &self,
        address: NodeAddress,
        interface_id: u32,
        id: GrainId,
    ) -> Result<GrainRef, NodeError> {
        if id.is_empty() {
            return Err(NodeError::InvalidArgument(
                "remote observer id must not be empty".to_string(),
            ));
        }
        self.get_remote_reference(address, interface_id, id)
    }

    /// Register a durable reminder with the cluster's reminder controller
    pub async fn register_reminder(
        &self,
        grain: &GrainRef,
        reminder_name: &str,
        due: Duration,
        period: Duration,
    ) -> Result<(), NodeError> {
        let controller = self.reminder_controller()?;
        let start_at = self.clock.millis() + due.as_millis() as i64;
        let args = vec![
            self.encode_reference(grain)?,
            json!(reminder_name),
            json!(start_at),
            json!(period.as_millis() as u64),
        ];
        controller
            .invoke(METHOD_REGISTER_OR_UPDATE_REMINDER, args)
            .await?;
        Ok(())
    }

    /// Remove a durable reminder
    pub async fn unregister_reminder(
        &self,
        grain: &GrainRef,
        reminder_name: &str,
    ) -> Result<(), NodeError> {
        let controller = self.reminder_controller()?;
        let args = vec![self.encode_reference(grain)?, json!(reminder_name)];
        controller.invoke(METHOD_UNREGISTER_REMINDER, args).await?;
        Ok(())
    }

    /// Install this node as the process-wide ambient runtime
    pub fn bind(&self) {
        bind_default_runtime(self.context_weak());
    }

    /// Rebind `reference` to this node's runtime
    pub fn bind_reference(&self, reference: &mut GrainRef) {
        reference.bind(self.context_weak());
    }

    /// Whether this node can host activations of `interface_id`
    ///
    /// The first call may consult the implementation finder; both outcomes
    /// are cached on the descriptor.
    pub fn can_activate(&self, interface_id: u32) -> bool {
        match self.interfaces.get(interface_id) {
            Some(descriptor) => descriptor.can_activate(self.lifecycle.finder()),
            None => false,
        }
    }

    // TODO: cache registered factories so get_reference can skip the
    // descriptor lookup for hot interfaces
    /// Pre-register a reference factory
    pub fn register_factory(&self, _factory: Arc<dyn ReferenceFactory>) {}

    /// Register an interface descriptor directly (tests and embedded hosts;
    /// production nodes get descriptors from the factory provider)
    pub fn register_interface(&self, descriptor: Arc<plexgrains_core::InterfaceDescriptor>) {
        self.interfaces.register(descriptor);
    }

    /// Message counters
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_handled: self.messages_handled.load(Ordering::Relaxed),
            refused_executions: self.refused_executions.load(Ordering::Relaxed),
        }
    }

    /// This node's cluster-unique identity string
    pub fn runtime_identity(&self) -> &str {
        &self.runtime_identity
    }

    /// The node's clock
    pub fn clock(&self) -> &Arc<dyn RuntimeClock> {
        &self.clock
    }

    /// Number of grain identities currently known to this node
    pub fn local_grain_count(&self) -> usize {
        self.activations.len()
    }

    pub(crate) fn context_weak(&self) -> Weak<dyn RuntimeContext> {
        let weak: Weak<GrainNode> = self.self_ref.clone();
        weak
    }

    fn reminder_controller(&self) -> Result<GrainRef, NodeError> {
        self.get_reference(
            REMINDER_CONTROLLER_INTERFACE,
            Some(REMINDER_CONTROLLER_GRAIN_ID.to_string()),
        )
    }

    fn encode_reference(&self, grain: &GrainRef) -> Result<Value, NodeError> {
        serde_json::to_value(grain)
            .map_err(|err| NodeError::InvalidArgument(format!("unencodable reference: {err}")))
    }

    fn spawn_background_tasks(self: &Arc<Self>) {
        let eviction = {
            let node = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(node.config.cleanup_interval());
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            node.evict_idle(true).await;
                        }
                        _ = node.shutdown.notified() => break,
                    }
                }
            })
        };
        let sweep = {
            let node = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(node.config.message_sweep());
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            node.messenger.timeout_cleanup();
                        }
                        _ = node.shutdown.notified() => break,
                    }
                }
            })
        };
        self.lock_background().extend([eviction, sweep]);
    }

    fn lock_background(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_hosting(&self) -> MutexGuard<'_, Option<Arc<dyn GrainObserver>>> {
        self.hosting_observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_runtime_identity() -> String {
    let raw: [u8; 16] = rand::random();
    let encoded = BASE64_STANDARD.encode(raw);
    format!("PlexGrains[{}]", &encoded[..22])
}

/// Assembles a `GrainNode`
///
/// A messenger is mandatory; everything else has defaults (system clock,
/// executor sized from the config, no providers, no locator).
#[derive(Default)]
pub struct GrainNodeBuilder {
    config: RuntimeConfig,
    clock: Option<Arc<dyn RuntimeClock>>,
    executor: Option<TaskExecutor>,
    messenger: Option<Arc<dyn Messenger>>,
    locator: Option<Arc<dyn Locator>>,
    providers: Vec<Arc<dyn RuntimeProvider>>,
    factory_provider: Option<Arc<dyn FactoryProvider>>,
    descriptors: Vec<Arc<plexgrains_core::InterfaceDescriptor>>,
}

impl GrainNodeBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the runtime configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom clock (tests use `ManualClock`)
    pub fn with_clock(mut self, clock: Arc<dyn RuntimeClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a pre-built executor instead of one sized from the config
    pub fn with_executor(mut self, executor: TaskExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the transport
    pub fn with_messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Set the placement locator
    pub fn with_locator(mut self, locator: Arc<dyn Locator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Append a provider; order matters for hook chains
    pub fn add_provider(mut self, provider: Arc<dyn RuntimeProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Set the factory provider whose descriptors register at start
    pub fn with_factory_provider(mut self, factory: Arc<dyn FactoryProvider>) -> Self {
        self.factory_provider = Some(factory);
        self
    }

    /// Register an interface descriptor at build time
    pub fn register_interface(
        mut self,
        descriptor: Arc<plexgrains_core::InterfaceDescriptor>,
    ) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Build the node
    pub fn build(self) -> Result<Arc<GrainNode>, NodeError> {
        let messenger = self
            .messenger
            .ok_or_else(|| NodeError::InvalidArgument("a messenger is required".to_string()))?;
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let executor = self
            .executor
            .unwrap_or_else(|| TaskExecutor::new(config.executor_width));
        let serializer = ExecutionSerializer::new(executor.clone());
        let lifecycle = LifecycleOrchestrator::new(&self.providers);
        let invoke_listeners: Vec<Arc<dyn InvokeListenerProvider>> = self
            .providers
            .iter()
            .filter_map(|provider| Arc::clone(provider).as_invoke_listener())
            .collect();
        let invoke_hook = self
            .providers
            .iter()
            .find_map(|provider| Arc::clone(provider).as_invoke_hook());
        let interfaces = InterfaceRegistry::new();
        for descriptor in self.descriptors {
            interfaces.register(descriptor);
        }

        Ok(Arc::new_cyclic(|weak| GrainNode {
            self_ref: weak.clone(),
            config,
            clock,
            executor,
            serializer,
            interfaces,
            activations: ActivationRegistry::new(),
            observers: ObserverRegistry::new(),
            lifecycle,
            providers: self.providers,
            factory_provider: self.factory_provider,
            messenger,
            locator: self.locator,
            invoke_hook,
            invoke_listeners,
            hosting_observer: Mutex::new(None),
            runtime_identity: generate_runtime_identity(),
            trace_counter: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_handled: AtomicU64::new(0),
            refused_executions: AtomicU64::new(0),
            background: Mutex::new(Vec::new()),
            shutdown: Notify::new(),
        }))
    }
}
