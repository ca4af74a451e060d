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

//! Runtime provider seams
//!
//! ## Purpose
//! Hosts extend the node through an ordered list of providers. A provider
//! participates in node start/stop and may expose any of the specialized
//! facets below; the node filters the list by facet when it needs one
//! (`as_*` returns `Some(self)` from providers that implement the facet,
//! the trait-object equivalent of a type-filtered service lookup).
//!
//! Facets:
//! - `LifetimeProvider` — pre/post activation and deactivation hooks
//! - `StorageProvider` — grain state persistence (first one wins)
//! - `InvokeListenerProvider` — pre/post outbound invoke tracing
//! - `InvokeHookProvider` — full interception of outbound invokes
//! - `ImplementationFinder` — maps interface ids to grain constructors

use crate::context::RuntimeContext;
use crate::descriptor::{GrainConstructor, InterfaceDescriptor};
use crate::grain::Grain;
use crate::messaging::InvokeError;
use crate::reference::GrainRef;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Errors raised by providers
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider failed to start
    #[error("provider start failed: {0}")]
    Start(String),

    /// Provider failed to stop
    #[error("provider stop failed: {0}")]
    Stop(String),

    /// A lifecycle hook failed
    #[error("{0}")]
    Hook(String),
}

/// Errors raised by storage providers
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading state failed
    #[error("state read failed: {0}")]
    Read(String),

    /// Writing state failed
    #[error("state write failed: {0}")]
    Write(String),

    /// Clearing state failed
    #[error("state clear failed: {0}")]
    Clear(String),
}

/// A node extension with a start/stop lifecycle and optional facets
#[async_trait]
pub trait RuntimeProvider: Send + Sync + 'static {
    /// Start the provider; runs during node start, in registration order
    async fn start(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Stop the provider; all providers are stopped concurrently
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Lifetime-hook facet, if implemented
    fn as_lifetime(self: Arc<Self>) -> Option<Arc<dyn LifetimeProvider>> {
        None
    }

    /// Storage facet, if implemented
    fn as_storage(self: Arc<Self>) -> Option<Arc<dyn StorageProvider>> {
        None
    }

    /// Invoke-listener facet, if implemented
    fn as_invoke_listener(self: Arc<Self>) -> Option<Arc<dyn InvokeListenerProvider>> {
        None
    }

    /// Invoke-hook facet, if implemented
    fn as_invoke_hook(self: Arc<Self>) -> Option<Arc<dyn InvokeHookProvider>> {
        None
    }

    /// Implementation-finder facet, if implemented
    fn as_finder(self: Arc<Self>) -> Option<Arc<dyn ImplementationFinder>> {
        None
    }
}

/// Pre/post hooks around grain activation and deactivation
///
/// Hooks run sequentially in provider order; each is awaited before the
/// next starts. A pre-activation failure aborts the activation.
#[async_trait]
pub trait LifetimeProvider: Send + Sync {
    /// Runs before `read_state`/`activate`
    async fn pre_activation(&self, grain: &mut dyn Grain) -> Result<(), ProviderError> {
        let _ = grain;
        Ok(())
    }

    /// Runs after `activate`, before the instance is published
    async fn post_activation(&self, grain: &mut dyn Grain) -> Result<(), ProviderError> {
        let _ = grain;
        Ok(())
    }

    /// Runs before `deactivate`
    async fn pre_deactivation(&self, grain: &mut dyn Grain) -> Result<(), ProviderError> {
        let _ = grain;
        Ok(())
    }

    /// Runs after `deactivate`
    async fn post_deactivation(&self, grain: &mut dyn Grain) -> Result<(), ProviderError> {
        let _ = grain;
        Ok(())
    }
}

/// Grain state persistence
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Read the persisted state for `reference`, if any
    async fn read_state(&self, reference: &GrainRef) -> Result<Option<Value>, StorageError>;

    /// Persist `state` for `reference`
    async fn write_state(&self, reference: &GrainRef, state: Value) -> Result<(), StorageError>;

    /// Remove any persisted state for `reference`
    async fn clear_state(&self, reference: &GrainRef) -> Result<(), StorageError>;
}

/// Observes outbound invocations when tracing is enabled
pub trait InvokeListenerProvider: Send + Sync {
    /// Fired before the message leaves this node
    fn pre_invoke(
        &self,
        trace_id: u64,
        source: Option<&GrainRef>,
        target: &GrainRef,
        method_id: u32,
        args: &[Value],
    );

    /// Fired when the invocation's result future completes
    fn post_invoke(&self, trace_id: u64, result: &Result<Value, InvokeError>);
}

/// Full interception of outbound invocations
///
/// When installed, the hook replaces the default send path entirely; it may
/// short-circuit, reroute, or fall back to `runtime.invoke` semantics on its
/// own terms.
#[async_trait]
pub trait InvokeHookProvider: Send + Sync {
    /// Perform (or intercept) the invocation
    async fn invoke(
        &self,
        runtime: Arc<dyn RuntimeContext>,
        target: &GrainRef,
        one_way: bool,
        method_id: u32,
        args: Vec<Value>,
    ) -> Result<Value, InvokeError>;
}

/// A concrete grain implementation, as produced by the finder
pub struct GrainImplementation {
    /// Implementation type name, for logs
    pub type_name: String,
    /// Constructor for fresh instances
    pub construct: GrainConstructor,
}

/// Maps interface ids to concrete grain implementations
///
/// Consulted at most once per interface: the descriptor caches both the
/// found constructor and the "nothing here" answer.
pub trait ImplementationFinder: Send + Sync {
    /// Find the implementation for `interface_id`, if this node hosts one
    fn find_implementation(&self, interface_id: u32) -> Option<GrainImplementation>;
}

/// Produces the interface descriptors this node serves
///
/// Typically backed by generated code; the node registers every descriptor
/// at start.
pub trait FactoryProvider: Send + Sync {
    /// All descriptors to register
    fn descriptors(&self) -> Vec<Arc<InterfaceDescriptor>>;
}
