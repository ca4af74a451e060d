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

//! User-facing grain and observer traits
//!
//! ## Purpose
//! `Grain` is what an application implements to host a virtual actor: the
//! runtime constructs instances lazily, drives the activation lifecycle
//! through these hooks, and guarantees that at most one invocation touches
//! an instance at a time (so methods take `&mut self` through the
//! dispatcher, no internal locking required).
//!
//! `GrainObserver` is the callback side: a local object installed into the
//! observer registry so remote grains can call back into the client. The
//! registry holds observers weakly; dropping the last application `Arc`
//! makes the observer unreachable.

use crate::provider::{StorageError, StorageProvider};
use crate::reference::GrainRef;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Errors raised while bringing an activation up or tearing it down
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// No concrete implementation is registered for the interface on this node
    #[error("no implementation registered for interface {0}")]
    NoImplementation(u32),

    /// Reading persisted state failed; the activation is aborted
    #[error("state load failed: {0}")]
    StateLoad(String),

    /// A lifetime-provider hook failed
    #[error("lifecycle hook failed: {0}")]
    Hook(String),

    /// The grain's own activate/deactivate logic failed
    #[error("{0}")]
    Failed(String),
}

/// What the runtime hands a freshly constructed grain before any hook runs
pub struct GrainBinding {
    /// The grain's own addressable reference
    pub reference: GrainRef,
    /// The first configured storage provider, if any
    pub storage: Option<Arc<dyn StorageProvider>>,
}

/// A virtual actor implementation
///
/// Implementations are constructed by the activator registered in the
/// interface descriptor (or found through the `ImplementationFinder`), then
/// taken through `attach` → `pre_activation` hooks → `read_state` →
/// `activate` → `post_activation` hooks before the first method runs.
///
/// `as_any_mut` is the downcast seam generated dispatchers use to reach the
/// concrete type.
#[async_trait]
pub trait Grain: Send + 'static {
    /// Downcast support for generated dispatchers
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Receive the grain's reference and storage handle
    ///
    /// Runs exactly once per activation, before any lifecycle hook.
    fn attach(&mut self, binding: GrainBinding) {
        let _ = binding;
    }

    /// Load persisted state
    ///
    /// Called only when a storage provider is configured. A failure aborts
    /// the activation and surfaces to the caller of the triggering message.
    async fn read_state(&mut self, storage: &dyn StorageProvider) -> Result<(), StorageError> {
        let _ = storage;
        Ok(())
    }

    /// Activation hook, awaited before the instance is published
    async fn activate(&mut self) -> Result<(), ActivationError> {
        Ok(())
    }

    /// Deactivation hook, awaited during idle eviction
    async fn deactivate(&mut self) -> Result<(), ActivationError> {
        Ok(())
    }
}

/// A locally hosted observer object, callable from remote grains
pub trait GrainObserver: Send + Sync + 'static {
    /// Downcast support for generated dispatchers
    fn as_any(&self) -> &dyn Any;

    /// Observer interfaces this object implements, in preference order
    ///
    /// Consulted when `get_observer_reference` is called without an
    /// interface hint.
    fn observed_interfaces(&self) -> Vec<u32> {
        Vec::new()
    }
}
