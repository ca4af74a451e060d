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

//! Activation lifecycle orchestration
//!
//! ## Purpose
//! Drives a fresh activation through the full bring-up chain
//! (`attach` → `pre_activation*` → `read_state` → `activate` →
//! `post_activation*`) and the teardown chain (`pre_deactivation*` →
//! `deactivate` → `post_deactivation*`). Chains are strictly sequential:
//! each step is awaited before the next starts, and a bring-up failure
//! aborts the remaining steps without publishing the instance.
//!
//! Teardown failures are logged and the instance is discarded regardless;
//! a grain that cannot deactivate cleanly still leaves memory.

use crate::registry::{Activation, ReferenceEntry};
use plexgrains_core::{
    ActivationError, GrainBinding, GrainRef, ImplementationFinder, LifetimeProvider,
    RuntimeProvider, StorageProvider,
};
use std::sync::Arc;

/// Runs provider hook chains around activation and deactivation
pub struct LifecycleOrchestrator {
    lifetime: Vec<Arc<dyn LifetimeProvider>>,
    storage: Option<Arc<dyn StorageProvider>>,
    finder: Option<Arc<dyn ImplementationFinder>>,
}

impl LifecycleOrchestrator {
    /// Resolve the lifecycle-relevant facets out of the provider list
    ///
    /// Hook order follows provider registration order; the first storage
    /// provider and the first finder win.
    pub fn new(providers: &[Arc<dyn RuntimeProvider>]) -> Self {
        Self {
            lifetime: providers
                .iter()
                .filter_map(|provider| Arc::clone(provider).as_lifetime())
                .collect(),
            storage: providers
                .iter()
                .find_map(|provider| Arc::clone(provider).as_storage()),
            finder: providers
                .iter()
                .find_map(|provider| Arc::clone(provider).as_finder()),
        }
    }

    /// The configured implementation finder, if any
    pub fn finder(&self) -> Option<&dyn ImplementationFinder> {
        self.finder.as_deref()
    }

    /// The first configured storage provider, if any
    pub fn storage(&self) -> Option<&Arc<dyn StorageProvider>> {
        self.storage.as_ref()
    }

    /// First-touch instantiation; a no-op when the activation already has
    /// an instance
    pub async fn instantiate(
        &self,
        entry: &ReferenceEntry,
        activation: &mut Activation,
    ) -> Result<(), ActivationError> {
        if activation.has_instance() {
            return Ok(());
        }
        let construct = entry.descriptor().resolve_activator(self.finder())?;
        let mut grain = construct();
        grain.attach(GrainBinding {
            reference: entry.reference().clone(),
            storage: self.storage.clone(),
        });
        for provider in &self.lifetime {
            provider
                .pre_activation(grain.as_mut())
                .await
                .map_err(|err| ActivationError::Hook(err.to_string()))?;
        }
        if let Some(storage) = &self.storage {
            if let Err(err) = grain.read_state(storage.as_ref()).await {
                tracing::error!(grain = %entry.reference(), "error reading grain state: {err}");
                return Err(ActivationError::StateLoad(err.to_string()));
            }
        }
        grain.activate().await?;
        for provider in &self.lifetime {
            provider
                .post_activation(grain.as_mut())
                .await
                .map_err(|err| ActivationError::Hook(err.to_string()))?;
        }
        activation.publish(grain);
        tracing::debug!(grain = %entry.reference(), "grain activated");
        Ok(())
    }

    /// Tear an activation down; always leaves it `Retired` with the
    /// instance dropped
    pub async fn deactivate(&self, reference: &GrainRef, activation: &mut Activation) {
        let Some(mut grain) = activation.begin_deactivation() else {
            activation.retire();
            return;
        };
        if let Err(err) = self.run_teardown(grain.as_mut()).await {
            tracing::error!(grain = %reference, "error during deactivation: {err}");
        }
        activation.retire();
        tracing::debug!(grain = %reference, "grain deactivated");
    }

    async fn run_teardown(
        &self,
        grain: &mut dyn plexgrains_core::Grain,
    ) -> Result<(), ActivationError> {
        for provider in &self.lifetime {
            provider
                .pre_deactivation(grain)
                .await
                .map_err(|err| ActivationError::Hook(err.to_string()))?;
        }
        grain.deactivate().await?;
        for provider in &self.lifetime {
            provider
                .post_deactivation(grain)
                .await
                .map_err(|err| ActivationError::Hook(err.to_string()))?;
        }
        Ok(())
    }
}
