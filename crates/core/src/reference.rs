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

//! Grain references
//!
//! ## Purpose
//! A `GrainRef` is the addressable stub for a grain: identity, an optional
//! pinned node address (observers route back to their installing node this
//! way), and a non-serialized binding to the runtime that created it.
//! References travel over the wire as plain identity + address; the
//! receiving side rebinds them to its own runtime.
//!
//! Equality, hashing, and serde cover only the wire-visible fields.

use crate::context::{current_runtime, RuntimeContext};
use crate::identity::{GrainId, GrainIdentity, NodeAddress};
use crate::messaging::InvokeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// Non-owning handle to the runtime a reference was created by
///
/// Held weakly so reference cycles (`runtime → registry → reference →
/// runtime`) cannot keep a stopped node alive.
#[derive(Clone, Default)]
pub struct RuntimeBinding(Option<Weak<dyn RuntimeContext>>);

impl fmt::Debug for RuntimeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "RuntimeBinding(bound)"),
            None => write!(f, "RuntimeBinding(unbound)"),
        }
    }
}

/// Addressable stub for a grain or observer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrainRef {
    interface_id: u32,
    grain_id: Option<GrainId>,
    address: Option<NodeAddress>,
    #[serde(skip)]
    runtime: RuntimeBinding,
}

impl GrainRef {
    /// Create an unbound reference with no pinned address
    pub fn new(interface_id: u32, grain_id: Option<GrainId>) -> Self {
        Self {
            interface_id,
            grain_id,
            address: None,
            runtime: RuntimeBinding::default(),
        }
    }

    /// The interface id
    pub fn interface_id(&self) -> u32 {
        self.interface_id
    }

    /// The grain id, if any
    pub fn grain_id(&self) -> Option<&GrainId> {
        self.grain_id.as_ref()
    }

    /// The `(interface_id, grain_id)` identity
    pub fn identity(&self) -> GrainIdentity {
        GrainIdentity::new(self.interface_id, self.grain_id.clone())
    }

    /// The pinned node address, if any
    pub fn address(&self) -> Option<&NodeAddress> {
        self.address.as_ref()
    }

    /// Pin (or clear) the node address
    pub fn set_address(&mut self, address: Option<NodeAddress>) {
        self.address = address;
    }

    /// Bind this reference to a runtime
    pub fn bind(&mut self, runtime: Weak<dyn RuntimeContext>) {
        self.runtime = RuntimeBinding(Some(runtime));
    }

    /// Whether an explicit runtime binding is present and alive
    pub fn is_bound(&self) -> bool {
        matches!(&self.runtime.0, Some(weak) if weak.upgrade().is_some())
    }

    /// Resolve the runtime: explicit binding first, ambient runtime second
    pub fn runtime(&self) -> Result<Arc<dyn RuntimeContext>, InvokeError> {
        if let Some(weak) = &self.runtime.0 {
            if let Some(runtime) = weak.upgrade() {
                return Ok(runtime);
            }
        }
        current_runtime().ok_or(InvokeError::NoRuntime)
    }

    /// Two-way invocation of `method_id`
    pub async fn invoke(&self, method_id: u32, args: Vec<Value>) -> Result<Value, InvokeError> {
        let runtime = self.runtime()?;
        runtime.invoke(self, false, method_id, args).await
    }

    /// One-way invocation of `method_id`; completes once the message is sent
    pub async fn notify(&self, method_id: u32, args: Vec<Value>) -> Result<(), InvokeError> {
        let runtime = self.runtime()?;
        runtime.invoke(self, true, method_id, args).await.map(|_| ())
    }
}

impl PartialEq for GrainRef {
    fn eq(&self, other: &Self) -> bool {
        self.interface_id == other.interface_id
            && self.grain_id == other.grain_id
            && self.address == other.address
    }
}

impl Eq for GrainRef {}

impl Hash for GrainRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.interface_id.hash(state);
        self.grain_id.hash(state);
        self.address.hash(state);
    }
}

impl fmt::Display for GrainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity())?;
        if let Some(address) = &self.address {
            write!(f, "@{}", address)?;
        }
        Ok(())
    }
}
