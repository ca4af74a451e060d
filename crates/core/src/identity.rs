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

//! Grain identities and node addresses
//!
//! ## Purpose
//! A grain is addressed by `(interface_id, grain_id)`. That pair keys the
//! activation registry and the execution serializer, so equality and hashing
//! cover both fields. Stateless-worker grains share one identity across a
//! whole pool of activations; singleton grains map 1:1.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grain ID type (String for simplicity and flexibility)
pub type GrainId = String;

/// The addressable identity of a grain on the cluster
///
/// `grain_id` may be `None` for interfaces that have a single well-known
/// instance (the id-less form some system facades use).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrainIdentity {
    /// Stable numeric interface id, shared across the cluster
    pub interface_id: u32,
    /// Caller-chosen grain id within the interface, if any
    pub grain_id: Option<GrainId>,
}

impl GrainIdentity {
    /// Create an identity from its two components
    pub fn new(interface_id: u32, grain_id: Option<GrainId>) -> Self {
        Self {
            interface_id,
            grain_id,
        }
    }
}

impl fmt::Display for GrainIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.grain_id {
            Some(id) => write!(f, "{}:{}", self.interface_id, id),
            None => write!(f, "{}:-", self.interface_id),
        }
    }
}

/// Opaque address of a node in the cluster
///
/// The runtime never interprets the contents; it only hands addresses to the
/// `Messenger` and compares them for equality. The transport decides what an
/// address means (host:port, a cluster member id, a loopback tag in tests).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress(String);

impl NodeAddress {
    /// Create an address from any string-like value
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The raw address text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_identity_equality_covers_both_fields() {
        let a = GrainIdentity::new(7, Some("x".to_string()));
        let b = GrainIdentity::new(7, Some("x".to_string()));
        let c = GrainIdentity::new(7, Some("y".to_string()));
        let d = GrainIdentity::new(8, Some("x".to_string()));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);

        let mut map = HashMap::new();
        map.insert(a.clone(), 1);
        assert_eq!(map.get(&b), Some(&1));
        assert_eq!(map.get(&c), None);
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(
            GrainIdentity::new(3, Some("a".to_string())).to_string(),
            "3:a"
        );
        assert_eq!(GrainIdentity::new(3, None).to_string(), "3:-");
    }
}
