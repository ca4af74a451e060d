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

//! PlexGrains: a virtual-actor (grain) execution runtime
//!
//! Grains are addressable, single-threaded logical entities activated on
//! demand: the runtime guarantees at-most-one in-flight invocation per
//! grain identity, activates instances lazily with full lifecycle hooks,
//! evicts them when idle, and bridges an asynchronous wire protocol to
//! user grain code. Cluster membership, transport, and persistence are
//! host-supplied collaborators behind the `Locator`, `Messenger`, and
//! `StorageProvider` seams.
//!
//! Independent crates, re-exported here:
//! - `plexgrains-core`: identities, references, descriptors, provider seams
//! - `plexgrains-runtime`: the per-node execution engine (`GrainNode`)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub use plexgrains_core as grains_core; // identities, references, descriptors
pub use plexgrains_runtime as runtime; // GrainNode execution engine
