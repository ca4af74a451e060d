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

//! Grain execution engine for PlexGrains
//!
//! A `GrainNode` owns a population of virtual actors ("grains"): it routes
//! inbound wire messages to them with per-identity serialized execution,
//! activates them lazily with full lifecycle hooks, pools stateless-worker
//! activations, hosts weakly-held observers for remote callbacks, evicts
//! idle activations, and sends responses back through the host's messenger.
//!
//! ```rust,ignore
//! let messenger = LoopbackMessenger::new("local");
//! let node = GrainNode::builder()
//!     .with_messenger(messenger.clone())
//!     .with_locator(StaticLocator::new("local"))
//!     .register_interface(greeter_descriptor())
//!     .build()?;
//! messenger.connect(&node);
//! node.start().await?;
//!
//! let greeter = node.get_reference(GREETER_INTERFACE, Some("en".into()))?;
//! let reply = greeter.invoke(METHOD_GREET, vec![json!("world")]).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lifecycle;
pub mod node;
pub mod observers;
pub mod registry;
pub mod serializer;
pub mod testkit;
pub mod timers;

mod dispatch;
mod outbound;

pub use lifecycle::LifecycleOrchestrator;
pub use node::{GrainNode, GrainNodeBuilder, NodeError, RuntimeStats};
pub use observers::{ObserverError, ObserverRegistry};
pub use registry::{
    Activation, ActivationFlavor, ActivationRegistry, LifecycleState, ReferenceEntry,
};
pub use serializer::{ExecutionSerializer, Job, TaskExecutor};
pub use timers::{TimerCallback, TimerHandle};
