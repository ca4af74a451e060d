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

//! Core types and traits for PlexGrains
//!
//! This crate contains the vocabulary shared between the runtime and
//! generated interface code: grain identities and references, interface
//! descriptors and dispatchers, the provider seams (lifetime, storage,
//! invoke hooks, implementation finder), the wire contracts (`Messenger`,
//! `Locator`), the pluggable clock, and the runtime configuration knobs.
//!
//! The execution engine itself lives in `plexgrains-runtime`; splitting the
//! vocabulary out breaks the circular dependency between references (which
//! need a runtime to invoke through) and the runtime (which hands out
//! references).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod grain;
pub mod identity;
pub mod messaging;
pub mod provider;
pub mod reference;
pub mod reminders;

pub use clock::{ManualClock, RuntimeClock, SystemClock};
pub use config::RuntimeConfig;
pub use context::{
    bind_default_runtime, current_message, current_runtime, with_message_context, with_runtime,
    MessageContext, RuntimeContext,
};
pub use descriptor::{
    DefaultReferenceFactory, DispatchError, DispatchTarget, GrainConstructor, InterfaceDescriptor,
    InterfaceRegistry, MethodDispatcher, ReferenceFactory,
};
pub use grain::{ActivationError, Grain, GrainBinding, GrainObserver};
pub use identity::{GrainId, GrainIdentity, NodeAddress};
pub use messaging::{InvokeError, LocateError, Locator, Messenger, MessengerError, ResponseKind};
pub use provider::{
    FactoryProvider, GrainImplementation, ImplementationFinder, InvokeHookProvider,
    InvokeListenerProvider, LifetimeProvider, ProviderError, RuntimeProvider, StorageError,
    StorageProvider,
};
pub use reference::GrainRef;
