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

//! Ambient invocation context
//!
//! ## Purpose
//! While a grain method runs, user code can ask "who am I, who called me,
//! and which runtime do I belong to" without threading parameters through
//! every call. The runtime scopes a `MessageContext` and a runtime handle
//! into task-locals around every dispatch; nested dispatches shadow and
//! restore the outer scope automatically.
//!
//! A process-wide default runtime backs the task-local: references created
//! outside any dispatch (startup code, tests) still resolve a runtime after
//! `bind_default_runtime` has been called.

use crate::identity::NodeAddress;
use crate::messaging::InvokeError;
use crate::reference::GrainRef;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, RwLock, Weak};

/// What a reference needs from the runtime it is bound to
///
/// Implemented by the grain node in `plexgrains-runtime`; kept here so
/// references and providers can hold a runtime handle without depending on
/// the engine crate.
#[async_trait]
pub trait RuntimeContext: Send + Sync + 'static {
    /// This runtime's cluster-unique identity string
    fn runtime_identity(&self) -> String;

    /// Current wall-clock milliseconds from the runtime's clock
    fn clock_millis(&self) -> i64;

    /// Perform an outbound invocation on `target`
    async fn invoke(
        &self,
        target: &GrainRef,
        one_way: bool,
        method_id: u32,
        args: Vec<Value>,
    ) -> Result<Value, InvokeError>;
}

/// Per-invocation ambient data, visible to user code during method execution
#[derive(Clone, Debug)]
pub struct MessageContext {
    /// Reference of the grain currently executing
    pub reference: GrainRef,
    /// Method id of the in-flight invocation
    pub method_id: u32,
    /// Node the invocation came from
    pub from: NodeAddress,
    /// Monotonically increasing trace id, unique within this runtime
    pub trace_id: u64,
}

tokio::task_local! {
    static CURRENT_MESSAGE: MessageContext;
    static CURRENT_RUNTIME: Weak<dyn RuntimeContext>;
}

static DEFAULT_RUNTIME: RwLock<Option<Weak<dyn RuntimeContext>>> = RwLock::new(None);

/// Run `fut` with `ctx` as the current message context
pub async fn with_message_context<F: Future>(ctx: MessageContext, fut: F) -> F::Output {
    CURRENT_MESSAGE.scope(ctx, fut).await
}

/// The message context of the invocation currently executing on this task
pub fn current_message() -> Option<MessageContext> {
    CURRENT_MESSAGE.try_with(|ctx| ctx.clone()).ok()
}

/// Run `fut` with `runtime` as the current runtime binding
pub async fn with_runtime<F: Future>(runtime: Weak<dyn RuntimeContext>, fut: F) -> F::Output {
    CURRENT_RUNTIME.scope(runtime, fut).await
}

/// Install `runtime` as the process-wide fallback runtime
///
/// The last runtime bound wins, mirroring "the last node started is the
/// default" for hosts that run a single node per process.
pub fn bind_default_runtime(runtime: Weak<dyn RuntimeContext>) {
    if let Ok(mut slot) = DEFAULT_RUNTIME.write() {
        *slot = Some(runtime);
    }
}

/// Resolve the ambient runtime: task scope first, process default second
pub fn current_runtime() -> Option<Arc<dyn RuntimeContext>> {
    if let Ok(found) = CURRENT_RUNTIME.try_with(|weak| weak.upgrade()) {
        if found.is_some() {
            return found;
        }
    }
    DEFAULT_RUNTIME
        .read()
        .ok()
        .and_then(|slot| slot.as_ref().and_then(Weak::upgrade))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeAddress;

    fn context(trace_id: u64) -> MessageContext {
        MessageContext {
            reference: GrainRef::new(1, Some("g".to_string())),
            method_id: 9,
            from: NodeAddress::new("peer"),
            trace_id,
        }
    }

    #[tokio::test]
    async fn test_message_context_scoping_nests_and_restores() {
        assert!(current_message().is_none());
        with_message_context(context(1), async {
            assert_eq!(current_message().unwrap().trace_id, 1);
            with_message_context(context(2), async {
                assert_eq!(current_message().unwrap().trace_id, 2);
            })
            .await;
            // inner scope restored the outer context
            assert_eq!(current_message().unwrap().trace_id, 1);
        })
        .await;
        assert!(current_message().is_none());
    }
}
