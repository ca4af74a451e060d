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

//! Outbound invocation path
//!
//! ## Purpose
//! Implements `RuntimeContext` for the node: references bound to this node
//! invoke through here. The source identity and trace id come from the
//! ambient message context (when invoked from inside a grain method);
//! pre/post invoke listeners fire when tracing is enabled; an installed
//! invoke hook replaces the send path entirely.
//!
//! Addresses are not cached on references: a reference without a pinned
//! address is located on every call, and the locator owns any caching.

use crate::node::GrainNode;
use async_trait::async_trait;
use plexgrains_core::{
    current_message, GrainRef, InvokeError, LocateError, RuntimeContext,
};
use serde_json::Value;

#[async_trait]
impl RuntimeContext for GrainNode {
    fn runtime_identity(&self) -> String {
        self.runtime_identity.clone()
    }

    fn clock_millis(&self) -> i64 {
        self.clock.millis()
    }

    async fn invoke(
        &self,
        target: &GrainRef,
        one_way: bool,
        method_id: u32,
        args: Vec<Value>,
    ) -> Result<Value, InvokeError> {
        let (source, trace_id) = match current_message() {
            Some(context) => (Some(context.reference), context.trace_id),
            None => (None, 0),
        };
        if self.config.trace_enabled {
            for listener in &self.invoke_listeners {
                listener.pre_invoke(trace_id, source.as_ref(), target, method_id, &args);
            }
        }
        let result = match &self.invoke_hook {
            Some(hook) => match self.self_ref.upgrade() {
                Some(node) => hook.invoke(node, target, one_way, method_id, args).await,
                None => Err(InvokeError::NoRuntime),
            },
            None => self.send_message(target, one_way, method_id, args).await,
        };
        if self.config.trace_enabled {
            for listener in &self.invoke_listeners {
                listener.post_invoke(trace_id, &result);
            }
        }
        result
    }
}

impl GrainNode {
    /// Ship an invocation, resolving the target node first when the
    /// reference carries no address
    pub(crate) async fn send_message(
        &self,
        target: &GrainRef,
        one_way: bool,
        method_id: u32,
        args: Vec<Value>,
    ) -> Result<Value, InvokeError> {
        tracing::debug!(target = %target, method_id, "sending message");
        let to = match target.address() {
            Some(address) => address.clone(),
            None => match &self.locator {
                Some(locator) => locator.locate(target).await?,
                None => {
                    return Err(InvokeError::Locate(LocateError::Lookup(
                        "no locator configured".to_string(),
                    )))
                }
            },
        };
        self.messenger
            .send_message(
                &to,
                one_way,
                target.interface_id(),
                method_id,
                target.grain_id().cloned(),
                args,
            )
            .await
            .map_err(InvokeError::from)
    }
}
