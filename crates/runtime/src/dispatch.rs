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

//! Inbound dispatch path
//!
//! ## Purpose
//! Bridges wire messages to user grain methods. `on_message_received` is
//! the messenger's callback: it counts the message and offers a handler job
//! to the serializer keyed by `(interface_id, grain_id)` — the per-identity
//! FIFO slot is what makes grain execution single-threaded. A full queue is
//! answered with `ErrorResponse("Execution refused")` and counted.
//!
//! `handle_message` (serialized per identity) routes to an observer or a
//! grain entry; `execute_message` checks an activation out, instantiates it
//! on first touch, invokes the method through the interface's dispatcher,
//! checks the activation back in once the method future completes, and
//! delivers the response through the degradation ladder
//! (normal/exception → exception-of-send-error → error text → log only).
//!
//! Stateless-worker identities re-offer the execution as a keyless job so
//! calls to the same identity can run on pooled activations in parallel;
//! this deliberately bypasses the per-identity depth bound.

use crate::node::GrainNode;
use crate::registry::{ActivationFlavor, ReferenceEntry};
use plexgrains_core::{
    with_message_context, with_runtime, DispatchTarget, GrainId, GrainIdentity, MessageContext,
    NodeAddress, ResponseKind,
};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;

impl GrainNode {
    /// Wire-message entry point, invoked by the messenger for every inbound
    /// invocation
    ///
    /// Synchronous: the message is either queued (or rejected) before this
    /// returns. Must be called from within the tokio runtime.
    #[allow(clippy::too_many_arguments)]
    pub fn on_message_received(
        self: &Arc<Self>,
        from: NodeAddress,
        one_way: bool,
        message_id: u64,
        interface_id: u32,
        method_id: u32,
        grain_id: Option<GrainId>,
        args: Vec<Value>,
    ) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("plexgrains_runtime_messages_received_total").increment(1);
        let identity = GrainIdentity::new(interface_id, grain_id.clone());
        tracing::debug!(identity = %identity, message_id, "message received");

        let node = Arc::clone(self);
        let job_from = from.clone();
        let accepted = self.serializer.offer(
            Some(identity),
            move || {
                Box::pin(node.handle_message(
                    job_from,
                    one_way,
                    message_id,
                    interface_id,
                    method_id,
                    grain_id,
                    args,
                ))
            },
            self.config.max_queue_size,
        );
        if !accepted {
            self.refuse_execution(one_way, from, message_id, interface_id, method_id);
        }
    }

    /// Handler job, serialized per identity
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn handle_message(
        self: Arc<Self>,
        from: NodeAddress,
        one_way: bool,
        message_id: u64,
        interface_id: u32,
        method_id: u32,
        grain_id: Option<GrainId>,
        args: Vec<Value>,
    ) {
        self.messages_handled.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("plexgrains_runtime_messages_handled_total").increment(1);

        let Some(descriptor) = self.interfaces.get(interface_id) else {
            tracing::error!(interface_id, "message for unknown interface");
            if !one_way {
                self.send_error_response(&from, message_id, "Unknown interface")
                    .await;
            }
            return;
        };

        if descriptor.is_observer() {
            let observer_id = grain_id.unwrap_or_default();
            self.observers.purge_dead();
            let Some(observer) = self.observers.lookup_instance(interface_id, &observer_id) else {
                if !one_way {
                    self.send_error_response(&from, message_id, "Observer no longer present")
                        .await;
                }
                return;
            };
            let result = descriptor
                .dispatcher()
                .invoke(DispatchTarget::Observer(observer.as_ref()), method_id, &args)
                .await
                .map_err(|err| err.to_string());
            self.send_response_logging_errors(one_way, &from, message_id, result)
                .await;
            return;
        }

        let identity = GrainIdentity::new(interface_id, grain_id);
        let mut reference = descriptor.create_reference(identity.grain_id.clone());
        reference.bind(self.context_weak());
        let entry = self
            .activations
            .ensure_entry(&identity, Arc::clone(&descriptor), reference);
        entry.set_removable(true);

        match entry.flavor() {
            ActivationFlavor::Singleton => {
                // already serialized by identity; run inline
                self.execute_message(entry, one_way, message_id, method_id, from, args)
                    .await;
            }
            ActivationFlavor::StatelessWorker => {
                // pooled workers don't need identity ordering; a keyless
                // re-offer yields parallelism within the identity
                let node = Arc::clone(&self);
                let job_from = from.clone();
                let accepted = self.serializer.offer(
                    None,
                    move || {
                        Box::pin(node.execute_message(
                            entry, one_way, message_id, method_id, job_from, args,
                        ))
                    },
                    self.config.max_queue_size,
                );
                if !accepted {
                    self.refuse_execution(one_way, from, message_id, interface_id, method_id);
                }
            }
        }
    }

    /// Run one invocation against a checked-out activation
    pub(crate) async fn execute_message(
        self: Arc<Self>,
        entry: Arc<ReferenceEntry>,
        one_way: bool,
        message_id: u64,
        method_id: u32,
        from: NodeAddress,
        args: Vec<Value>,
    ) {
        let trace_id = self.trace_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let context = MessageContext {
            reference: entry.reference().clone(),
            method_id,
            from: from.clone(),
            trace_id,
        };
        let runtime = self.context_weak();
        let result = with_runtime(
            runtime,
            with_message_context(context, async {
                let now = self.clock.millis();
                let mut activation = entry.check_out(now);
                activation.touch(now);
                let outcome = match self.lifecycle.instantiate(entry.as_ref(), &mut activation).await
                {
                    Ok(()) => match activation.instance_mut() {
                        Some(instance) => entry
                            .descriptor()
                            .dispatcher()
                            .invoke(DispatchTarget::Grain(instance), method_id, &args)
                            .await
                            .map_err(|err| err.to_string()),
                        None => Err("activation published no instance".to_string()),
                    },
                    Err(err) => {
                        tracing::error!(grain = %entry.reference(), "activation failed: {err}");
                        Err(err.to_string())
                    }
                };
                // check-in deferred until the method future completed: the
                // activation is owned by exactly one in-flight call
                entry.check_in(activation);
                outcome
            }),
        )
        .await;
        self.send_response_logging_errors(one_way, &from, message_id, result)
            .await;
    }

    pub(crate) fn refuse_execution(
        self: &Arc<Self>,
        one_way: bool,
        from: NodeAddress,
        message_id: u64,
        interface_id: u32,
        method_id: u32,
    ) {
        self.refused_executions.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("plexgrains_runtime_refused_executions_total").increment(1);
        tracing::error!(interface_id, method_id, message_id, "execution refused");
        if !one_way {
            let node = Arc::clone(self);
            self.executor.spawn(async move {
                node.send_error_response(&from, message_id, "Execution refused")
                    .await;
            });
        }
    }

    pub(crate) async fn send_error_response(&self, to: &NodeAddress, message_id: u64, text: &str) {
        if let Err(err) = self
            .messenger
            .send_response(to, ResponseKind::Error, message_id, Value::String(text.to_string()))
            .await
        {
            tracing::error!("failed to send error response: {err}");
        }
    }

    /// Deliver a method result, degrading through the retry ladder on
    /// transport failures
    pub(crate) async fn send_response_logging_errors(
        &self,
        one_way: bool,
        to: &NodeAddress,
        message_id: u64,
        result: Result<Value, String>,
    ) {
        if let Err(err) = &result {
            tracing::error!(message_id, "grain invocation failed: {err}");
        }
        if one_way {
            return;
        }
        let (kind, payload) = match result {
            Ok(value) => (ResponseKind::Normal, value),
            Err(text) => (ResponseKind::Exception, Value::String(text)),
        };
        let Err(first) = self
            .messenger
            .send_response(to, kind, message_id, payload)
            .await
        else {
            return;
        };
        tracing::error!("error sending method result: {first}");
        let Err(second) = self
            .messenger
            .send_response(
                to,
                ResponseKind::Exception,
                message_id,
                Value::String(first.to_string()),
            )
            .await
        else {
            return;
        };
        tracing::error!("failed twice sending result: {second}");
        if let Err(third) = self
            .messenger
            .send_response(
                to,
                ResponseKind::Error,
                message_id,
                Value::String("failed twice sending result".to_string()),
            )
            .await
        {
            tracing::error!("failed to send error response: {third}");
        }
    }
}
