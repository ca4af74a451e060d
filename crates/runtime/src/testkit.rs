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

//! In-process transport for tests and embedded hosts
//!
//! ## Purpose
//! `LoopbackMessenger` short-circuits the wire: outbound messages are fed
//! straight back into the connected node's inbound path, and responses
//! complete the caller's pending future. `StaticLocator` places every grain
//! on one fixed address. Together they let a single node exercise the full
//! outbound → inbound → response round trip without a network.
//!
//! The messenger records every response attempt and can inject response
//! delivery failures, which is how the response degradation ladder is
//! tested.

use crate::node::GrainNode;
use async_trait::async_trait;
use plexgrains_core::{
    GrainId, GrainObserver, GrainRef, LocateError, Locator, Messenger, MessengerError,
    NodeAddress, ResponseKind,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::oneshot;

/// One recorded response attempt
#[derive(Clone, Debug)]
pub struct ResponseRecord {
    /// Response kind attempted
    pub kind: ResponseKind,
    /// Message the response answers
    pub message_id: u64,
    /// Response payload
    pub payload: Value,
    /// Whether delivery succeeded (injected failures record `false`)
    pub delivered: bool,
}

/// Loopback transport delivering messages back into one local node
pub struct LoopbackMessenger {
    address: NodeAddress,
    node: Mutex<Option<Weak<GrainNode>>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<(ResponseKind, Value)>>>,
    next_message_id: AtomicU64,
    fail_responses: AtomicUsize,
    responses: Mutex<Vec<ResponseRecord>>,
}

impl LoopbackMessenger {
    /// Create a messenger answering as `address`
    pub fn new(address: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            address: NodeAddress::new(address),
            node: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            next_message_id: AtomicU64::new(0),
            fail_responses: AtomicUsize::new(0),
            responses: Mutex::new(Vec::new()),
        })
    }

    /// Connect the node that inbound messages are delivered to
    pub fn connect(&self, node: &Arc<GrainNode>) {
        *self.lock_node() = Some(Arc::downgrade(node));
    }

    /// Make the next `count` response deliveries fail
    pub fn inject_response_failures(&self, count: usize) {
        self.fail_responses.store(count, Ordering::SeqCst);
    }

    /// Every response attempt so far, in order
    pub fn response_log(&self) -> Vec<ResponseRecord> {
        self.lock_responses().clone()
    }

    fn lock_node(&self) -> MutexGuard<'_, Option<Weak<GrainNode>>> {
        self.node.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(
        &self,
    ) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<(ResponseKind, Value)>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_responses(&self) -> MutexGuard<'_, Vec<ResponseRecord>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn payload_text(payload: Value) -> String {
    match payload {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[async_trait]
impl Messenger for LoopbackMessenger {
    fn node_address(&self) -> NodeAddress {
        self.address.clone()
    }

    async fn send_message(
        &self,
        _to: &NodeAddress,
        one_way: bool,
        interface_id: u32,
        method_id: u32,
        grain_id: Option<GrainId>,
        args: Vec<Value>,
    ) -> Result<Value, MessengerError> {
        let node = self
            .lock_node()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| MessengerError::Send("loopback messenger not connected".to_string()))?;
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        let receiver = if one_way {
            None
        } else {
            let (response_tx, response_rx) = oneshot::channel();
            self.lock_pending().insert(message_id, response_tx);
            Some(response_rx)
        };
        node.on_message_received(
            self.address.clone(),
            one_way,
            message_id,
            interface_id,
            method_id,
            grain_id,
            args,
        );
        let Some(receiver) = receiver else {
            return Ok(Value::Null);
        };
        match receiver.await {
            Ok((ResponseKind::Normal, payload)) => Ok(payload),
            Ok((ResponseKind::Exception, payload)) => {
                Err(MessengerError::Remote(payload_text(payload)))
            }
            Ok((ResponseKind::Error, payload)) => {
                Err(MessengerError::RemoteError(payload_text(payload)))
            }
            Err(_) => Err(MessengerError::Send("response channel dropped".to_string())),
        }
    }

    async fn send_response(
        &self,
        _to: &NodeAddress,
        kind: ResponseKind,
        message_id: u64,
        payload: Value,
    ) -> Result<(), MessengerError> {
        let inject_failure = self
            .fail_responses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        self.lock_responses().push(ResponseRecord {
            kind,
            message_id,
            payload: payload.clone(),
            delivered: !inject_failure,
        });
        if inject_failure {
            return Err(MessengerError::Response(
                "injected response failure".to_string(),
            ));
        }
        if let Some(response_tx) = self.lock_pending().remove(&message_id) {
            let _ = response_tx.send((kind, payload));
        }
        Ok(())
    }
}

/// Locator pinning every grain to one address
pub struct StaticLocator {
    address: NodeAddress,
    hosting: Mutex<Option<Arc<dyn GrainObserver>>>,
}

impl StaticLocator {
    /// Create a locator answering `address` for every lookup
    pub fn new(address: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            address: NodeAddress::new(address),
            hosting: Mutex::new(None),
        })
    }

    /// Install a hosting facade to be registered at node start
    pub fn with_hosting_observer(self: Arc<Self>, observer: Arc<dyn GrainObserver>) -> Arc<Self> {
        *self
            .hosting
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
        self
    }
}

#[async_trait]
impl Locator for StaticLocator {
    async fn locate(&self, _reference: &GrainRef) -> Result<NodeAddress, LocateError> {
        Ok(self.address.clone())
    }

    fn hosting_observer(&self) -> Option<Arc<dyn GrainObserver>> {
        self.hosting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
