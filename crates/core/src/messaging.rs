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

//! Wire contracts: the Messenger and Locator seams
//!
//! ## Purpose
//! The runtime never talks to the network itself. Outbound invocations and
//! responses go through a `Messenger`, and placement of grains whose node is
//! unknown goes through a `Locator`. Both are supplied by the host; the
//! `testkit` module in `plexgrains-runtime` ships in-process versions.
//!
//! The messenger owns the pending-call table for two-way invocations,
//! including invocation timeouts; the runtime only drives its periodic
//! `timeout_cleanup` sweep.

use crate::grain::GrainObserver;
use crate::identity::{GrainId, NodeAddress};
use crate::reference::GrainRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The three response kinds a node may send back for a two-way call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    /// Successful completion; payload is the method result
    Normal,
    /// The user method (or activation) raised; payload is the error text
    Exception,
    /// Infrastructure refusal (queue full, observer gone, delivery gave up)
    Error,
}

/// Errors raised by the messenger
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    /// Outbound message could not be shipped
    #[error("send failed: {0}")]
    Send(String),

    /// A response could not be delivered back to the caller
    #[error("response delivery failed: {0}")]
    Response(String),

    /// The remote method raised an application exception
    #[error("remote exception: {0}")]
    Remote(String),

    /// The remote node answered with an infrastructure error response
    #[error("remote error: {0}")]
    RemoteError(String),
}

/// Errors raised by the locator
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    /// The placement lookup itself failed
    #[error("placement lookup failed: {0}")]
    Lookup(String),

    /// No node in the cluster can host the interface
    #[error("no node can host interface {0}")]
    Unplaceable(u32),
}

/// Errors surfaced to callers of an outbound invocation
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The reference has no bound runtime and no ambient runtime is set
    #[error("reference is not bound to a runtime")]
    NoRuntime,

    /// Placement lookup failed
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// Transport-level failure
    #[error(transparent)]
    Messenger(MessengerError),

    /// The remote method raised; carries the remote error text
    #[error("remote exception: {0}")]
    Remote(String),
}

impl From<MessengerError> for InvokeError {
    fn from(err: MessengerError) -> Self {
        match err {
            MessengerError::Remote(text) => InvokeError::Remote(text),
            other => InvokeError::Messenger(other),
        }
    }
}

/// Transport seam: ships invocations and responses between nodes
#[async_trait]
pub trait Messenger: Send + Sync {
    /// The address remote nodes use to reach this one
    fn node_address(&self) -> NodeAddress;

    /// Ship an invocation to `to`
    ///
    /// For two-way calls the returned future completes with the remote
    /// method's result once the response arrives (the messenger keeps the
    /// pending-call table). One-way calls complete as soon as the message is
    /// handed to the transport; the payload is `Value::Null`.
    async fn send_message(
        &self,
        to: &NodeAddress,
        one_way: bool,
        interface_id: u32,
        method_id: u32,
        grain_id: Option<GrainId>,
        args: Vec<Value>,
    ) -> Result<Value, MessengerError>;

    /// Deliver a response for an earlier inbound message
    async fn send_response(
        &self,
        to: &NodeAddress,
        kind: ResponseKind,
        message_id: u64,
        payload: Value,
    ) -> Result<(), MessengerError>;

    /// Expire pending two-way calls that overran their deadline
    ///
    /// Driven by the runtime on a short fixed period.
    fn timeout_cleanup(&self) {}
}

/// Placement seam: resolves a grain reference to the node hosting it
#[async_trait]
pub trait Locator: Send + Sync {
    /// Resolve the node address for `reference`
    ///
    /// The runtime does not cache the result on the reference; the locator
    /// may cache internally.
    async fn locate(&self, reference: &GrainRef) -> Result<NodeAddress, LocateError>;

    /// The locator's own remotely callable facade, if it has one
    ///
    /// Installed as an observer with the empty id at node start so peers can
    /// reach this node's placement service.
    fn hosting_observer(&self) -> Option<Arc<dyn GrainObserver>> {
        None
    }
}
