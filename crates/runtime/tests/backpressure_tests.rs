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

//! Queue-depth back-pressure: a saturated per-identity queue refuses the
//! offer, answers two-way callers with "Execution refused", counts the
//! refusal, and stays silent for one-way messages.


use plexgrains_core::{InvokeError, MessengerError, NodeAddress, RuntimeConfig};
use serde_json::json;
use test_helpers::*;

fn small_queue_config() -> RuntimeConfig {
    RuntimeConfig {
        max_queue_size: 4,
        ..RuntimeConfig::default()
    }
}

#[tokio::test]
async fn test_saturated_queue_refuses_two_way_calls() {
    let telemetry = Telemetry::new();
    let (builder, messenger) = test_node_builder(&telemetry);
    let node = start_node(builder.with_config(small_queue_config()), &messenger).await;

    let reference = node
        .get_reference(TEST_INTERFACE, Some("pressured".to_string()))
        .unwrap();

    // first call occupies the grain; wait until its method is running so
    // the pending queue is empty and the remaining capacity is exactly 4
    let first = {
        let reference = reference.clone();
        tokio::spawn(async move { reference.invoke(METHOD_SLEEP_IDENTIFY, vec![json!(300)]).await })
    };
    wait_until(|| telemetry.events().iter().any(|e| e == "sleep_enter")).await;

    let mut waiters = vec![first];
    for _ in 0..9 {
        let reference = reference.clone();
        waiters.push(tokio::spawn(async move {
            reference.invoke(METHOD_SLEEP_IDENTIFY, vec![json!(1)]).await
        }));
    }

    let mut succeeded = 0;
    let mut refused = 0;
    for waiter in waiters {
        match waiter.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(InvokeError::Messenger(MessengerError::RemoteError(text))) => {
                assert_eq!(text, "Execution refused");
                refused += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // 1 running + 4 queued make it through; the other 5 are refused
    assert_eq!(succeeded, 5);
    assert_eq!(refused, 5);
    assert_eq!(node.stats().refused_executions, 5);

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_one_way_refusal_is_silent_but_counted() {
    let telemetry = Telemetry::new();
    let (builder, messenger) = test_node_builder(&telemetry);
    let node = start_node(
        builder.with_config(RuntimeConfig {
            max_queue_size: 1,
            ..RuntimeConfig::default()
        }),
        &messenger,
    )
    .await;

    let reference = node
        .get_reference(TEST_INTERFACE, Some("silent".to_string()))
        .unwrap();
    let first = {
        let reference = reference.clone();
        tokio::spawn(async move { reference.invoke(METHOD_SLEEP_IDENTIFY, vec![json!(200)]).await })
    };
    wait_until(|| telemetry.events().iter().any(|e| e == "sleep_enter")).await;

    // fill the single queue slot, then overflow with a one-way message
    node.on_message_received(
        NodeAddress::new("peer"),
        true,
        900,
        TEST_INTERFACE,
        METHOD_COUNT,
        Some("silent".to_string()),
        vec![],
    );
    let responses_before = messenger.response_log().len();
    node.on_message_received(
        NodeAddress::new("peer"),
        true,
        901,
        TEST_INTERFACE,
        METHOD_COUNT,
        Some("silent".to_string()),
        vec![],
    );

    wait_until(|| node.stats().refused_executions == 1).await;
    // no response was sent for the dropped one-way message
    assert_eq!(messenger.response_log().len(), responses_before);

    first.await.unwrap().unwrap();
    node.stop().await.unwrap();
}
