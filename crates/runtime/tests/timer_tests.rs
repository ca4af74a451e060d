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

//! Repeating per-grain timers: ticks fire under the grain's serializer
//! slot and cancellation is cooperative.


use plexgrains_core::GrainIdentity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::*;

#[tokio::test]
async fn test_timer_fires_repeatedly_until_cancelled() {
    let telemetry = Telemetry::new();
    let (builder, messenger) = test_node_builder(&telemetry);
    let node = start_node(builder, &messenger).await;

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let handle = node.register_timer(
        GrainIdentity::new(TEST_INTERFACE, Some("ticking".to_string())),
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }),
        Duration::from_millis(20),
        Duration::from_millis(30),
    );

    wait_until(|| ticks.load(Ordering::SeqCst) >= 3).await;
    handle.cancel();
    assert!(handle.is_cancelled());

    // an already queued tick may still land once, but the timer stops
    let after_cancel = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(ticks.load(Ordering::SeqCst) <= after_cancel + 1);

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_timer_errors_do_not_stop_the_timer() {
    let telemetry = Telemetry::new();
    let (builder, messenger) = test_node_builder(&telemetry);
    let node = start_node(builder, &messenger).await;

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let handle = node.register_timer(
        GrainIdentity::new(TEST_INTERFACE, Some("flaky".to_string())),
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                let tick = counter.fetch_add(1, Ordering::SeqCst);
                if tick == 0 {
                    Err("first tick fails".into())
                } else {
                    Ok(())
                }
            })
        }),
        Duration::from_millis(10),
        Duration::from_millis(20),
    );

    // the failing first tick does not cancel subsequent ones
    wait_until(|| ticks.load(Ordering::SeqCst) >= 3).await;
    handle.cancel();

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_timer_ticks_serialize_with_inbound_messages() {
    let telemetry = Telemetry::new();
    let (builder, messenger) = test_node_builder(&telemetry);
    let node = start_node(builder, &messenger).await;

    let identity = GrainIdentity::new(TEST_INTERFACE, Some("shared-slot".to_string()));
    let reference = node
        .get_reference(TEST_INTERFACE, Some("shared-slot".to_string()))
        .unwrap();
    // occupy the slot with a slow method, then fire a timer at the same key
    let slow = {
        let reference = reference.clone();
        tokio::spawn(async move {
            reference
                .invoke(METHOD_SLEEP_IDENTIFY, vec![serde_json::json!(100)])
                .await
        })
    };
    wait_until(|| telemetry.events().iter().any(|e| e == "sleep_enter")).await;

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let handle = node.register_timer(
        identity,
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }),
        Duration::from_millis(1),
        Duration::from_millis(10),
    );

    // the tick waits behind the in-flight method
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    slow.await.unwrap().unwrap();
    wait_until(|| ticks.load(Ordering::SeqCst) >= 1).await;

    handle.cancel();
    node.stop().await.unwrap();
}
