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

//! Idle-activation eviction under a hand-driven clock: idle grains are
//! deactivated through the full hook chain, recently used grains survive,
//! and stateless-worker pools rotate instead of losing their entry.


use plexgrains_core::ManualClock;
use serde_json::json;
use std::sync::Arc;
use test_helpers::*;

const MINUTE: i64 = 60 * 1_000;

struct EvictionFixture {
    node: Arc<plexgrains_runtime::GrainNode>,
    clock: Arc<ManualClock>,
    telemetry: Arc<Telemetry>,
}

async fn eviction_fixture() -> EvictionFixture {
    let telemetry = Telemetry::new();
    let clock = Arc::new(ManualClock::new(1_000_000));
    let (builder, messenger) = test_node_builder(&telemetry);
    let builder = builder
        .with_clock(clock.clone())
        .add_provider(Arc::new(RecordingLifetime {
            tag: "hooks",
            telemetry: Arc::clone(&telemetry),
        }));
    let node = start_node(builder, &messenger).await;
    EvictionFixture {
        node,
        clock,
        telemetry,
    }
}

#[tokio::test]
async fn test_idle_singleton_is_deactivated_and_recreated() {
    let fixture = eviction_fixture().await;
    let reference = fixture
        .node
        .get_reference(TEST_INTERFACE, Some("x".to_string()))
        .unwrap();

    assert_eq!(reference.invoke(METHOD_COUNT, vec![]).await.unwrap(), json!(1));
    assert_eq!(fixture.node.local_grain_count(), 1);

    // idle for 11 minutes (TTL is 10)
    fixture.clock.advance(11 * MINUTE);
    fixture.node.evict_idle(true).await;

    let events = fixture.telemetry.events();
    assert!(events.iter().any(|e| e == "pre_deactivation:hooks"));
    assert!(events.iter().any(|e| e == "deactivate"));
    assert!(events.iter().any(|e| e == "post_deactivation:hooks"));
    assert_eq!(fixture.node.local_grain_count(), 0);

    // the next message observes a fresh instance: counter restarts at 1
    assert_eq!(reference.invoke(METHOD_COUNT, vec![]).await.unwrap(), json!(1));
    assert_eq!(fixture.telemetry.constructed(), 2);

    fixture.node.stop().await.unwrap();
}

#[tokio::test]
async fn test_eviction_is_conservative_for_recent_activity() {
    let fixture = eviction_fixture().await;
    let reference = fixture
        .node
        .get_reference(TEST_INTERFACE, Some("warm".to_string()))
        .unwrap();

    assert_eq!(reference.invoke(METHOD_COUNT, vec![]).await.unwrap(), json!(1));

    // only 5 minutes idle: under the 10-minute TTL
    fixture.clock.advance(5 * MINUTE);
    fixture.node.evict_idle(true).await;

    assert!(!fixture.telemetry.events().iter().any(|e| e == "deactivate"));
    assert_eq!(fixture.node.local_grain_count(), 1);
    // same instance, counter continues
    assert_eq!(reference.invoke(METHOD_COUNT, vec![]).await.unwrap(), json!(2));
    assert_eq!(fixture.telemetry.constructed(), 1);

    fixture.node.stop().await.unwrap();
}

#[tokio::test]
async fn test_worker_pool_drops_cold_activations_but_keeps_entry() {
    let fixture = eviction_fixture().await;
    let reference = fixture
        .node
        .get_reference(WORKER_INTERFACE, Some("pool".to_string()))
        .unwrap();

    assert!(reference
        .invoke(METHOD_SLEEP_IDENTIFY, vec![json!(1)])
        .await
        .is_ok());
    assert_eq!(fixture.node.local_grain_count(), 1);

    fixture.clock.advance(11 * MINUTE);
    fixture.node.evict_idle(true).await;

    // activations were deactivated, but the pool entry survives
    assert!(fixture.telemetry.events().iter().any(|e| e == "deactivate"));
    assert_eq!(fixture.node.local_grain_count(), 1);

    // the pool refills on the next call
    assert!(reference
        .invoke(METHOD_SLEEP_IDENTIFY, vec![json!(1)])
        .await
        .is_ok());
    assert_eq!(fixture.telemetry.constructed(), 2);

    fixture.node.stop().await.unwrap();
}
