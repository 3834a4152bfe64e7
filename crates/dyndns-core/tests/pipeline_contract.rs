//! Contract Test: Producer to Provider Pipeline
//!
//! Wires real producers, the dispatch queue and the reconciler together
//! against test doubles.
//!
//! Constraints verified:
//! - A push touches only the zones of its family's actions
//! - A repeated push produces no provider calls at all
//! - The poller only queries families with configured records
//! - The poller synthesizes IPv6 from the routed prefix when an interface
//!   id is configured
//! - A failed gateway query marks the poll status and is retried next tick

mod common;

use common::*;
use dyndns_core::dispatch::{self, BackpressurePolicy};
use dyndns_core::traits::RecordType;
use dyndns_core::{
    Action, Family, InterfaceId, Poller, PushListener, PushReport, Reconciler, RecordSets,
    StatusBoard,
};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

fn push_v4(ip: &str) -> PushReport {
    PushReport {
        v4: Some(ip.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn push_updates_only_the_matching_zone_once() {
    let provider = RecordingProvider::new();
    let engine = Reconciler::with_actions(
        Arc::new(provider.clone()),
        vec![
            Action::new("a.example.com", "zoneA", Family::V4),
            Action::new("b.example.com", "zoneB", Family::V6),
        ],
        &engine_config(),
    );
    let updates = engine.status();

    let (tx, rx) = dispatch::channel(dispatch::DEFAULT_CAPACITY, BackpressurePolicy::Block);
    let listener = PushListener::new(tx, None);
    tokio::spawn(engine.run(rx));

    listener.handle(&push_v4("203.0.113.5")).await.unwrap();
    settle().await;

    let writes = provider.writes();
    assert_eq!(writes.len(), 1);
    match &writes[0] {
        ProviderCall::Create { zone, record } => {
            assert_eq!(zone, "zoneA");
            assert_eq!(record.content, "203.0.113.5");
        }
        other => panic!("expected create, got {:?}", other),
    }
    assert!(provider.record_calls().iter().all(|c| c.zone() != Some("zoneB")));

    let calls_before = provider.record_calls().len();
    listener.handle(&push_v4("203.0.113.5")).await.unwrap();
    settle().await;
    assert_eq!(provider.record_calls().len(), calls_before);

    let board = StatusBoard {
        push: Some(listener.status()),
        poll: None,
        updates: Some(updates),
    };
    let report = board.report().await;
    assert!(report.is_healthy());
    assert!(report.updates[0].last.is_some());
    assert!(report.updates[1].last.is_none());
}

#[tokio::test]
async fn poller_skips_families_without_records() {
    let gateway = ScriptedGateway::new()
        .v4([Ok(Some(Ipv4Addr::new(203, 0, 113, 5)))])
        .v6([Ok(Some("2001:db8::1".parse().unwrap()))]);
    let (tx, mut rx) = dispatch::channel(4, BackpressurePolicy::Block);
    let mut poller = Poller::new(
        Arc::new(gateway.clone()),
        &RecordSets::from_lists("a.example.com", ""),
        None,
        tx,
        Duration::from_secs(300),
    );

    poller.poll_once().await;

    assert_eq!(gateway.v4_calls(), 1);
    assert_eq!(gateway.v6_calls(), 0);
    assert_eq!(gateway.prefix_calls(), 0);
    assert_eq!(rx.recv().await.map(|a| a.family()), Some(Family::V4));
}

#[tokio::test]
async fn poller_uses_prefix_when_interface_id_configured() {
    let gateway = ScriptedGateway::new()
        .v6([Ok(Some("2001:db8::ffff".parse().unwrap()))])
        .prefix([
            Ok(Some("2a02:8070:1234:5600::/56".parse().unwrap())),
            Ok(Some("2a02:8070:1234:7700::/56".parse().unwrap())),
        ]);
    let iid: InterfaceId = "::21f:3fff:fe12:3456".parse().unwrap();
    let (tx, mut rx) = dispatch::channel(4, BackpressurePolicy::Block);
    let mut poller = Poller::new(
        Arc::new(gateway.clone()),
        &RecordSets::from_lists("", "nas.example.com"),
        Some(iid),
        tx,
        Duration::from_secs(300),
    );

    poller.poll_once().await;
    poller.poll_once().await;
    poller.poll_once().await;

    assert_eq!(gateway.v6_calls(), 0);
    assert_eq!(gateway.prefix_calls(), 3);

    let first: Ipv6Addr = "2a02:8070:1234:5600:21f:3fff:fe12:3456".parse().unwrap();
    let second: Ipv6Addr = "2a02:8070:1234:7700:21f:3fff:fe12:3456".parse().unwrap();
    assert_eq!(rx.recv().await.map(|a| a.ip()), Some(first.into()));
    assert_eq!(rx.recv().await.map(|a| a.ip()), Some(second.into()));
    let mut third = tokio_test::task::spawn(rx.recv());
    tokio_test::assert_pending!(third.poll());
}

#[tokio::test]
async fn gateway_failure_marks_poll_status_and_recovers() {
    let gateway = ScriptedGateway::new().v4([
        Err("connection refused".to_string()),
        Ok(Some(Ipv4Addr::new(203, 0, 113, 5))),
    ]);
    let (tx, mut rx) = dispatch::channel(4, BackpressurePolicy::Block);
    let mut poller = Poller::new(
        Arc::new(gateway),
        &RecordSets::from_lists("a.example.com", ""),
        None,
        tx,
        Duration::from_secs(300),
    );
    let status = poller.status();

    let outcome = poller.poll_once().await;
    assert!(!outcome.succeeded);
    assert!(!status.snapshot().await.succeeded);

    let outcome = poller.poll_once().await;
    assert!(outcome.succeeded);
    assert_eq!(outcome.enqueued.len(), 1);
    assert!(status.snapshot().await.succeeded);
    assert!(rx.recv().await.is_some());
}

#[tokio::test]
async fn gateway_without_address_is_not_a_failure() {
    let gateway = ScriptedGateway::new().v6([Ok(None)]);
    let (tx, _rx) = dispatch::channel(4, BackpressurePolicy::Block);
    let mut poller = Poller::new(
        Arc::new(gateway),
        &RecordSets::from_lists("", "b.example.com"),
        None,
        tx,
        Duration::from_secs(300),
    );

    let outcome = poller.poll_once().await;
    assert!(outcome.succeeded);
    assert!(outcome.enqueued.is_empty());
}

#[tokio::test(start_paused = true)]
async fn poller_polls_immediately_then_per_interval() {
    let provider = RecordingProvider::new();
    let gateway = ScriptedGateway::new().v4([
        Ok(Some(Ipv4Addr::new(192, 0, 2, 1))),
        Ok(Some(Ipv4Addr::new(192, 0, 2, 1))),
        Ok(Some(Ipv4Addr::new(192, 0, 2, 2))),
    ]);
    let records = RecordSets::from_lists("a.example.com", "");
    let engine = Reconciler::with_actions(
        Arc::new(provider.clone()),
        vec![Action::new("a.example.com", "zoneA", Family::V4)],
        &engine_config(),
    );

    let (tx, rx) = dispatch::channel(4, BackpressurePolicy::Block);
    let poller = Poller::new(
        Arc::new(gateway.clone()),
        &records,
        None,
        tx,
        Duration::from_secs(300),
    );
    tokio::spawn(engine.run(rx));
    tokio::spawn(poller.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gateway.v4_calls(), 1);
    assert_eq!(provider.writes().len(), 1);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(gateway.v4_calls(), 2);
    assert_eq!(provider.writes().len(), 1, "unchanged address is gated by the poller");

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(gateway.v4_calls(), 3);

    let records = provider.records("zoneA", RecordType::A, "a.example.com");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content, "192.0.2.2");
}
