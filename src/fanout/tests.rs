use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tungstenite::protocol::Message as WsMessage;

use super::{FanOut, PushReport};
use crate::connection::ConnState;
use crate::connection::test_support::{Peer, pair};
use crate::registry::Registry;
use crate::utils::Error;

fn fanout() -> FanOut {
    FanOut::new(Arc::new(Registry::new()))
}

async fn recv_text(peer: &mut Peer) -> String {
    match tokio::time::timeout(Duration::from_secs(1), peer.next()).await {
        Ok(Some(Ok(WsMessage::Text(text)))) => text.as_str().to_string(),
        other => panic!("Expected a text message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_push_delivers_exact_payload() {
    let fanout = fanout();
    let (a, mut peer_a) = pair().await;
    fanout.registry().bind("u1", "alerts", &a).unwrap();

    let delivered = fanout.push("u1", "alerts", "hi").await.unwrap();

    assert_eq!(delivered, 1);
    assert_eq!(recv_text(&mut peer_a).await, "hi");
}

#[tokio::test]
async fn test_push_without_subscribers_is_zero() {
    let fanout = fanout();
    assert_eq!(fanout.push("u1", "alerts", "hi").await.unwrap(), 0);
}

#[tokio::test]
async fn test_push_rejects_empty_arguments() {
    let fanout = fanout();
    for (identity, topic, payload) in [("", "t", "m"), ("u", "", "m"), ("u", "t", "")] {
        assert!(matches!(
            fanout.push(identity, topic, payload).await,
            Err(Error::InvalidArgument(_))
        ));
    }
}

#[tokio::test]
async fn test_push_only_reaches_matching_topic() {
    let fanout = fanout();
    let (a, mut peer_a) = pair().await;
    let (b, mut peer_b) = pair().await;
    fanout.registry().bind("u1", "alerts", &a).unwrap();
    fanout.registry().bind("u1", "updates", &b).unwrap();

    assert_eq!(fanout.push("u1", "updates", "new").await.unwrap(), 1);
    assert_eq!(recv_text(&mut peer_b).await, "new");

    assert!(
        tokio::time::timeout(Duration::from_millis(50), peer_a.next())
            .await
            .is_err(),
        "connection bound to another topic must not receive the push"
    );
}

#[tokio::test]
async fn test_push_evicts_broken_connection_and_continues() {
    let fanout = fanout();
    let (a, peer_a) = pair().await;
    let (b, mut peer_b) = pair().await;
    fanout.registry().bind("u1", "alerts", &a).unwrap();
    fanout.registry().bind("u1", "alerts", &b).unwrap();

    // A's stream goes away out of band
    drop(peer_a);

    let report = fanout.push_report("u1", "alerts", "x").await.unwrap();
    assert_eq!(
        report,
        PushReport {
            matched: 2,
            delivered: 1,
            evicted: 1
        }
    );
    assert_eq!(recv_text(&mut peer_b).await, "x");

    let left = fanout.registry().filter_connections("u1", "alerts").unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id(), b.id());
    assert_eq!(a.state(), ConnState::Closed);
}

#[tokio::test]
async fn test_push_when_every_write_fails_is_zero_without_error() {
    let fanout = fanout();
    let (a, peer_a) = pair().await;
    fanout.registry().bind("u1", "alerts", &a).unwrap();
    drop(peer_a);

    assert_eq!(fanout.push("u1", "alerts", "x").await.unwrap(), 0);
    assert_eq!(fanout.registry().identity_count(), 0);
}

#[tokio::test]
async fn test_push_evicts_connection_closed_elsewhere() {
    let fanout = fanout();
    let (a, _peer_a) = pair().await;
    fanout.registry().bind("u1", "alerts", &a).unwrap();
    a.close().await.unwrap();

    let report = fanout.push_report("u1", "alerts", "x").await.unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(report.evicted, 1);
    assert!(fanout.registry().find_connection(a.id().as_str()).is_none());
}

#[tokio::test]
async fn test_drop_closes_matching_connections() {
    let fanout = fanout();
    let (a, _peer_a) = pair().await;
    let (b, _peer_b) = pair().await;
    let (c, _peer_c) = pair().await;
    fanout.registry().bind("u1", "alerts", &a).unwrap();
    fanout.registry().bind("u1", "updates", &a).unwrap();
    fanout.registry().bind("u1", "updates", &b).unwrap();
    fanout.registry().bind("u2", "alerts", &c).unwrap();

    let dropped = fanout.drop("u1", "").await.unwrap();

    assert_eq!(dropped, 2);
    assert_eq!(a.state(), ConnState::Closed);
    assert_eq!(b.state(), ConnState::Closed);
    assert!(c.is_open());
    assert!(fanout.registry().filter_connections("u1", "").unwrap().is_empty());
    assert_eq!(fanout.registry().filter_connections("u2", "").unwrap().len(), 1);
}

#[tokio::test]
async fn test_drop_by_topic() {
    let fanout = fanout();
    let (a, _peer_a) = pair().await;
    let (b, _peer_b) = pair().await;
    fanout.registry().bind("u1", "alerts", &a).unwrap();
    fanout.registry().bind("u1", "updates", &b).unwrap();

    assert_eq!(fanout.drop("u1", "alerts").await.unwrap(), 1);
    assert_eq!(a.state(), ConnState::Closed);
    assert!(b.is_open());
    assert_eq!(fanout.drop("u1", "alerts").await.unwrap(), 0);
}

#[tokio::test]
async fn test_drop_rejects_empty_identity() {
    let fanout = fanout();
    assert!(matches!(
        fanout.drop("", "alerts").await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pushes_to_one_connection() {
    let fanout = fanout();
    let (a, mut peer_a) = pair().await;
    fanout.registry().bind("u1", "alerts", &a).unwrap();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let fanout = fanout.clone();
            tokio::spawn(async move { fanout.push("u1", "alerts", &format!("m{i}")).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    let mut received = Vec::new();
    for _ in 0..20 {
        received.push(recv_text(&mut peer_a).await);
    }
    received.sort();
    let mut expected: Vec<_> = (0..20).map(|i| format!("m{i}")).collect();
    expected.sort();
    assert_eq!(received, expected);
}
