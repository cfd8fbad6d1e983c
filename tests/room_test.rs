use std::sync::Arc;
use std::time::Duration;

use rusty_relay::core::message::Protocol;
use rusty_relay::core::room::RoomRegistry;
use rusty_relay::core::session::{Outbound, Session};
use rusty_relay::protocol::codec_for;

fn session() -> Arc<Session> {
    let (_peer, sink) = tokio::io::duplex(64);
    Session::new(
        codec_for(Protocol::Tcp, 4096),
        Outbound::stream(sink),
        None,
        Duration::from_millis(10),
    )
}

#[tokio::test]
async fn test_room_membership_basics() {
    let registry = RoomRegistry::new(16);
    let s = session();

    assert_eq!(registry.member_count("lobby").await, 0);
    registry.add("lobby", &s).await;
    assert!(registry.contains("lobby", s.id()).await);
    assert_eq!(registry.room_count().await, 1);

    registry.remove("lobby", &s).await;
    assert!(!registry.contains("lobby", s.id()).await);
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_rooms_under_concurrency() {
    let registry = Arc::new(RoomRegistry::new(8));
    let sessions: Vec<Arc<Session>> = (0..200).map(|_| session()).collect();

    let mut tasks = Vec::new();
    for (i, s) in sessions.iter().enumerate() {
        let registry = registry.clone();
        let s = s.clone();
        tasks.push(tokio::spawn(async move {
            let rid = format!("room-{}", i % 20);
            registry.add(&rid, &s).await;
            registry.add("shared", &s).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for r in 0..20 {
        assert_eq!(registry.member_count(&format!("room-{}", r)).await, 10);
    }
    assert_eq!(registry.member_count("shared").await, 200);
    assert_eq!(registry.room_count().await, 21);
    assert_eq!(registry.membership_count().await, 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_join_and_leave_lose_no_updates() {
    let registry = Arc::new(RoomRegistry::new(4));
    let stayers: Vec<Arc<Session>> = (0..50).map(|_| session()).collect();
    let leavers: Vec<Arc<Session>> = (0..50).map(|_| session()).collect();

    for s in &leavers {
        registry.add("busy", s).await;
    }

    let mut tasks = Vec::new();
    for s in stayers.iter().cloned() {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move { registry.add("busy", &s).await }));
    }
    for s in leavers.iter().cloned() {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move { registry.remove_all(&s).await }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(registry.member_count("busy").await, 50);
    for s in &stayers {
        assert!(registry.contains("busy", s.id()).await);
    }
    for s in &leavers {
        assert!(s.rooms().is_empty());
    }
}
