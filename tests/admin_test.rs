use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, DuplexStream};

use rusty_relay::config::{RoutingTable, ServerConfig};
use rusty_relay::core::message::{Command, Message, Protocol};
use rusty_relay::core::server::{RelayServer, SharedRelayServer};
use rusty_relay::core::session::{Outbound, Session};
use rusty_relay::handlers::admin_routes;
use rusty_relay::protocol::{codec_for, Codec, TcpCodec};

fn server() -> SharedRelayServer {
    Arc::new(RelayServer::new(ServerConfig::default(), RoutingTable::default()))
}

fn member(uid: &str) -> (Arc<Session>, DuplexStream) {
    let (peer, sink) = tokio::io::duplex(4096);
    let session = Session::new(
        codec_for(Protocol::Tcp, 4096),
        Outbound::stream(sink),
        None,
        Duration::from_millis(100),
    );
    session.bind(uid, "");
    (session, peer)
}

#[tokio::test]
async fn test_stats_route() {
    let server = server();
    let (s, _peer) = member("u");
    server.rooms().add("a", &s).await;

    let res = warp::test::request()
        .method("GET")
        .path("/stats")
        .reply(&admin_routes(server))
        .await;
    assert_eq!(res.status(), 200);

    let stats: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(stats["rooms"], 1);
    assert_eq!(stats["room_memberships"], 1);
    assert_eq!(stats["connections"], 0);
    assert!(stats["started_at"].is_string());
}

#[tokio::test]
async fn test_push_route_fans_out() {
    let server = server();
    let (alice, mut alice_peer) = member("alice");
    let (bob, _bob_peer) = member("bob");
    server.rooms().add("room", &alice).await;
    server.rooms().add("room", &bob).await;

    let res = warp::test::request()
        .method("POST")
        .path("/push")
        .json(&json!({ "rid": "room", "subcmd": 9, "body": "hello", "exclude_uid": "bob" }))
        .reply(&admin_routes(server.clone()))
        .await;
    assert_eq!(res.status(), 200);
    let reply: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(reply["delivered"], 1);

    let expected = TcpCodec::new(4096)
        .encode(
            &Message::new(Command::Pub)
                .with_subcmd(9)
                .with_rid("room")
                .with_body("hello"),
        )
        .unwrap();
    let mut received = vec![0u8; expected.len()];
    alice_peer.read_exact(&mut received).await.unwrap();
    assert_eq!(received, expected);
    assert_eq!(server.stats().await.pushes, 1);
}

#[tokio::test]
async fn test_push_requires_room_id() {
    let res = warp::test::request()
        .method("POST")
        .path("/push")
        .json(&json!({ "body": "hello" }))
        .reply(&admin_routes(server()))
        .await;
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let res = warp::test::request()
        .method("GET")
        .path("/nope")
        .reply(&admin_routes(server()))
        .await;
    assert_eq!(res.status(), 404);
}
