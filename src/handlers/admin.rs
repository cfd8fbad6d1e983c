//! Admin HTTP surface: health, stats and backend push

use log::info;
use serde_json::json;
use std::convert::Infallible;
use warp::{Filter, Rejection, Reply};

use crate::core::server::{PushRequest, SharedRelayServer};

/// Request size allowed for a push carrying a `body_limit` sized body
///
/// Leaves room for JSON escaping of the body and the envelope fields.
fn push_json_limit(body_limit: usize) -> u64 {
    (body_limit as u64) * 6 + 1024
}

/// All admin routes
pub fn admin_routes(
    server: SharedRelayServer,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "OK");

    let stats = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_server(server.clone()))
        .and_then(handle_stats);

    let json_limit = push_json_limit(server.config().body_limit);
    let push = warp::path("push")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(json_limit))
        .and(warp::body::json())
        .and(with_server(server))
        .and_then(handle_push);

    health.or(stats).or(push)
}

fn with_server(
    server: SharedRelayServer,
) -> impl Filter<Extract = (SharedRelayServer,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

async fn handle_stats(server: SharedRelayServer) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&server.stats().await))
}

async fn handle_push(push: PushRequest, server: SharedRelayServer) -> Result<impl Reply, Infallible> {
    if push.body.len() > server.config().body_limit {
        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": "body too large" })),
            warp::http::StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }

    info!("Admin push to room {}", push.rid);
    let delivered = server.push_to_room(push).await;
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "delivered": delivered })),
        warp::http::StatusCode::OK,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RoutingTable, ServerConfig};
    use crate::core::server::RelayServer;
    use std::sync::Arc;

    fn server() -> SharedRelayServer {
        Arc::new(RelayServer::new(ServerConfig::default(), RoutingTable::default()))
    }

    #[tokio::test]
    async fn test_health() {
        let res = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&admin_routes(server()))
            .await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), "OK");
    }

    #[tokio::test]
    async fn test_push_oversized_body() {
        let mut config = ServerConfig::default();
        config.body_limit = 4;
        let server = Arc::new(RelayServer::new(config, RoutingTable::default()));

        let res = warp::test::request()
            .method("POST")
            .path("/push")
            .json(&json!({ "rid": "r", "body": "too long" }))
            .reply(&admin_routes(server))
            .await;
        assert_eq!(res.status(), 413);
    }

    #[tokio::test]
    async fn test_push_limit_follows_configured_body_limit() {
        let mut config = ServerConfig::default();
        config.body_limit = 20_000;
        let server = Arc::new(RelayServer::new(config, RoutingTable::default()));

        let res = warp::test::request()
            .method("POST")
            .path("/push")
            .json(&json!({ "rid": "r", "body": "x".repeat(19_000) }))
            .reply(&admin_routes(server))
            .await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), r#"{"delivered":0}"#);
    }
}
