use futures_util::FutureExt;
use log::{debug, error, info};
use std::panic::AssertUnwindSafe;

use crate::core::connection::Connection;
use crate::core::server::SharedRelayServer;
use crate::error::RustyRelayError;
use crate::events::{BusinessEvent, EventSink};

// Drive one connection until it closes, then tear it down
pub async fn handle_connection(server: SharedRelayServer, mut conn: Connection) {
    let session = conn.session().clone();
    let protocol = session.protocol();
    info!("Client connected: {} ({}, {:?})", session.id(), protocol, session.peer());
    server.events().record(BusinessEvent::Connection { delta: 1, protocol });

    let read_loop = async {
        loop {
            let msg = match conn.read().await {
                Ok(Some(msg)) => msg,
                // Malformed frame: skip it
                Ok(None) => continue,
                Err(RustyRelayError::ConnectionClosed) => {
                    debug!("Session {} closed by peer", session.id());
                    break;
                }
                Err(e) => {
                    info!("Closing session {}: {}", session.id(), e);
                    break;
                }
            };
            if !server.dispatcher().dispatch(&session, msg).await {
                break;
            }
        }
    };

    if let Err(panic) = AssertUnwindSafe(read_loop).catch_unwind().await {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("Session {} task panicked: {}", session.id(), reason);
    }

    session.close().await;
    server.rooms().remove_all(&session).await;
    server.events().record(BusinessEvent::Connection { delta: -1, protocol });
    info!("Client disconnected: {}", session.id());
}
