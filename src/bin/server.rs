use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use rusty_relay::config::ServerConfig;
use rusty_relay::core::listener::{StreamListener, UdpListener};
use rusty_relay::core::message::Protocol;
use rusty_relay::core::server::{RelayServer, SharedRelayServer};
use rusty_relay::error::{Result, RustyRelayError};
use rusty_relay::handlers::admin_routes;

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    if let Err(e) = run().await {
        error!("Server failed to start: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = ServerConfig::from_env()?;
    let routes = config.load_routes()?;

    info!(
        "Configuration: tcp={:?}, http={:?}, udp={:?}, admin={:?}, body_limit={}",
        config.tcp_addr, config.http_addr, config.udp_addr, config.admin_addr, config.body_limit
    );

    let server: SharedRelayServer = Arc::new(RelayServer::new(config.clone(), routes));

    // Bind everything before serving so a bad address fails startup
    if let Some(addr) = &config.tcp_addr {
        let listener = StreamListener::bind(addr, Protocol::Tcp, server.clone()).await?;
        tokio::spawn(listener.run());
    }
    if let Some(addr) = &config.http_addr {
        let listener = StreamListener::bind(addr, Protocol::Http, server.clone()).await?;
        tokio::spawn(listener.run());
    }
    if let Some(addr) = &config.udp_addr {
        let listener = UdpListener::bind(addr, server.clone()).await?;
        tokio::spawn(listener.run());
    }
    if let Some(addr) = &config.admin_addr {
        let addr: SocketAddr = addr.parse().map_err(|e| {
            RustyRelayError::ConfigError(format!(
                "Invalid admin address {}: {}",
                addr, e
            ))
        })?;
        let (bound, serving) = warp::serve(admin_routes(server.clone()))
            .try_bind_ephemeral(addr)
            .map_err(|e| {
                RustyRelayError::ConfigError(format!(
                    "Cannot bind admin API to {}: {}",
                    addr, e
                ))
            })?;
        info!("Admin API listening on {}", bound);
        tokio::spawn(serving);
    }

    info!("Rusty Relay running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
