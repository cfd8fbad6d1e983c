use async_trait::async_trait;
use std::net::SocketAddr;

use crate::error::{Result, RustyRelayError};

/// Turns a route's address into a `host:port` authority
#[async_trait]
pub trait AddrResolver: Send + Sync {
    async fn resolve(&self, addr_type: &str, addr: &str) -> Result<String>;
}

/// Understands `ip` (a literal `ip:port`) and `dns` (`host:port` looked up
/// through the system resolver, first address wins)
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

#[async_trait]
impl AddrResolver for DefaultResolver {
    async fn resolve(&self, addr_type: &str, addr: &str) -> Result<String> {
        match addr_type {
            "ip" => addr
                .parse::<SocketAddr>()
                .map(|a| a.to_string())
                .map_err(|e| RustyRelayError::ResolveError(format!("{}: {}", addr, e))),
            "dns" => {
                let mut addrs = tokio::net::lookup_host(addr)
                    .await
                    .map_err(|e| RustyRelayError::ResolveError(format!("{}: {}", addr, e)))?;
                addrs
                    .next()
                    .map(|a| a.to_string())
                    .ok_or_else(|| RustyRelayError::ResolveError(format!("{}: no addresses", addr)))
            }
            other => Err(RustyRelayError::ResolveError(format!(
                "unknown addr_type {:?}",
                other
            ))),
        }
    }
}
