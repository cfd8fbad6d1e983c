//! Server configuration module
//! Handles listener addresses, timeouts and the publish routing table

use crate::constants::{
    BODY_LEN_LIMIT, DEFAULT_HOST, DEFAULT_PUB_TIMEOUT, DEFAULT_TCP_PORT, READ_TIMEOUT,
    ROOM_SHARDS, WRITE_TIMEOUT,
};
use crate::error::{Result, RustyRelayError};
use crate::protocol::frame::MAX_BODY_LIMIT;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Binary framed TCP listener
    pub tcp_addr: Option<String>,
    /// HTTP framed listener
    pub http_addr: Option<String>,
    /// Datagram listener
    pub udp_addr: Option<String>,
    /// Admin API (health, stats, push)
    pub admin_addr: Option<String>,
    /// Idle time after which a silent connection is reclaimed
    pub read_timeout: Duration,
    /// Budget for a single write before the message is dropped
    pub write_timeout: Duration,
    /// Maximum body length accepted in or emitted by a frame
    pub body_limit: usize,
    pub room_shards: usize,
    /// Fallback for routes whose timeout string does not parse
    pub default_pub_timeout: Duration,
    /// JSON publish routing table
    pub pubs_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_addr: Some(format!("{}:{}", DEFAULT_HOST, DEFAULT_TCP_PORT)),
            http_addr: None,
            udp_addr: None,
            admin_addr: None,
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            body_limit: BODY_LEN_LIMIT,
            room_shards: ROOM_SHARDS,
            default_pub_timeout: DEFAULT_PUB_TIMEOUT,
            pubs_path: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_addr(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ServerConfig {
    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let tcp_addr = match env::var("RUSTY_RELAY_TCP_ADDR") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().to_string()),
            Err(_) => defaults.tcp_addr,
        };
        let http_addr = env_addr("RUSTY_RELAY_HTTP_ADDR");
        let udp_addr = env_addr("RUSTY_RELAY_UDP_ADDR");
        let admin_addr = env_addr("RUSTY_RELAY_ADMIN_ADDR");

        let read_timeout = env_parse::<u64>("RUSTY_RELAY_READ_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.read_timeout);

        let write_timeout = env_parse::<u64>("RUSTY_RELAY_WRITE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.write_timeout);

        let body_limit = env_parse("RUSTY_RELAY_BODY_LIMIT").unwrap_or(defaults.body_limit);

        let room_shards = env_parse("RUSTY_RELAY_ROOM_SHARDS").unwrap_or(defaults.room_shards);

        let default_pub_timeout = env_parse::<u64>("RUSTY_RELAY_PUB_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.default_pub_timeout);

        let pubs_path = env_addr("RUSTY_RELAY_PUBS_PATH").map(PathBuf::from);

        let config = Self {
            tcp_addr,
            http_addr,
            udp_addr,
            admin_addr,
            read_timeout,
            write_timeout,
            body_limit,
            room_shards,
            default_pub_timeout,
            pubs_path,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tcp_addr.is_none() && self.http_addr.is_none() && self.udp_addr.is_none() {
            return Err(RustyRelayError::ConfigError(
                "At least one of RUSTY_RELAY_TCP_ADDR, RUSTY_RELAY_HTTP_ADDR or RUSTY_RELAY_UDP_ADDR must be set".to_string(),
            ));
        }
        if self.room_shards == 0 {
            return Err(RustyRelayError::ConfigError(
                "RUSTY_RELAY_ROOM_SHARDS must be greater than zero".to_string(),
            ));
        }
        if self.body_limit == 0 || self.body_limit > MAX_BODY_LIMIT {
            return Err(RustyRelayError::ConfigError(format!(
                "RUSTY_RELAY_BODY_LIMIT must be between 1 and {}",
                MAX_BODY_LIMIT
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(RustyRelayError::ConfigError(
                "RUSTY_RELAY_READ_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load the publish routing table, empty when no path is configured
    pub fn load_routes(&self) -> Result<RoutingTable> {
        match &self.pubs_path {
            Some(path) => RoutingTable::from_path(path),
            None => Ok(RoutingTable::default()),
        }
    }
}

/// HTTP verb used to deliver a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
}

/// How a sub-command's publishes reach their backend
#[derive(Debug, Clone, Deserialize)]
pub struct PubRoute {
    /// Resolution mode understood by the address resolver (`ip`, `dns`)
    pub addr_type: String,
    pub addr: String,
    #[serde(alias = "cgi")]
    pub path: String,
    /// Query-string template taking cmd, subcmd, uid, rid and escaped body
    pub params: String,
    /// Per-attempt timeout, e.g. `300ms`
    #[serde(default)]
    pub timeout: String,
    #[serde(default)]
    pub retry: u32,
    pub method: HttpMethod,
    /// Host header override
    #[serde(default)]
    pub host: String,
}

/// Read-only publish routing table keyed by sub-command
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    routes: HashMap<String, PubRoute>,
}

impl RoutingTable {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            RustyRelayError::ConfigError(format!(
                "Cannot read routing table {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn get(&self, subcmd: &str) -> Option<&PubRoute> {
        self.routes.get(subcmd)
    }

    pub fn insert(&mut self, subcmd: impl Into<String>, route: PubRoute) {
        self.routes.insert(subcmd.into(), route);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
