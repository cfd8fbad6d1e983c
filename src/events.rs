//! Business event records
//!
//! Every event is a `(category, detail)` pair written to the `busi` log
//! target, e.g. `rusr,1,room42,alice`. The default sink also keeps the
//! counters behind the admin stats route.

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::constants::{BUSI_CONN, BUSI_PUB, BUSI_PUSH, BUSI_RUSR};
use crate::core::message::Protocol;

/// Target used for business log lines
pub const BUSI_TARGET: &str = "busi";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessEvent {
    /// A connection opened (`+1`) or closed (`-1`)
    Connection { delta: i8, protocol: Protocol },
    /// A session entered (`+1`) or left (`-1`) a room
    RoomUser { delta: i8, rid: String, uid: String },
    Publish { subcmd: u8, delivered: bool },
    Push { rid: String, delivered: usize },
}

impl BusinessEvent {
    pub fn category(&self) -> &'static str {
        match self {
            BusinessEvent::Connection { .. } => BUSI_CONN,
            BusinessEvent::RoomUser { .. } => BUSI_RUSR,
            BusinessEvent::Publish { .. } => BUSI_PUB,
            BusinessEvent::Push { .. } => BUSI_PUSH,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            BusinessEvent::Connection { delta, protocol } => format!("{},{}", delta, protocol),
            BusinessEvent::RoomUser { delta, rid, uid } => format!("{},{},{}", delta, rid, uid),
            BusinessEvent::Publish { subcmd, delivered } => {
                format!("{},{}", subcmd, if *delivered { "ok" } else { "err" })
            }
            BusinessEvent::Push { rid, delivered } => format!("{},{}", rid, delivered),
        }
    }
}

/// Consumer of business events
pub trait EventSink: Send + Sync {
    fn record(&self, event: BusinessEvent);
}

pub type SharedEventSink = Arc<dyn EventSink>;

/// Counters exposed by the admin stats route
#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub connections: u64,
    pub room_memberships: usize,
    pub rooms: usize,
    pub publishes: u64,
    pub publish_failures: u64,
    pub pushes: u64,
    pub started_at: DateTime<Utc>,
}

/// Logs every event on the `busi` target and tallies them
#[derive(Debug)]
pub struct BusinessLogger {
    connections: AtomicI64,
    publishes: AtomicU64,
    publish_failures: AtomicU64,
    pushes: AtomicU64,
    started_at: DateTime<Utc>,
}

impl BusinessLogger {
    pub fn new() -> Self {
        Self {
            connections: AtomicI64::new(0),
            publishes: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            pushes: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn open_connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed).max(0) as u64
    }

    /// Counter snapshot; room figures come from the registry
    pub fn snapshot(&self, room_memberships: usize, rooms: usize) -> ServerStats {
        ServerStats {
            connections: self.open_connections(),
            room_memberships,
            rooms,
            publishes: self.publishes.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            pushes: self.pushes.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }
}

impl Default for BusinessLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BusinessLogger {
    fn record(&self, event: BusinessEvent) {
        match &event {
            BusinessEvent::Connection { delta, .. } => {
                self.connections.fetch_add(i64::from(*delta), Ordering::Relaxed);
            }
            BusinessEvent::RoomUser { .. } => {}
            BusinessEvent::Publish { delivered, .. } => {
                self.publishes.fetch_add(1, Ordering::Relaxed);
                if !delivered {
                    self.publish_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            BusinessEvent::Push { .. } => {
                self.pushes.fetch_add(1, Ordering::Relaxed);
            }
        }
        info!(target: BUSI_TARGET, "{},{}", event.category(), event.detail());
    }
}
