use futures_util::future::join_all;
use log::{debug, info};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::{RoutingTable, ServerConfig};
use crate::core::dispatcher::Dispatcher;
use crate::core::message::{Command, Message};
use crate::core::room::RoomRegistry;
use crate::events::{BusinessEvent, BusinessLogger, EventSink, ServerStats};
use crate::publish::{AddrResolver, DefaultResolver, HttpClient, PublishForwarder, ReqwestClient};

/// Backend-initiated message for every member of a room
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushRequest {
    pub rid: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub subcmd: u8,
    #[serde(default)]
    pub body: String,
    /// Skip sessions bound to this uid
    #[serde(default)]
    pub exclude_uid: Option<String>,
}

/// State shared by every listener of one process
pub struct RelayServer {
    config: ServerConfig,
    rooms: Arc<RoomRegistry>,
    dispatcher: Dispatcher,
    events: Arc<BusinessLogger>,
}

impl RelayServer {
    /// Server delivering publishes over plain HTTP with `ip`/`dns` resolution
    pub fn new(config: ServerConfig, routes: RoutingTable) -> Self {
        Self::with_backend(
            config,
            routes,
            Arc::new(ReqwestClient::new()),
            Arc::new(DefaultResolver),
        )
    }

    pub fn with_backend(
        config: ServerConfig,
        routes: RoutingTable,
        client: Arc<dyn HttpClient>,
        resolver: Arc<dyn AddrResolver>,
    ) -> Self {
        let rooms = Arc::new(RoomRegistry::new(config.room_shards));
        let events = Arc::new(BusinessLogger::new());
        let forwarder = PublishForwarder::new(
            routes,
            resolver,
            client,
            events.clone(),
            config.default_pub_timeout,
        );
        let dispatcher = Dispatcher::new(rooms.clone(), forwarder, events.clone());
        info!(
            "Relay server ready: {} room shards, {} publish routes",
            rooms.shard_count(),
            dispatcher.forwarder().routes().len()
        );

        Self {
            config,
            rooms,
            dispatcher,
            events,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn events(&self) -> &BusinessLogger {
        &self.events
    }

    /// Write a PUB message to every live member of the room
    ///
    /// Returns how many sessions accepted the write.
    pub async fn push_to_room(&self, push: PushRequest) -> usize {
        let members = self.rooms.members(&push.rid).await;
        let msg = Message::new(Command::Pub)
            .with_subcmd(push.subcmd)
            .with_uid(push.uid)
            .with_rid(push.rid.as_str())
            .with_body(push.body);

        let targets = members.into_iter().filter(|session| match &push.exclude_uid {
            Some(exclude) => session.uid().as_deref() != Some(exclude.as_str()),
            None => true,
        });
        let writes = targets.map(|session| {
            let msg = &msg;
            async move { session.write(msg).await }
        });
        let delivered = join_all(writes).await.into_iter().filter(|ok| *ok).count();

        debug!("Pushed to {} sessions in room {}", delivered, push.rid);
        self.events.record(BusinessEvent::Push {
            rid: push.rid,
            delivered,
        });
        delivered
    }

    pub async fn stats(&self) -> ServerStats {
        let memberships = self.rooms.membership_count().await;
        let rooms = self.rooms.room_count().await;
        self.events.snapshot(memberships, rooms)
    }
}

pub type SharedRelayServer = Arc<RelayServer>;
