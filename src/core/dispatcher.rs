//! Command state machine run for every decoded message

use log::{debug, warn};
use std::sync::Arc;

use crate::core::message::{Command, Message};
use crate::core::room::RoomRegistry;
use crate::core::session::Session;
use crate::events::{BusinessEvent, SharedEventSink};
use crate::publish::PublishForwarder;

/// Routes client commands to the room registry or the publish forwarder
pub struct Dispatcher {
    rooms: Arc<RoomRegistry>,
    forwarder: PublishForwarder,
    events: SharedEventSink,
}

impl Dispatcher {
    pub fn new(rooms: Arc<RoomRegistry>, forwarder: PublishForwarder, events: SharedEventSink) -> Self {
        Self {
            rooms,
            forwarder,
            events,
        }
    }

    pub fn forwarder(&self) -> &PublishForwarder {
        &self.forwarder
    }

    /// Apply one message on behalf of `session`
    ///
    /// Returns whether the connection should keep reading. No command
    /// currently ends a connection.
    pub async fn dispatch(&self, session: &Arc<Session>, mut msg: Message) -> bool {
        match msg.cmd {
            Command::Ping => {
                debug!("PING from session {}", session.id());
            }
            Command::Enter => {
                // One identity per connection: a new uid drops the old memberships
                if session.uid().as_deref() != Some(msg.uid.as_str()) {
                    self.rooms.remove_all(session).await;
                }
                session.bind(&msg.uid, &msg.misc);
                self.rooms.add(&msg.rid, session).await;
                self.events.record(BusinessEvent::RoomUser {
                    delta: 1,
                    rid: msg.rid,
                    uid: msg.uid,
                });
            }
            Command::Leave => {
                self.rooms.remove(&msg.rid, session).await;
                self.events.record(BusinessEvent::RoomUser {
                    delta: -1,
                    rid: msg.rid,
                    uid: session.uid().unwrap_or_default(),
                });
            }
            Command::Pub => {
                debug!("PUB from session {}: {:?}", session.id(), msg);
                if self.forwarder.forward(&mut msg).await.should_reply() {
                    session.write(&msg).await;
                }
            }
            Command::Error | Command::Unknown(_) => {
                warn!("Unexpected command {} from session {}", msg.cmd, session.id());
            }
        }
        true
    }
}
