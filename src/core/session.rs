//! Shared per-connection state: identity, room memberships and the write path

use log::{debug, warn};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::core::message::{Message, Protocol};
use crate::error::{Result, RustyRelayError};
use crate::protocol::SharedCodec;

/// Who a connection currently speaks for
#[derive(Debug, Clone, Default)]
pub struct Identity {
    /// Unset until the first ENTER
    pub uid: Option<String>,
    pub misc: String,
    pub rooms: HashSet<String>,
}

/// Where replies and pushes for a session are written
pub enum Outbound {
    Stream(Mutex<Box<dyn AsyncWrite + Send + Unpin>>),
    Datagram { socket: Arc<UdpSocket>, peer: SocketAddr },
}

impl Outbound {
    pub fn stream<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Outbound::Stream(Mutex::new(Box::new(writer)))
    }

    async fn send(&self, frame: &[u8]) -> Result<()> {
        match self {
            Outbound::Stream(writer) => {
                let mut writer = writer.lock().await;
                writer.write_all(frame).await?;
                writer.flush().await?;
            }
            Outbound::Datagram { socket, peer } => {
                socket.send_to(frame, *peer).await?;
            }
        }
        Ok(())
    }
}

/// Server-side view of one client connection
///
/// Identity is written only by the task running this session's loop; other
/// tasks (fan-out, stats) read snapshots.
pub struct Session {
    id: Uuid,
    protocol: Protocol,
    peer: Option<SocketAddr>,
    identity: RwLock<Identity>,
    outbound: Outbound,
    codec: SharedCodec,
    write_timeout: Duration,
    closed: AtomicBool,
}

impl Session {
    pub fn new(
        codec: SharedCodec,
        outbound: Outbound,
        peer: Option<SocketAddr>,
        write_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            protocol: codec.protocol(),
            peer,
            identity: RwLock::new(Identity::default()),
            outbound,
            codec,
            write_timeout,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn identity(&self) -> Identity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn uid(&self) -> Option<String> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .uid
            .clone()
    }

    pub fn rooms(&self) -> Vec<String> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .iter()
            .cloned()
            .collect()
    }

    /// Bind the session to a user and its ENTER metadata
    pub fn bind(&self, uid: &str, misc: &str) {
        let mut identity = self.identity.write().unwrap_or_else(PoisonError::into_inner);
        identity.uid = Some(uid.to_string());
        identity.misc = misc.to_string();
    }

    pub(crate) fn track_room(&self, rid: &str) {
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .insert(rid.to_string());
    }

    pub(crate) fn untrack_room(&self, rid: &str) {
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .remove(rid);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Best-effort write bounded by the write timeout
    ///
    /// Returns whether the frame went out. Failures are logged and the
    /// message is dropped; the connection stays up.
    pub async fn write(&self, msg: &Message) -> bool {
        if self.is_closed() {
            return false;
        }

        let frame = match self.codec.encode(msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping {} reply for session {}: {}", msg.cmd, self.id, e);
                return false;
            }
        };

        let result = match timeout(self.write_timeout, self.outbound.send(&frame)).await {
            Ok(result) => result,
            Err(_) => Err(RustyRelayError::WriteTimeout),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write to session {} ({:?}): {}", self.id, self.peer, e);
                false
            }
        }
    }

    /// Release the write side; safe to call more than once
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Outbound::Stream(writer) = &self.outbound {
            if let Err(e) = writer.lock().await.shutdown().await {
                debug!("Shutdown of session {} failed: {}", self.id, e);
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("protocol", &self.protocol)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Command;
    use crate::protocol::{codec_for, Codec, TcpCodec};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_write_encodes_with_session_codec() {
        let (client, server) = tokio::io::duplex(1024);
        let session = Session::new(
            codec_for(Protocol::Tcp, 4096),
            Outbound::stream(server),
            None,
            Duration::from_millis(100),
        );

        let msg = Message::new(Command::Pub).with_rid("r").with_body("ok");
        assert!(session.write(&msg).await);

        let expected = TcpCodec::new(4096).encode(&msg).unwrap();
        let mut received = vec![0u8; expected.len()];
        let mut client = client;
        client.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_write_times_out_on_slow_reader() {
        // The peer never reads, so a frame bigger than the pipe cannot complete
        let (_client, server) = tokio::io::duplex(8);
        let session = Session::new(
            codec_for(Protocol::Tcp, 4096),
            Outbound::stream(server),
            None,
            Duration::from_millis(20),
        );

        let msg = Message::new(Command::Pub).with_body(vec![0u8; 256]);
        assert!(!session.write(&msg).await);
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_writes() {
        let (_client, server) = tokio::io::duplex(1024);
        let session = Session::new(
            codec_for(Protocol::Tcp, 4096),
            Outbound::stream(server),
            None,
            Duration::from_millis(100),
        );

        session.close().await;
        session.close().await;
        assert!(session.is_closed());
        assert!(!session.write(&Message::new(Command::Ping)).await);
    }

    #[test]
    fn test_identity_tracking() {
        let (_client, server) = tokio::io::duplex(64);
        let session = Session::new(
            codec_for(Protocol::Tcp, 4096),
            Outbound::stream(server),
            None,
            Duration::from_millis(10),
        );

        assert!(session.uid().is_none());
        session.bind("u1", "meta");
        session.track_room("r1");
        session.track_room("r1");

        let identity = session.identity();
        assert_eq!(identity.uid.as_deref(), Some("u1"));
        assert_eq!(identity.misc, "meta");
        assert_eq!(identity.rooms.len(), 1);

        session.untrack_room("r1");
        assert!(session.rooms().is_empty());
    }
}
