//! Accept loops for stream (TCP, HTTP) and datagram (UDP) listeners

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, UdpSocket};
use tokio::sync::{mpsc, Mutex};

use crate::constants::{
    ACCEPT_BACKOFF, MAX_DATAGRAM_SIZE, SOCKET_RECV_BUFFER, SOCKET_SEND_BUFFER, UDP_PEER_QUEUE,
};
use crate::core::connection::{Connection, Inbound};
use crate::core::message::Protocol;
use crate::core::server::SharedRelayServer;
use crate::core::session::{Outbound, Session};
use crate::error::{Result, RustyRelayError};
use crate::handlers::connection::handle_connection;
use crate::protocol::codec_for;

async fn resolve_bind_addr(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await?
        .next()
        .ok_or_else(|| RustyRelayError::ConfigError(format!("Cannot resolve listen address {}", addr)))
}

/// Byte-stream listener speaking either the binary or the HTTP framing
pub struct StreamListener {
    listener: TcpListener,
    protocol: Protocol,
    server: SharedRelayServer,
}

impl StreamListener {
    pub async fn bind(addr: &str, protocol: Protocol, server: SharedRelayServer) -> Result<Self> {
        if protocol == Protocol::Udp {
            return Err(RustyRelayError::ConfigError(
                "UDP is served by UdpListener".to_string(),
            ));
        }

        let addr = resolve_bind_addr(addr).await?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        // Accepted sockets inherit these sizes
        socket.set_recv_buffer_size(SOCKET_RECV_BUFFER)?;
        socket.set_send_buffer_size(SOCKET_SEND_BUFFER)?;
        socket.bind(addr)?;
        let listener = socket.listen(1024)?;

        info!("{} listener bound to {}", protocol, listener.local_addr()?);
        Ok(Self {
            listener,
            protocol,
            server,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept forever, one task per connection
    pub async fn run(self) {
        let config = self.server.config();
        let codec = codec_for(self.protocol, config.body_limit);
        let (read_timeout, write_timeout) = (config.read_timeout, config.write_timeout);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("{} accept failed: {}", self.protocol, e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Cannot set TCP_NODELAY for {}: {}", peer, e);
            }
            debug!("{} connection from {}", self.protocol, peer);

            let (reader, writer) = stream.into_split();
            let session = Session::new(codec.clone(), Outbound::stream(writer), Some(peer), write_timeout);
            let conn = Connection::new(
                session,
                Inbound::stream(reader, self.protocol),
                codec.clone(),
                read_timeout,
            );
            tokio::spawn(handle_connection(self.server.clone(), conn));
        }
    }
}

type PeerTable = Arc<Mutex<HashMap<SocketAddr, mpsc::Sender<Vec<u8>>>>>;

/// Datagram listener demultiplexing peers into sessions
///
/// The first datagram from an address creates its session; later ones are
/// queued to that session's task until the task ends (idle timeout or
/// panic), after which the address starts over.
pub struct UdpListener {
    socket: Arc<UdpSocket>,
    server: SharedRelayServer,
    peers: PeerTable,
}

impl UdpListener {
    pub async fn bind(addr: &str, server: SharedRelayServer) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("UDP listener bound to {}", socket.local_addr()?);
        Ok(Self {
            socket: Arc::new(socket),
            server,
            peers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Number of peers with a live session
    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (n, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!("UDP receive failed: {}", e);
                    continue;
                }
            };
            self.route(peer, buf[..n].to_vec()).await;
        }
    }

    async fn route(&self, peer: SocketAddr, datagram: Vec<u8>) {
        let mut peers = self.peers.lock().await;
        let datagram = match peers.get(&peer) {
            Some(tx) => match tx.try_send(datagram) {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Dropping datagram from {}: session queue full", peer);
                    return;
                }
                // Session task already gone; start a fresh one
                Err(mpsc::error::TrySendError::Closed(datagram)) => datagram,
            },
            None => datagram,
        };

        let (tx, rx) = mpsc::channel(UDP_PEER_QUEUE);
        if tx.try_send(datagram).is_err() {
            return;
        }
        peers.insert(peer, tx);
        drop(peers);

        let config = self.server.config();
        let codec = codec_for(Protocol::Udp, config.body_limit);
        let outbound = Outbound::Datagram {
            socket: self.socket.clone(),
            peer,
        };
        let session = Session::new(codec.clone(), outbound, Some(peer), config.write_timeout);
        let conn = Connection::new(session, Inbound::Datagram(rx), codec, config.read_timeout);
        debug!("New UDP session for {}", peer);

        let server = self.server.clone();
        let peers = self.peers.clone();
        tokio::spawn(async move {
            handle_connection(server, conn).await;
            let mut peers = peers.lock().await;
            if peers.get(&peer).is_some_and(|tx| tx.is_closed()) {
                peers.remove(&peer);
            }
        });
    }
}
