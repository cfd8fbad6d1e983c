//! Client connection read path
//! Owned by the task running the connection loop

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::constants::{BUF_SIZE, BUF_SIZE_HTTP};
use crate::core::message::{Message, Protocol};
use crate::core::session::Session;
use crate::error::{Result, RustyRelayError};
use crate::protocol::SharedCodec;

/// Where a connection's bytes come from
pub enum Inbound {
    Stream(BufReader<Box<dyn AsyncRead + Send + Unpin>>),
    /// Datagrams routed to this peer by the UDP listener
    Datagram(mpsc::Receiver<Vec<u8>>),
}

impl Inbound {
    /// Buffered stream sized for the protocol's typical frame
    pub fn stream<R>(reader: R, protocol: Protocol) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let capacity = match protocol {
            Protocol::Http => BUF_SIZE_HTTP,
            _ => BUF_SIZE,
        };
        Inbound::Stream(BufReader::with_capacity(capacity, Box::new(reader)))
    }
}

/// A live connection: the shared session plus its private read side
pub struct Connection {
    session: Arc<Session>,
    inbound: Inbound,
    codec: SharedCodec,
    read_timeout: Duration,
}

impl Connection {
    pub fn new(
        session: Arc<Session>,
        inbound: Inbound,
        codec: SharedCodec,
        read_timeout: Duration,
    ) -> Self {
        Self {
            session,
            inbound,
            codec,
            read_timeout,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Next message, `None` for a malformed frame
    ///
    /// Idle longer than the read timeout is an error; so is EOF.
    pub async fn read(&mut self) -> Result<Option<Message>> {
        let Self {
            inbound,
            codec,
            read_timeout,
            ..
        } = self;
        let read = async {
            match inbound {
                Inbound::Stream(reader) => codec.decode(reader).await,
                Inbound::Datagram(rx) => {
                    let datagram = rx.recv().await.ok_or(RustyRelayError::ConnectionClosed)?;
                    let mut src: &[u8] = &datagram;
                    codec.decode(&mut src).await
                }
            }
        };

        match timeout(*read_timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(RustyRelayError::ReadTimeout),
        }
    }
}
