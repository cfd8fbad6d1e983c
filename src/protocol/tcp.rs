use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt};

use super::frame::{self, ETX, STX};
use super::{Codec, FrameSource};
use crate::core::message::{Message, Protocol};
use crate::error::{Result, RustyRelayError};

/// Length-prefixed binary frames over a byte stream
#[derive(Debug, Clone)]
pub struct TcpCodec {
    body_limit: usize,
}

impl TcpCodec {
    pub fn new(body_limit: usize) -> Self {
        Self { body_limit }
    }
}

#[async_trait]
impl Codec for TcpCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn decode(&self, src: &mut FrameSource<'_>) -> Result<Option<Message>> {
        let buf = src.fill_buf().await?;
        if buf.is_empty() {
            return Err(RustyRelayError::ConnectionClosed);
        }

        // Drop garbage up to the next start byte
        if buf[0] != STX {
            let skip = buf.iter().position(|&b| b == STX).unwrap_or(buf.len());
            src.consume(skip);
            return Ok(None);
        }
        src.consume(1);

        let len = src.read_u16().await? as usize;
        if len > frame::max_payload(self.body_limit) {
            return Err(RustyRelayError::FrameTooLarge(len));
        }

        let mut payload = vec![0u8; len + 1];
        src.read_exact(&mut payload).await?;
        if payload[len] != ETX {
            return Ok(None);
        }

        frame::parse_payload(&payload[..len], self.body_limit)
    }

    fn encode(&self, msg: &Message) -> Result<Vec<u8>> {
        frame::encode_frame(msg, self.body_limit)
    }
}
