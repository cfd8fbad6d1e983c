use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use super::frame::{self, ETX, HEADER_LEN, STX};
use super::{Codec, FrameSource};
use crate::core::message::{Message, Protocol};
use crate::error::Result;

/// One binary frame per datagram, no reassembly
#[derive(Debug, Clone)]
pub struct UdpCodec {
    body_limit: usize,
}

impl UdpCodec {
    pub fn new(body_limit: usize) -> Self {
        Self { body_limit }
    }

    fn parse_datagram(&self, data: &[u8]) -> Option<Message> {
        if data.len() < HEADER_LEN + 1 || data[0] != STX {
            return None;
        }
        let len = u16::from_be_bytes([data[1], data[2]]) as usize;
        if len > frame::max_payload(self.body_limit) || data.len() < HEADER_LEN + len + 1 {
            return None;
        }
        if data[HEADER_LEN + len] != ETX {
            return None;
        }
        // An oversized body only costs this datagram
        frame::parse_payload(&data[HEADER_LEN..HEADER_LEN + len], self.body_limit)
            .ok()
            .flatten()
    }
}

#[async_trait]
impl Codec for UdpCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    async fn decode(&self, src: &mut FrameSource<'_>) -> Result<Option<Message>> {
        let mut data = Vec::new();
        src.read_to_end(&mut data).await?;
        Ok(self.parse_datagram(&data))
    }

    fn encode(&self, msg: &Message) -> Result<Vec<u8>> {
        frame::encode_frame(msg, self.body_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Command;

    #[tokio::test]
    async fn test_datagram_is_one_message() {
        let codec = UdpCodec::new(4096);
        let msg = Message::new(Command::Leave).with_uid("u").with_rid("r");
        let datagram = codec.encode(&msg).unwrap();

        let mut src: &[u8] = &datagram;
        assert_eq!(codec.decode(&mut src).await.unwrap(), Some(msg));
    }

    #[tokio::test]
    async fn test_short_or_corrupt_datagrams_are_malformed() {
        let codec = UdpCodec::new(4096);
        let mut datagram = codec.encode(&Message::new(Command::Ping)).unwrap();

        let mut short: &[u8] = &datagram[..2];
        assert!(codec.decode(&mut short).await.unwrap().is_none());

        datagram[0] = 0x01;
        let mut corrupt: &[u8] = &datagram;
        assert!(codec.decode(&mut corrupt).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_body_drops_datagram() {
        let datagram = UdpCodec::new(4096)
            .encode(&Message::new(Command::Pub).with_body(vec![1u8; 32]))
            .unwrap();

        let mut src: &[u8] = &datagram;
        assert!(UdpCodec::new(16).decode(&mut src).await.unwrap().is_none());
    }
}
