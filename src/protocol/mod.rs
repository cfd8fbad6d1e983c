//! Wire codecs
//!
//! Each listener picks one codec at startup. Decoding yields `Ok(Some(msg))`
//! for a complete message, `Ok(None)` for a malformed frame the caller should
//! skip, and `Err` when the connection has to be closed.

pub mod frame;
pub mod http;
pub mod tcp;
pub mod udp;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncBufRead;

use crate::core::message::{Message, Protocol};
use crate::error::Result;

pub use http::HttpCodec;
pub use tcp::TcpCodec;
pub use udp::UdpCodec;

/// Buffered byte source a codec decodes from
pub type FrameSource<'a> = dyn AsyncBufRead + Unpin + Send + 'a;

#[async_trait]
pub trait Codec: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Decode the next message from `src`
    async fn decode(&self, src: &mut FrameSource<'_>) -> Result<Option<Message>>;

    /// Encode a reply or push for the wire
    fn encode(&self, msg: &Message) -> Result<Vec<u8>>;
}

pub type SharedCodec = Arc<dyn Codec>;

/// Codec for a listener speaking `protocol`
pub fn codec_for(protocol: Protocol, body_limit: usize) -> SharedCodec {
    match protocol {
        Protocol::Tcp => Arc::new(TcpCodec::new(body_limit)),
        Protocol::Http => Arc::new(HttpCodec::new(body_limit)),
        Protocol::Udp => Arc::new(UdpCodec::new(body_limit)),
    }
}
