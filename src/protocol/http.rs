//! HTTP/1.1 framing
//!
//! Requests carry the message as parameters (`cmd`, `subcmd`, `uid`, `rid`,
//! `misc`, `body`) in the query string or in a form-encoded body. Replies are
//! JSON documents with the same field names.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncReadExt};

use super::{Codec, FrameSource};
use crate::core::message::{Command, Message, Protocol};
use crate::error::{Result, RustyRelayError};

const MAX_HEADER_BYTES: usize = 8 * 1024;
const MAX_HEADERS: usize = 64;

#[derive(Debug, Clone)]
pub struct HttpCodec {
    body_limit: usize,
}

#[derive(Serialize)]
struct HttpReply<'a> {
    cmd: u8,
    subcmd: u8,
    uid: &'a str,
    rid: &'a str,
    misc: &'a str,
    body: String,
}

impl HttpCodec {
    pub fn new(body_limit: usize) -> Self {
        Self { body_limit }
    }

    /// Room for a fully percent-escaped body plus the other parameters
    fn max_request_bytes(&self) -> usize {
        self.body_limit * 3 + 1024
    }

    fn message_from_params(&self, params: &HashMap<String, String>) -> Result<Option<Message>> {
        let Some(cmd) = params.get("cmd").and_then(|c| c.trim().parse::<u8>().ok()) else {
            return Ok(None);
        };
        let subcmd = match params.get("subcmd") {
            Some(s) => match s.trim().parse::<u8>() {
                Ok(v) => v,
                Err(_) => return Ok(None),
            },
            None => 0,
        };

        let body = params.get("body").cloned().unwrap_or_default().into_bytes();
        if body.len() > self.body_limit {
            return Err(RustyRelayError::MessageTooLarge(body.len()));
        }

        let field = |name: &str| params.get(name).cloned().unwrap_or_default();
        Ok(Some(Message {
            cmd: Command::from(cmd),
            subcmd,
            uid: field("uid"),
            rid: field("rid"),
            misc: field("misc"),
            body,
        }))
    }
}

/// Read one line including its terminator, failing once it grows past `limit`
async fn read_line(src: &mut FrameSource<'_>, limit: usize) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    let n = (&mut *src)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;

    if n == 0 {
        return Err(RustyRelayError::ConnectionClosed);
    }
    if line.last() != Some(&b'\n') {
        if n > limit {
            return Err(RustyRelayError::FrameTooLarge(n));
        }
        return Err(RustyRelayError::ConnectionClosed);
    }
    Ok(line)
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn collect_params(params: &mut HashMap<String, String>, raw: &[u8]) {
    for (k, v) in url::form_urlencoded::parse(raw) {
        params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
}

/// The parts of a request head the codec cares about
struct RequestHead {
    method: String,
    target: String,
    content_length: usize,
    form_body: bool,
}

impl RequestHead {
    /// `Ok(None)` when the head is not a valid HTTP/1.x request
    fn parse(raw: &[u8]) -> Result<Option<Self>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(raw) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) | Err(_) => return Ok(None),
        }
        let (Some(method), Some(target)) = (req.method, req.path) else {
            return Ok(None);
        };

        let mut head = Self {
            method: method.to_string(),
            target: target.to_string(),
            content_length: 0,
            form_body: true,
        };
        for header in req.headers.iter() {
            let value = String::from_utf8_lossy(header.value);
            let value = value.trim();
            if header.name.eq_ignore_ascii_case("content-length") {
                head.content_length = value.parse().map_err(|_| {
                    RustyRelayError::BadRequest(format!("invalid Content-Length {:?}", value))
                })?;
            } else if header.name.eq_ignore_ascii_case("content-type") {
                head.form_body = value
                    .to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded");
            }
        }
        Ok(Some(head))
    }
}

#[async_trait]
impl Codec for HttpCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn decode(&self, src: &mut FrameSource<'_>) -> Result<Option<Message>> {
        let mut head = read_line(src, self.max_request_bytes()).await?;
        // Stray blank line between keep-alive requests
        if trim_line(&head).is_empty() {
            return Ok(None);
        }

        let mut header_bytes = 0usize;
        loop {
            let line = read_line(src, MAX_HEADER_BYTES.saturating_sub(header_bytes)).await?;
            header_bytes += line.len();
            head.extend_from_slice(&line);
            if trim_line(&line).is_empty() {
                break;
            }
        }

        let Some(request) = RequestHead::parse(&head)? else {
            return Ok(None);
        };

        if request.content_length > self.max_request_bytes() {
            return Err(RustyRelayError::FrameTooLarge(request.content_length));
        }
        let mut body = vec![0u8; request.content_length];
        src.read_exact(&mut body).await?;

        let mut params = HashMap::new();
        if let Some((_, query)) = request.target.split_once('?') {
            collect_params(&mut params, query.as_bytes());
        }
        if request.method.eq_ignore_ascii_case("POST") && request.form_body && !body.is_empty() {
            collect_params(&mut params, &body);
        }

        self.message_from_params(&params)
    }

    fn encode(&self, msg: &Message) -> Result<Vec<u8>> {
        let reply = HttpReply {
            cmd: msg.cmd.code(),
            subcmd: msg.subcmd,
            uid: &msg.uid,
            rid: &msg.rid,
            misc: &msg.misc,
            body: msg.body_text(),
        };
        let json = serde_json::to_vec(&reply)
            .map_err(|e| RustyRelayError::EncodeError(e.to_string()))?;

        let mut out = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n",
            json.len()
        )
        .into_bytes();
        out.extend_from_slice(&json);
        Ok(out)
    }
}
