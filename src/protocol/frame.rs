//! Binary frame layout shared by the TCP and UDP codecs
//!
//! ```text
//! 0xFA | len:u16 | cmd:u8 | subcmd:u8 | uid_len:u8 | uid | rid_len:u8 | rid |
//!        misc_len:u8 | misc | body_len:u16 | body | 0xFB
//! ```
//!
//! Integers are big-endian and `len` counts the bytes from `cmd` through `body`.

use crate::core::message::{Command, Message};
use crate::error::{Result, RustyRelayError};

pub const STX: u8 = 0xfa;
pub const ETX: u8 = 0xfb;

/// Start byte plus the length prefix
pub const HEADER_LEN: usize = 3;

// cmd + subcmd + three length-prefixed strings + body length
const FIXED_OVERHEAD: usize = 2 + 3 * (1 + u8::MAX as usize) + 2;

/// Largest `len` a frame may declare for the given body ceiling
pub fn max_payload(body_limit: usize) -> usize {
    FIXED_OVERHEAD + body_limit
}

/// Largest body ceiling whose worst-case frame still fits the u16 `len`
pub const MAX_BODY_LIMIT: usize = u16::MAX as usize - FIXED_OVERHEAD;

struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Option<u8> {
        let (&first, rest) = self.buf.split_first()?;
        self.buf = rest;
        Some(first)
    }

    fn u16(&mut self) -> Option<u16> {
        let bytes = self.bytes(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Some(head)
    }

    fn short_str(&mut self) -> Option<String> {
        let len = self.u8()? as usize;
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec()).ok()
    }
}

/// Parse the bytes between the length prefix and the end byte
pub fn parse_payload(payload: &[u8], body_limit: usize) -> Result<Option<Message>> {
    let mut cur = Cursor { buf: payload };

    let parsed = (|| {
        let cmd = Command::from(cur.u8()?);
        let subcmd = cur.u8()?;
        let uid = cur.short_str()?;
        let rid = cur.short_str()?;
        let misc = cur.short_str()?;
        let body_len = cur.u16()? as usize;
        Some((cmd, subcmd, uid, rid, misc, body_len))
    })();

    let Some((cmd, subcmd, uid, rid, misc, body_len)) = parsed else {
        return Ok(None);
    };

    if body_len > body_limit {
        return Err(RustyRelayError::MessageTooLarge(body_len));
    }

    // The body must fill the rest of the payload exactly
    if cur.buf.len() != body_len {
        return Ok(None);
    }

    Ok(Some(Message {
        cmd,
        subcmd,
        uid,
        rid,
        misc,
        body: cur.buf.to_vec(),
    }))
}

fn push_short_str(out: &mut Vec<u8>, field: &str, value: &str) -> Result<()> {
    let len = u8::try_from(value.len()).map_err(|_| {
        RustyRelayError::EncodeError(format!("{} longer than {} bytes", field, u8::MAX))
    })?;
    out.push(len);
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Encode a complete frame, start and end bytes included
pub fn encode_frame(msg: &Message, body_limit: usize) -> Result<Vec<u8>> {
    if msg.body.len() > body_limit {
        return Err(RustyRelayError::MessageTooLarge(msg.body.len()));
    }

    let mut payload = Vec::with_capacity(FIXED_OVERHEAD + msg.body.len());
    payload.push(msg.cmd.code());
    payload.push(msg.subcmd);
    push_short_str(&mut payload, "uid", &msg.uid)?;
    push_short_str(&mut payload, "rid", &msg.rid)?;
    push_short_str(&mut payload, "misc", &msg.misc)?;
    payload.extend_from_slice(&(msg.body.len() as u16).to_be_bytes());
    payload.extend_from_slice(&msg.body);

    let len = u16::try_from(payload.len()).map_err(|_| {
        RustyRelayError::EncodeError(format!("frame payload of {} bytes", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
    frame.push(STX);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    frame.push(ETX);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let msg = Message::new(Command::Enter)
            .with_subcmd(7)
            .with_uid("u")
            .with_rid("rr")
            .with_body("hi");
        let frame = encode_frame(&msg, 4096).unwrap();

        assert_eq!(frame[0], STX);
        assert_eq!(*frame.last().unwrap(), ETX);
        let len = u16::from_be_bytes([frame[1], frame[2]]) as usize;
        assert_eq!(len, frame.len() - HEADER_LEN - 1);
        assert_eq!(
            &frame[3..frame.len() - 1],
            &[2, 7, 1, b'u', 2, b'r', b'r', 0, 0, 2, b'h', b'i'][..]
        );
    }

    #[test]
    fn test_parse_rejects_truncated_payload() {
        assert!(parse_payload(&[4, 1, 5, b'a'], 4096).unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_trailing_bytes() {
        let payload = [1, 0, 0, 0, 0, 0, 1, b'x', b'y'];
        assert!(parse_payload(&payload, 4096).unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_body_over_limit() {
        let payload = [4, 0, 0, 0, 0, 0, 9, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        assert!(matches!(
            parse_payload(&payload, 8),
            Err(RustyRelayError::MessageTooLarge(9))
        ));
    }

    #[test]
    fn test_encode_rejects_payload_past_length_field() {
        let msg = Message::new(Command::Pub)
            .with_uid("u".repeat(200))
            .with_body(vec![0u8; 65_400]);
        assert!(matches!(
            encode_frame(&msg, u16::MAX as usize),
            Err(RustyRelayError::EncodeError(_))
        ));
    }

    #[test]
    fn test_largest_body_limit_fits_worst_case_frame() {
        let msg = Message::new(Command::Pub)
            .with_uid("u".repeat(255))
            .with_rid("r".repeat(255))
            .with_misc("m".repeat(255))
            .with_body(vec![7u8; MAX_BODY_LIMIT]);
        let frame = encode_frame(&msg, MAX_BODY_LIMIT).unwrap();

        let len = u16::from_be_bytes([frame[1], frame[2]]) as usize;
        assert_eq!(len, frame.len() - HEADER_LEN - 1);
        assert_eq!(len, max_payload(MAX_BODY_LIMIT));
        let parsed = parse_payload(&frame[HEADER_LEN..frame.len() - 1], MAX_BODY_LIMIT)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.body.len(), MAX_BODY_LIMIT);
    }

    #[test]
    fn test_encode_rejects_long_uid() {
        let msg = Message::new(Command::Pub).with_uid("u".repeat(300));
        assert!(matches!(
            encode_frame(&msg, 4096),
            Err(RustyRelayError::EncodeError(_))
        ));
    }
}
