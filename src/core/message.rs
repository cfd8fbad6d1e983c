use serde::Serialize;
use std::fmt;

/// Commands carried in the first byte of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Enter,
    Leave,
    Pub,
    /// Reserved for server-generated failure replies
    Error,
    /// Any code this server does not know about
    Unknown(u8),
}

impl Command {
    pub fn code(self) -> u8 {
        match self {
            Command::Ping => 1,
            Command::Enter => 2,
            Command::Leave => 3,
            Command::Pub => 4,
            Command::Error => 0xff,
            Command::Unknown(code) => code,
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            1 => Command::Ping,
            2 => Command::Enter,
            3 => Command::Leave,
            4 => Command::Pub,
            0xff => Command::Error,
            other => Command::Unknown(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ping => write!(f, "PING"),
            Command::Enter => write!(f, "ENTER"),
            Command::Leave => write!(f, "LEAVE"),
            Command::Pub => write!(f, "PUB"),
            Command::Error => write!(f, "ERR"),
            Command::Unknown(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

/// Framing a listener speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    Tcp,
    Http,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Http => write!(f, "HTTP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// Protocol independent message exchanged with clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub cmd: Command,
    pub subcmd: u8,
    pub uid: String,
    pub rid: String,
    /// Opaque per-connection metadata captured on ENTER
    pub misc: String,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(cmd: Command) -> Self {
        Self {
            cmd,
            subcmd: 0,
            uid: String::new(),
            rid: String::new(),
            misc: String::new(),
            body: Vec::new(),
        }
    }

    pub fn with_subcmd(mut self, subcmd: u8) -> Self {
        self.subcmd = subcmd;
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn with_rid(mut self, rid: impl Into<String>) -> Self {
        self.rid = rid.into();
        self
    }

    pub fn with_misc(mut self, misc: impl Into<String>) -> Self {
        self.misc = misc.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Body as text, replacing invalid UTF-8
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        for code in [1u8, 2, 3, 4, 0xff, 0, 9] {
            assert_eq!(Command::from(code).code(), code);
        }
        assert_eq!(Command::from(4), Command::Pub);
        assert_eq!(Command::from(9), Command::Unknown(9));
    }

    #[test]
    fn test_message_builder() {
        let msg = Message::new(Command::Enter)
            .with_uid("u1")
            .with_rid("r1")
            .with_body("hello");
        assert_eq!(msg.cmd, Command::Enter);
        assert_eq!(msg.uid, "u1");
        assert_eq!(msg.rid, "r1");
        assert_eq!(msg.body_text(), "hello");
        assert_eq!(msg.subcmd, 0);
    }
}
