use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum RustyRelayError {
    // Connection errors
    Io(io::Error),
    ConnectionClosed,
    ReadTimeout,
    WriteTimeout,

    // Frame errors
    FrameTooLarge(usize),
    MessageTooLarge(usize),
    BadRequest(String),
    EncodeError(String),

    // Publish errors
    RouteNotFound(String),
    ResolveError(String),
    Backend { status: Option<u16>, body: Vec<u8>, reason: String },

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for RustyRelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::ConnectionClosed => write!(f, "Connection closed by peer"),
            Self::ReadTimeout => write!(f, "Read timed out"),
            Self::WriteTimeout => write!(f, "Write timed out"),
            Self::FrameTooLarge(size) => write!(f, "Frame too large: {} bytes", size),
            Self::MessageTooLarge(size) => write!(f, "Message body too large: {} bytes", size),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::EncodeError(msg) => write!(f, "Encode error: {}", msg),
            Self::RouteNotFound(subcmd) => write!(f, "No publish route for subcmd {}", subcmd),
            Self::ResolveError(msg) => write!(f, "Address resolution failed: {}", msg),
            Self::Backend { status, reason, .. } => match status {
                Some(code) => write!(f, "Backend error (status {}): {}", code, reason),
                None => write!(f, "Backend error: {}", reason),
            },
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RustyRelayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RustyRelayError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => RustyRelayError::ConnectionClosed,
            _ => RustyRelayError::Io(err),
        }
    }
}

impl From<serde_json::Error> for RustyRelayError {
    fn from(err: serde_json::Error) -> Self {
        RustyRelayError::ConfigError(format!("Invalid JSON: {}", err))
    }
}

impl From<reqwest::Error> for RustyRelayError {
    fn from(err: reqwest::Error) -> Self {
        RustyRelayError::Backend {
            status: err.status().map(|s| s.as_u16()),
            body: Vec::new(),
            reason: err.to_string(),
        }
    }
}

// Generic result type for RustyRelay
pub type Result<T> = std::result::Result<T, RustyRelayError>;
