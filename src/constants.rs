use std::time::Duration;

// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_TCP_PORT: u16 = 9001;

// Read chunk size, larger than most frames
pub const BUF_SIZE: usize = 128;
// Read chunk size for HTTP, larger than a typical request line
pub const BUF_SIZE_HTTP: usize = 128;
// Kernel socket buffers are sized as multiples of the chunk size
pub const SOCKET_RECV_BUFFER: u32 = (BUF_SIZE * 10) as u32;
pub const SOCKET_SEND_BUFFER: u32 = (BUF_SIZE * 15) as u32;

// Maximum body length of a single message
pub const BODY_LEN_LIMIT: usize = 4096;

// Number of independently locked room registry shards
pub const ROOM_SHARDS: usize = 1024;

pub const READ_TIMEOUT: Duration = Duration::from_secs(120);
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(10);
// Pause after a failed accept, e.g. when out of file descriptors
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// Upper bound on publish retries, whatever the route asks for
pub const MAX_PUB_RETRY: u32 = 3;
pub const DEFAULT_PUB_TIMEOUT: Duration = Duration::from_secs(1);

// Pending datagrams per UDP peer before new ones are dropped
pub const UDP_PEER_QUEUE: usize = 64;
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

// Business event categories
pub const BUSI_CONN: &str = "conn";
pub const BUSI_RUSR: &str = "rusr";
pub const BUSI_PUSH: &str = "push";
pub const BUSI_PUB: &str = "pub";
