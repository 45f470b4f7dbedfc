//! Buffered socket streams
//!
//! This module provides the transport-facing half of the crate:
//!
//! - `Transport` trait: the two buffer hooks (`refill` and `drain`) plus
//!   `poll` and `close`, implemented once for sockets by `SocketTransport`
//! - `SocketStream`: fixed-capacity read/write buffers over one transport
//! - `scan`: the delimiter scanner used to walk through header blocks
//!
//! # Examples
//!
//! ```no_run
//! use sockstream::net::{SocketStream, StreamConfig};
//!
//! let mut stream = SocketStream::connect("example.com", 80, StreamConfig::default()).unwrap();
//! stream.write(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! stream.flush().unwrap();
//!
//! let mut buf = [0u8; 512];
//! let n = stream.read(&mut buf).unwrap();
//! println!("{}", String::from_utf8_lossy(&buf[..n]));
//! stream.close();
//! ```

pub mod config;
pub mod scan;
pub mod stream;
pub mod transport;

pub use config::{StreamConfig, StreamConfigBuilder};
pub use scan::{skip_past, skip_past_before, ByteRead, Scan};
pub use stream::SocketStream;
pub use transport::{MemoryTransport, SocketTransport, Transport};

use std::fmt;
use std::io;

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Default capacity of each stream buffer
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Direction of a transfer on the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

impl Direction {
    fn kind(self) -> ErrorKind {
        match self {
            Direction::Send => ErrorKind::Send,
            Direction::Recv => ErrorKind::Recv,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "send"),
            Direction::Recv => write!(f, "receive"),
        }
    }
}

/// Lifecycle of the socket handle owned by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unopened,
    Open,
    Failed,
    Closed,
}

/// Failure classes shared by the stream and HTTP layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resolution,
    Connect,
    Send,
    Recv,
    Parse,
    Protocol,
}

/// Stream operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to resolve {host}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Send error: {0}")]
    Send(#[source] io::Error),

    #[error("Partial send: {sent} of {expected} bytes")]
    PartialSend { sent: usize, expected: usize },

    #[error("Receive error: {0}")]
    Recv(#[source] io::Error),

    #[error("Timeout waiting to {0}")]
    Timeout(Direction),

    #[error("Stream is not open ({0})")]
    NotOpen(Direction),

    #[error("Stream is in failed state ({0})")]
    Failed(Direction),

    #[error("Stream is closed ({0})")]
    Closed(Direction),

    #[error("Empty delimiter")]
    EmptyDelimiter,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resolution { .. } => ErrorKind::Resolution,
            Error::Connect { .. } => ErrorKind::Connect,
            Error::Send(_) | Error::PartialSend { .. } => ErrorKind::Send,
            Error::Recv(_) => ErrorKind::Recv,
            Error::Timeout(d) | Error::NotOpen(d) | Error::Failed(d) | Error::Closed(d) => {
                d.kind()
            }
            Error::EmptyDelimiter => ErrorKind::Parse,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Timeout(_) => io::Error::new(io::ErrorKind::TimedOut, err),
            Error::NotOpen(_) | Error::Closed(_) => io::Error::new(io::ErrorKind::NotConnected, err),
            Error::EmptyDelimiter => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::other(other),
        }
    }
}
