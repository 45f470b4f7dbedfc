//! Minimal HTTP/1.1 client
//!
//! This module provides a one-request-per-connection HTTP/1.1 GET client
//! built on `net::SocketStream`.
//!
//! # Architecture
//!
//! - `Url` decomposes and formats URL strings
//! - `HttpClient` writes the request through a buffered stream, then uses
//!   the delimiter scanner to find `Content-Length` and the header/body
//!   boundary before reading exactly that many body bytes
//!
//! # Examples
//!
//! ```no_run
//! use sockstream::http::{HttpClient, Url};
//!
//! let url = Url::parse("http://example.com/index.html").unwrap();
//! let response = HttpClient::new().get(&url).unwrap();
//! assert_eq!(response.status(), 200);
//! println!("{}", String::from_utf8_lossy(response.body()));
//! ```

pub mod client;
pub mod url;

pub use client::{exchange, http_get, ClientConfig, HttpClient, Response};
pub use url::Url;

pub use crate::net::ErrorKind;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] crate::net::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Protocol error: body ended after {received} of {expected} bytes")]
    ShortBody { expected: usize, received: usize },
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(e) => e.kind(),
            Error::Parse(_) => ErrorKind::Parse,
            Error::UnsupportedScheme(_) | Error::Protocol(_) | Error::ShortBody { .. } => {
                ErrorKind::Protocol
            }
        }
    }
}

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// The only scheme the client speaks
pub const HTTP_SCHEME: &str = "http";

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// Header prefix the client scans for
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length: ";

/// Blank line separating headers from the body
pub const HEADER_TERMINATOR: &str = "\r\n\r\n";
