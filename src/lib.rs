//! sockstream - buffered socket streams and a minimal HTTP/1.1 client
//!
//! This crate provides a buffered, bidirectional byte stream over a
//! connected TCP socket, a delimiter scanner that runs over any byte
//! source, and a one-request-per-connection HTTP/1.1 GET client built on
//! top of both.

pub mod http;
pub mod net;
