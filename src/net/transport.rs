//! Transport operations
//!
//! This module provides the buffer hook abstraction that sits beneath
//! `SocketStream`. A stream only ever asks its transport for two things:
//! refill the read buffer with one receive, or drain the write buffer with
//! one send. Keeping those behind a trait isolates the buffering policy from
//! the socket calls.

use super::{Direction, Error, Result, StreamConfig};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Transport operations trait
///
/// Each call maps to at most one transfer on the underlying connection.
pub trait Transport {
    /// Receive once into `buf`
    ///
    /// Returns the number of bytes received, 0 at end of stream.
    fn refill(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Send `buf` in a single transfer
    ///
    /// Returns the number of bytes the transport accepted, which may be less
    /// than `buf.len()`.
    fn drain(&mut self, buf: &[u8]) -> Result<usize>;

    /// Wait until the transport is ready for a transfer
    ///
    /// Returns false if the timeout expired first.
    fn poll(&self, _direction: Direction, _timeout: Option<Duration>) -> Result<bool> {
        Ok(true)
    }

    /// Shut the connection down
    fn close(&mut self) -> Result<()>;
}

/// Plain TCP socket transport
#[derive(Debug)]
pub struct SocketTransport {
    stream: TcpStream,
}

impl SocketTransport {
    /// Create a transport from a connected TCP stream
    pub fn new(stream: TcpStream) -> Self {
        SocketTransport { stream }
    }

    /// Resolve `host` and connect to the first address that accepts
    pub fn connect(host: &str, port: u16, config: &StreamConfig) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| Error::Resolution {
                host: host.to_string(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(Error::Resolution {
                host: host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }
        tracing::debug!(host, port, count = addrs.len(), "resolved");

        let mut last_error = None;
        for addr in addrs {
            match connect_addr(addr, config) {
                Ok(stream) => {
                    tracing::debug!(%addr, "connected");
                    return Ok(SocketTransport::new(stream));
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(Error::Connect {
            addr: format!("{}:{}", host, port),
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses found")),
        })
    }

    /// Get a reference to the underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

fn connect_addr(addr: SocketAddr, config: &StreamConfig) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if config.nodelay() {
        socket.set_nodelay(true)?;
    }
    match config.io_timeout() {
        Some(timeout) => socket.connect_timeout(&addr.into(), timeout)?,
        None => socket.connect(&addr.into())?,
    }
    Ok(socket.into())
}

impl Transport for SocketTransport {
    fn refill(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.stream.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result.map_err(Error::Recv),
            }
        }
    }

    fn drain(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            match self.stream.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result.map_err(Error::Send),
            }
        }
    }

    fn poll(&self, direction: Direction, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: match direction {
                Direction::Recv => POLLIN,
                Direction::Send => POLLOUT,
            },
            revents: 0,
        };

        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, poll_timeout_ms(timeout)) };

        if result < 0 {
            let err = io::Error::last_os_error();
            return Err(match direction {
                Direction::Recv => Error::Recv(err),
                Direction::Send => Error::Send(err),
            });
        }

        Ok(result > 0)
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // The peer may already have torn the connection down
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            result => result.map_err(Error::Send),
        }
    }
}

/// Convert a timeout to poll(2) milliseconds, rounding up, -1 = infinite
fn poll_timeout_ms(timeout: Option<Duration>) -> i32 {
    timeout
        .map(|d| d.as_micros().div_ceil(1000).min(i32::MAX as u128) as i32)
        .unwrap_or(-1)
}

/// In-memory transport
///
/// Serves a fixed input script to `refill` and records every `drain` call.
/// Useful for exercising stream and protocol code without a socket.
/// Intended for tests and benches, not for production connections.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    input: Vec<u8>,
    position: usize,
    chunk_size: Option<usize>,
    send_limit: Option<usize>,
    drains: Vec<Vec<u8>>,
    refills: usize,
    closed: bool,
}

impl MemoryTransport {
    /// Create a transport that will deliver `input` and then end of stream
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        MemoryTransport {
            input: input.into(),
            ..Default::default()
        }
    }

    /// Deliver at most `size` bytes per refill
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Accept at most `limit` bytes per drain
    pub fn with_send_limit(mut self, limit: usize) -> Self {
        self.send_limit = Some(limit);
        self
    }

    /// Every drain call, in order, as the bytes that were accepted
    pub fn drains(&self) -> &[Vec<u8>] {
        &self.drains
    }

    /// All accepted bytes concatenated
    pub fn sent(&self) -> Vec<u8> {
        self.drains.concat()
    }

    /// Number of refill calls made so far
    pub fn refills(&self) -> usize {
        self.refills
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for MemoryTransport {
    fn refill(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Recv(io::Error::from(io::ErrorKind::NotConnected)));
        }
        self.refills += 1;

        let remaining = &self.input[self.position..];
        let mut n = remaining.len().min(buf.len());
        if let Some(chunk) = self.chunk_size {
            n = n.min(chunk);
        }
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }

    fn drain(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Send(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        let n = self.send_limit.map_or(buf.len(), |limit| buf.len().min(limit));
        self.drains.push(buf[..n].to_vec());
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
