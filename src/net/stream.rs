//! Buffered socket stream
//!
//! `SocketStream` batches small reads and writes into whole-buffer transfers
//! on a single owned transport. The write buffer holds pending application
//! bytes between its base and `write_pos`; the read buffer holds received,
//! undelivered bytes between `read_pos` and `read_end`.

use super::scan::ByteRead;
use super::{ConnectionState, Direction, Error, Result, SocketTransport, StreamConfig, Transport};
use std::io;

/// Buffered, bidirectional byte stream over one connection
pub struct SocketStream<T: Transport = SocketTransport> {
    transport: Option<T>,
    state: ConnectionState,
    config: StreamConfig,
    write_buf: Box<[u8]>,
    write_pos: usize,
    read_buf: Box<[u8]>,
    read_pos: usize,
    read_end: usize,
    eof: bool,
}

impl<T: Transport> SocketStream<T> {
    /// Create an unopened stream
    pub fn new(config: StreamConfig) -> Self {
        let size = config.buffer_size();
        SocketStream {
            transport: None,
            state: ConnectionState::Unopened,
            config,
            write_buf: vec![0u8; size].into_boxed_slice(),
            write_pos: 0,
            read_buf: vec![0u8; size].into_boxed_slice(),
            read_pos: 0,
            read_end: 0,
            eof: false,
        }
    }

    /// Create an open stream over an already connected transport
    pub fn with_transport(transport: T, config: StreamConfig) -> Self {
        let mut stream = Self::new(config);
        stream.attach(transport);
        stream
    }

    fn attach(&mut self, transport: T) {
        self.transport = Some(transport);
        self.state = ConnectionState::Open;
        self.reset_buffers();
    }

    fn reset_buffers(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
        self.read_end = 0;
        self.eof = false;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// True once a refill has reported end of stream
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Capacity of each buffer
    pub fn capacity(&self) -> usize {
        self.write_buf.len()
    }

    /// Bytes written but not yet sent
    pub fn pending(&self) -> usize {
        self.write_pos
    }

    /// Bytes received but not yet read
    pub fn buffered(&self) -> usize {
        self.read_end - self.read_pos
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Get a reference to the transport, if one is attached
    pub fn get_ref(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Get a mutable reference to the transport, if one is attached
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Append bytes to the write buffer, draining it whenever it fills
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_buffered(bytes)
    }

    /// Send all pending bytes in one transfer
    pub fn flush(&mut self) -> Result<()> {
        self.check(Direction::Send)?;
        self.drain_pending()
    }

    /// Read up to `out.len()` bytes
    ///
    /// Serves buffered bytes first and refills with at most one receive.
    /// Returns 0 at end of stream.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        self.read_buffered(out)
    }

    /// Read a single byte, `None` at end of stream
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.fill()?.first().copied();
        if byte.is_some() {
            self.read_pos += 1;
        }
        Ok(byte)
    }

    /// Read until `n` bytes are collected or the stream ends
    pub fn read_up_to(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n.min(self.capacity() * 16));
        while out.len() < n {
            let chunk = self.fill()?;
            if chunk.is_empty() {
                break;
            }
            let take = chunk.len().min(n - out.len());
            out.extend_from_slice(&chunk[..take]);
            self.read_pos += take;
        }
        Ok(out)
    }

    /// Flush pending writes (best effort) and release the transport
    ///
    /// Closing an unopened or already closed stream does nothing.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Open {
            if let Err(e) = self.drain_pending() {
                tracing::debug!(error = %e, "flush on close failed");
            }
        }

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                tracing::debug!(error = %e, "transport close failed");
            }
            tracing::debug!("stream closed");
        }

        if self.state != ConnectionState::Unopened {
            self.state = ConnectionState::Closed;
        }
        self.reset_buffers();
    }

    fn check(&self, direction: Direction) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Unopened => Err(Error::NotOpen(direction)),
            ConnectionState::Failed => Err(Error::Failed(direction)),
            ConnectionState::Closed => Err(Error::Closed(direction)),
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        tracing::warn!(error = %err, "stream failed");
        self.state = ConnectionState::Failed;
        err
    }

    fn wait_ready(&mut self, direction: Direction) -> Result<()> {
        let timeout = self.config.io_timeout();
        if timeout.is_none() {
            return Ok(());
        }

        let ready = match self.transport.as_ref() {
            Some(transport) => transport.poll(direction, timeout),
            None => Err(Error::NotOpen(direction)),
        };
        match ready {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.fail(Error::Timeout(direction))),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn write_buffered(&mut self, mut bytes: &[u8]) -> Result<()> {
        self.check(Direction::Send)?;

        while !bytes.is_empty() {
            if self.write_pos == self.write_buf.len() {
                self.drain_pending()?;
            }
            let n = (self.write_buf.len() - self.write_pos).min(bytes.len());
            self.write_buf[self.write_pos..self.write_pos + n].copy_from_slice(&bytes[..n]);
            self.write_pos += n;
            bytes = &bytes[n..];
        }

        Ok(())
    }

    fn drain_pending(&mut self) -> Result<()> {
        let expected = self.write_pos;
        if expected == 0 {
            return Ok(());
        }
        self.wait_ready(Direction::Send)?;

        let result = match self.transport.as_mut() {
            Some(transport) => transport.drain(&self.write_buf[..expected]),
            None => Err(Error::NotOpen(Direction::Send)),
        };

        // A short send is not retried
        match result {
            Ok(sent) if sent == expected => {
                tracing::trace!(bytes = sent, "drained");
                self.write_pos = 0;
                Ok(())
            }
            Ok(sent) => Err(self.fail(Error::PartialSend { sent, expected })),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn refill(&mut self) -> Result<usize> {
        if self.eof {
            return Ok(0);
        }
        self.wait_ready(Direction::Recv)?;

        let result = match self.transport.as_mut() {
            Some(transport) => transport.refill(&mut self.read_buf),
            None => Err(Error::NotOpen(Direction::Recv)),
        };

        match result {
            Ok(n) => {
                let n = n.min(self.read_buf.len());
                self.read_pos = 0;
                self.read_end = n;
                if n == 0 {
                    tracing::debug!("end of stream");
                    self.eof = true;
                } else {
                    tracing::trace!(bytes = n, "refilled");
                }
                Ok(n)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Buffered bytes, refilling first if none are left
    fn fill(&mut self) -> Result<&[u8]> {
        self.check(Direction::Recv)?;
        if self.read_pos == self.read_end {
            self.refill()?;
        }
        Ok(&self.read_buf[self.read_pos..self.read_end])
    }

    fn read_buffered(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return self.check(Direction::Recv).map(|_| 0);
        }

        let available = self.fill()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl SocketStream<SocketTransport> {
    /// Resolve `host`, connect, and attach the socket
    ///
    /// Any existing connection is closed first. On failure the stream is
    /// left in the failed state without a handle.
    pub fn open(&mut self, host: &str, port: u16) -> Result<()> {
        self.close();
        match SocketTransport::connect(host, port, &self.config) {
            Ok(transport) => {
                self.attach(transport);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Create a stream and open it
    pub fn connect(host: &str, port: u16, config: StreamConfig) -> Result<Self> {
        let mut stream = Self::new(config);
        stream.open(host, port)?;
        Ok(stream)
    }
}

impl<T: Transport> Drop for SocketStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> ByteRead for SocketStream<T> {
    fn peek_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.fill()?.first().copied())
    }

    fn bump(&mut self) {
        if self.read_pos < self.read_end {
            self.read_pos += 1;
        }
    }
}

impl<T: Transport> io::Read for SocketStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_buffered(buf).map_err(io::Error::from)
    }
}

impl<T: Transport> io::BufRead for SocketStream<T> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.fill().map_err(io::Error::from)
    }

    fn consume(&mut self, amt: usize) {
        self.read_pos = (self.read_pos + amt).min(self.read_end);
    }
}

impl<T: Transport> io::Write for SocketStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_buffered(buf).map_err(io::Error::from)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check(Direction::Send).map_err(io::Error::from)?;
        self.drain_pending().map_err(io::Error::from)
    }
}
