//! Delimiter scanning
//!
//! Advances a byte source past the first occurrence of an exact byte
//! sequence, discarding everything consumed on the way.

use super::{Error, Result};

/// A byte source that can be inspected one byte at a time
pub trait ByteRead {
    /// Look at the next byte without consuming it, `None` at end of stream
    fn peek_byte(&mut self) -> Result<Option<u8>>;

    /// Consume the byte last returned by `peek_byte`
    fn bump(&mut self);
}

impl ByteRead for &[u8] {
    fn peek_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.first().copied())
    }

    fn bump(&mut self) {
        if let Some((_, rest)) = self.split_first() {
            *self = rest;
        }
    }
}

/// Outcome of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// The delimiter was matched, the source sits right after it
    Found,
    /// The terminator was matched before the delimiter
    Terminated,
    /// The source ended first
    Eof,
    /// The scan limit was reached first
    LimitReached,
}

impl Scan {
    pub fn is_found(&self) -> bool {
        *self == Scan::Found
    }
}

/// Incremental matcher for one pattern
///
/// Bytes that matched a prefix of the pattern are kept provisionally. When
/// the match breaks they are re-examined for a later start of the pattern
/// instead of being dropped.
struct Matcher<'a> {
    pattern: &'a [u8],
    matched: usize,
}

impl<'a> Matcher<'a> {
    fn new(pattern: &'a [u8]) -> Self {
        Matcher {
            pattern,
            matched: 0,
        }
    }

    /// Feed one byte, returns true when the full pattern has been seen
    fn push(&mut self, byte: u8) -> bool {
        if self.pattern[self.matched] == byte {
            self.matched += 1;
        } else if self.matched > 0 {
            self.resync(byte);
        }

        if self.matched == self.pattern.len() {
            self.matched = 0;
            return true;
        }
        false
    }

    fn resync(&mut self, byte: u8) {
        let mut window = self.pattern[..self.matched].to_vec();
        window.push(byte);

        self.matched = (1..window.len())
            .map(|start| &window[start..])
            .find(|tail| self.pattern.starts_with(tail))
            .map_or(0, |tail| tail.len());
    }
}

/// Skip past the first occurrence of `delimiter`
///
/// At most `limit` bytes are consumed when a limit is given.
pub fn skip_past<R>(src: &mut R, delimiter: &[u8], limit: Option<usize>) -> Result<Scan>
where
    R: ByteRead + ?Sized,
{
    scan(src, delimiter, None, limit)
}

/// Skip past `delimiter`, giving up if `terminator` completes first
///
/// When both end on the same byte the delimiter wins.
pub fn skip_past_before<R>(
    src: &mut R,
    delimiter: &[u8],
    terminator: &[u8],
    limit: Option<usize>,
) -> Result<Scan>
where
    R: ByteRead + ?Sized,
{
    scan(src, delimiter, Some(terminator), limit)
}

fn scan<R>(
    src: &mut R,
    delimiter: &[u8],
    terminator: Option<&[u8]>,
    limit: Option<usize>,
) -> Result<Scan>
where
    R: ByteRead + ?Sized,
{
    if delimiter.is_empty() || terminator.is_some_and(|t| t.is_empty()) {
        return Err(Error::EmptyDelimiter);
    }

    let mut wanted = Matcher::new(delimiter);
    let mut stop = terminator.map(Matcher::new);
    let mut consumed = 0usize;

    loop {
        if limit.is_some_and(|max| consumed >= max) {
            tracing::debug!(consumed, "scan limit reached");
            return Ok(Scan::LimitReached);
        }

        let Some(byte) = src.peek_byte()? else {
            tracing::debug!(consumed, "end of stream while scanning");
            return Ok(Scan::Eof);
        };
        src.bump();
        consumed += 1;

        if wanted.push(byte) {
            return Ok(Scan::Found);
        }
        if let Some(stop) = stop.as_mut() {
            if stop.push(byte) {
                return Ok(Scan::Terminated);
            }
        }
    }
}
