//! HTTP client implementation
//!
//! One GET per connection: connect, send the request, scan the response
//! header block for `Content-Length`, read exactly that many body bytes,
//! close.

use super::{
    Error, Result, Url, CONTENT_LENGTH_HEADER, CRLF, DEFAULT_HTTP_PORT, HEADER_TERMINATOR,
    HTTP_SCHEME,
};
use crate::net::{skip_past, skip_past_before, ByteRead, Scan, SocketStream, StreamConfig, Transport};
use bytes::Bytes;

/// Default upper bound on bytes scanned while looking for a header field
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

/// Longest digit run accepted as a Content-Length value
const MAX_LENGTH_DIGITS: usize = 20;

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Configuration for the connection's stream
    pub stream: StreamConfig,
    /// Maximum bytes scanned for each header landmark
    pub max_header_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            stream: StreamConfig::default(),
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }
}

/// A received response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    content_length: usize,
    body: Bytes,
}

impl Response {
    /// Status code from the status line
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Length announced by the Content-Length header
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// HTTP client
///
/// Holds configuration only; every request opens and closes its own
/// connection.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    config: ClientConfig,
}

impl HttpClient {
    /// Create a client with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClientConfig) -> Self {
        HttpClient { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Parse `url` and GET it
    pub fn fetch(&self, url: &str) -> Result<Response> {
        let url = Url::parse(url)?;
        self.get(&url)
    }

    /// GET `url` over a fresh connection
    pub fn get(&self, url: &Url) -> Result<Response> {
        if !url.scheme().eq_ignore_ascii_case(HTTP_SCHEME) {
            return Err(Error::UnsupportedScheme(url.scheme().to_string()));
        }

        let port = url.port_or(DEFAULT_HTTP_PORT);
        let mut stream = SocketStream::connect(url.host(), port, self.config.stream.clone())?;

        let result = exchange(
            &mut stream,
            url.host(),
            &url.request_target(),
            self.config.max_header_bytes,
        );
        stream.close();
        result
    }
}

/// GET `url` with the default configuration and return the body
pub fn http_get(url: &str) -> Result<Bytes> {
    HttpClient::new().fetch(url).map(Response::into_body)
}

/// Run one request/response exchange over an open stream
///
/// The stream is left open; the caller owns closing it.
pub fn exchange<T: Transport>(
    stream: &mut SocketStream<T>,
    host: &str,
    target: &str,
    max_header_bytes: usize,
) -> Result<Response> {
    send_request(stream, host, target)?;

    let status = read_status_line(stream, max_header_bytes)?;
    let content_length = read_content_length(stream, max_header_bytes)?;
    tracing::debug!(status, content_length, "response header scanned");

    match skip_past(stream, HEADER_TERMINATOR.as_bytes(), Some(max_header_bytes))? {
        Scan::Found => {}
        scan => {
            return Err(Error::Protocol(format!(
                "Missing header/body boundary ({:?})",
                scan
            )))
        }
    }

    let body = stream.read_up_to(content_length)?;
    if body.len() < content_length {
        tracing::warn!(expected = content_length, received = body.len(), "short body");
        return Err(Error::ShortBody {
            expected: content_length,
            received: body.len(),
        });
    }

    Ok(Response {
        status,
        content_length,
        body: Bytes::from(body),
    })
}

fn send_request<T: Transport>(stream: &mut SocketStream<T>, host: &str, target: &str) -> Result<()> {
    let request = format!(
        "GET {} HTTP/1.1{}Host: {}{}{}{}",
        target, CRLF, host, CRLF, CRLF, CRLF
    );
    stream.write(request.as_bytes())?;
    stream.flush()?;
    tracing::debug!(host, target, "request sent");
    Ok(())
}

/// Read the status line and return its code
///
/// The line terminator is left in the source so the header terminator scan
/// still sees it when the response has no header fields.
fn read_status_line<R: ByteRead + ?Sized>(src: &mut R, limit: usize) -> Result<u16> {
    let mut line = Vec::new();
    while let Some(byte) = src.peek_byte()? {
        if byte == b'\r' || byte == b'\n' {
            break;
        }
        if line.len() >= limit {
            return Err(Error::Protocol(format!(
                "Status line exceeds {} bytes",
                limit
            )));
        }
        line.push(byte);
        src.bump();
    }

    if line.is_empty() {
        return Err(Error::Protocol("Missing status line".to_string()));
    }
    parse_status_line(&String::from_utf8_lossy(&line))
}

/// Parse `HTTP/x.y CODE [REASON]`
fn parse_status_line(line: &str) -> Result<u16> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(Error::Protocol(format!("Invalid status line: {}", line)));
    }

    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..1000).contains(code))
        .ok_or_else(|| Error::Protocol(format!("Invalid status code in: {}", line)))
}

/// Skip to the Content-Length header and parse its value
fn read_content_length<R: ByteRead + ?Sized>(src: &mut R, limit: usize) -> Result<usize> {
    let scan = skip_past_before(
        src,
        CONTENT_LENGTH_HEADER.as_bytes(),
        HEADER_TERMINATOR.as_bytes(),
        Some(limit),
    )?;
    match scan {
        Scan::Found => {}
        Scan::Terminated => {
            return Err(Error::Protocol("Missing Content-Length header".to_string()))
        }
        Scan::Eof => {
            return Err(Error::Protocol(
                "Connection closed before Content-Length header".to_string(),
            ))
        }
        Scan::LimitReached => {
            return Err(Error::Protocol(format!(
                "No Content-Length header within {} bytes",
                limit
            )))
        }
    }

    let mut digits = String::new();
    while let Some(byte) = src.peek_byte()? {
        if !byte.is_ascii_digit() {
            break;
        }
        if digits.len() == MAX_LENGTH_DIGITS {
            return Err(Error::Parse(format!("Content-Length too long: {}...", digits)));
        }
        digits.push(char::from(byte));
        src.bump();
    }

    digits
        .parse::<usize>()
        .map_err(|_| Error::Parse(format!("Invalid Content-Length: {:?}", digits)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ErrorKind;
    use crate::net::MemoryTransport;

    const HOST: &str = "example.com";

    fn stream_for(response: &[u8]) -> SocketStream<MemoryTransport> {
        SocketStream::with_transport(MemoryTransport::new(response), StreamConfig::default())
    }

    fn run(response: &[u8]) -> Result<Response> {
        let mut stream = stream_for(response);
        exchange(&mut stream, HOST, "/", DEFAULT_MAX_HEADER_BYTES)
    }

    #[test]
    fn test_exchange_simple() {
        let mut stream = stream_for(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHELLO");
        let response = exchange(&mut stream, HOST, "/index.html", DEFAULT_MAX_HEADER_BYTES).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.content_length(), 5);
        assert_eq!(response.body(), b"HELLO");

        let transport = stream.get_ref().unwrap();
        assert_eq!(transport.drains().len(), 1);
        assert_eq!(
            transport.sent(),
            b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n\r\n"
        );
    }

    #[test]
    fn test_exchange_extra_headers() {
        let response = run(
            b"HTTP/1.1 404 Not Found\r\nServer: test\r\nContent-Length: 9\r\nContent-Type: text/plain\r\n\r\nNot Found",
        )
        .unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.body(), b"Not Found");
    }

    #[test]
    fn test_exchange_ignores_trailing_bytes() {
        let response = run(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOKextra").unwrap();
        assert_eq!(response.body(), b"OK");
    }

    #[test]
    fn test_exchange_empty_body() {
        let response = run(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n").unwrap();
        assert_eq!(response.status(), 204);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_exchange_small_receives() {
        let transport =
            MemoryTransport::new(&b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\nhello world"[..])
                .with_chunk_size(3);
        let config = StreamConfig::builder().buffer_size(4).build();
        let mut stream = SocketStream::with_transport(transport, config);

        let response = exchange(&mut stream, HOST, "/", DEFAULT_MAX_HEADER_BYTES).unwrap();
        assert_eq!(response.body(), b"hello world");
    }

    #[test]
    fn test_missing_content_length() {
        let err = run(b"HTTP/1.1 200 OK\r\nServer: test\r\n\r\nHELLO").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(err.kind(), ErrorKind::Protocol);

        // No header fields at all
        let err = run(b"HTTP/1.1 200 OK\r\n\r\nHELLO").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_short_body() {
        let err = run(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nHELLO").unwrap_err();
        assert!(matches!(err, Error::ShortBody { expected: 10, received: 5 }));
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_invalid_content_length() {
        let err = run(b"HTTP/1.1 200 OK\r\nContent-Length: many\r\n\r\nHELLO").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(err.kind(), ErrorKind::Parse);

        let err = run(b"HTTP/1.1 200 OK\r\nContent-Length: 123456789012345678901234\r\n\r\n")
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_missing_boundary() {
        let err = run(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_header_limit() {
        let mut stream = stream_for(b"HTTP/1.1 200 OK\r\nX-Padding: aaaaaaaaaaaaaaaaaaaa\r\nContent-Length: 1\r\n\r\nx");
        let err = exchange(&mut stream, HOST, "/", 16).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_invalid_status_line() {
        assert!(matches!(run(b"SSH-2.0-OpenSSH\r\n"), Err(Error::Protocol(_))));
        assert!(matches!(run(b"HTTP/1.1 abc OK\r\n"), Err(Error::Protocol(_))));
        assert!(matches!(run(b""), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line("HTTP/1.1 200 OK").unwrap(), 200);
        assert_eq!(parse_status_line("HTTP/1.0 404").unwrap(), 404);
        assert!(parse_status_line("HTTP/1.1").is_err());
        assert!(parse_status_line("HTTP/1.1 42 Odd").is_err());
    }

    #[test]
    fn test_read_content_length_from_slice() {
        let mut input: &[u8] = b"Server: x\r\nContent-Length: 42\r\n\r\n";
        assert_eq!(read_content_length(&mut input, 1024).unwrap(), 42);
        assert_eq!(input, b"\r\n\r\n");
    }

    #[test]
    fn test_failed_send_aborts_exchange() {
        let transport = MemoryTransport::new(&b"HTTP/1.1 200 OK\r\n"[..]).with_send_limit(4);
        let mut stream = SocketStream::with_transport(transport, StreamConfig::default());

        let err = exchange(&mut stream, HOST, "/", DEFAULT_MAX_HEADER_BYTES).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Send);
        assert_eq!(stream.get_ref().unwrap().refills(), 0);
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = HttpClient::new().fetch("https://example.com/").unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(ref s) if s == "https"));
    }

    #[test]
    fn test_fetch_invalid_url() {
        let err = HttpClient::new().fetch("example.com").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
