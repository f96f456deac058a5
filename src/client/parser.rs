//! Response reader for the hub's HTTP/1.1 replies.
//!
//! Incremental, state-machine based parser. Bytes may arrive in any
//! fragmentation (one byte at a time, mid-line, mid-chunk); the parser keeps
//! whatever it could not consume yet and picks up on the next [`feed`].
//!
//! # Parsing Flow
//!
//! 1. **StatusLine**: skip stray blank lines, parse `HTTP/1.1 <code> ...`
//! 2. **Headers**: one CRLF-trimmed line at a time until the empty line;
//!    notes `Transfer-Encoding: chunked` and `Content-Length`
//! 3. **PlainBody**: `Content-Length` bytes, or everything until the stream idles
//! 4. **ChunkSize → ChunkData → ChunkTrailer**: repeated until a zero-size chunk,
//!    then **Trailers** up to the final empty line
//! 5. **Done**
//!
//! [`read_response`] drives the parser from a [`Transport`]: it waits (bounded by
//! the request timeout) for the first byte, then drains the stream until the
//! parser is done.
//!
//! [`feed`]: ResponseParser::feed
//!
//! # Examples
//!
//! ```
//! use constellation_http::client::{ResponseParser, ParseState};
//!
//! let mut parser = ResponseParser::new();
//! parser.feed(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nHel").unwrap();
//! assert_eq!(parser.state(), ParseState::ChunkData);
//! parser.feed(b"lo\r\n0\r\n\r\n").unwrap();
//! let response = parser.finish().unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(&response.body[..], b"Hello");
//! ```

use crate::error::{ConstellationError, Result};
use crate::protocol::{is_chunked_header, parse_chunk_size, parse_content_length, parse_status_line};
use crate::transport::Transport;
use bytes::{Buf, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io;
use std::time::{Duration, Instant};

/// Parse state of the response reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Waiting for the status line
    StatusLine,
    /// Reading header lines
    Headers,
    /// Reading a non-chunked body
    PlainBody,
    /// Waiting for a chunk-size line
    ChunkSize,
    /// Reading chunk payload bytes
    ChunkData,
    /// Waiting for the CRLF closing a chunk
    ChunkTrailer,
    /// After the zero-size chunk: trailer headers up to the final empty line
    Trailers,
    /// Response complete
    Done,
    /// Framing error; the parser accepts no more input
    Error,
}

/// A parsed hub response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Headers, keys lowercased
    pub headers: BTreeMap<String, String>,
    /// Body, de-chunked
    pub body: Bytes,
}

impl HttpResponse {
    /// Status below 300.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text (invalid UTF-8 replaced).
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Incremental HTTP/1.1 response parser.
#[derive(Debug)]
pub struct ResponseParser {
    /// Bytes received but not consumed yet
    buffer: BytesMut,
    state: ParseState,
    status: u16,
    headers: BTreeMap<String, String>,
    chunked: bool,
    content_length: Option<usize>,
    /// Bytes still expected for the current chunk or fixed-length body
    remaining: usize,
    body: BytesMut,
}

impl ResponseParser {
    /// Create a parser waiting for a status line.
    pub fn new() -> Self {
        ResponseParser {
            buffer: BytesMut::with_capacity(512),
            state: ParseState::StatusLine,
            status: 0,
            headers: BTreeMap::new(),
            chunked: false,
            content_length: None,
            remaining: 0,
            body: BytesMut::new(),
        }
    }

    /// Feed bytes to the parser. Returns `true` once the response is complete.
    ///
    /// # Errors
    ///
    /// Returns [`ConstellationError::Protocol`] for a malformed status line,
    /// header or chunk size, and [`ConstellationError::TruncatedBody`] when a
    /// chunk is not followed by CRLF. After an error the parser stays in
    /// [`ParseState::Error`].
    pub fn feed(&mut self, data: &[u8]) -> Result<bool> {
        if self.state == ParseState::Error {
            return Err(ConstellationError::Protocol("parser already failed".into()));
        }
        self.buffer.extend_from_slice(data);

        let result = self.advance();
        if result.is_err() {
            self.state = ParseState::Error;
        }
        result.map(|_| self.is_done())
    }

    fn advance(&mut self) -> Result<()> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line) = self.take_line() else { break };
                    if line.is_empty() {
                        continue;
                    }
                    tracing::trace!("> {}", line);
                    self.status = parse_status_line(&line)?;
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = self.take_line() else { break };
                    if line.is_empty() {
                        self.state = self.body_state();
                        continue;
                    }
                    tracing::trace!("> {}", line);
                    if is_chunked_header(&line) {
                        self.chunked = true;
                    } else if let Some(length) = parse_content_length(&line)? {
                        self.content_length = Some(length);
                        self.remaining = length;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        self.headers
                            .insert(name.trim().to_lowercase(), value.trim().to_string());
                    }
                }
                ParseState::PlainBody => {
                    if self.buffer.is_empty() {
                        break;
                    }
                    match self.content_length {
                        Some(_) => {
                            self.take_body_bytes();
                            if self.remaining == 0 {
                                self.state = ParseState::Done;
                            }
                        }
                        None => {
                            let rest = self.buffer.split();
                            self.body.extend_from_slice(&rest);
                        }
                    }
                }
                ParseState::ChunkSize => {
                    let Some(line) = self.take_line() else { break };
                    let size = parse_chunk_size(&line)?;
                    tracing::trace!("chunk length: {}", size);
                    if size == 0 {
                        self.state = ParseState::Trailers;
                    } else {
                        self.remaining = size;
                        self.state = ParseState::ChunkData;
                    }
                }
                ParseState::ChunkData => {
                    if self.buffer.is_empty() {
                        break;
                    }
                    self.take_body_bytes();
                    if self.remaining == 0 {
                        self.state = ParseState::ChunkTrailer;
                    }
                }
                ParseState::ChunkTrailer => {
                    if self.buffer.len() < 2 {
                        break;
                    }
                    if &self.buffer[..2] != b"\r\n" {
                        return Err(self.truncated());
                    }
                    self.buffer.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::Trailers => {
                    let Some(line) = self.take_line() else { break };
                    if line.is_empty() {
                        self.state = ParseState::Done;
                    } else {
                        tracing::trace!("> {}", line);
                    }
                }
                ParseState::Done | ParseState::Error => break,
            }
        }
        Ok(())
    }

    fn body_state(&self) -> ParseState {
        if self.chunked {
            ParseState::ChunkSize
        } else if self.content_length == Some(0) {
            ParseState::Done
        } else {
            ParseState::PlainBody
        }
    }

    /// Pop one line from the buffer, without its CRLF and surrounding whitespace.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line = self.buffer.split_to(pos + 1);
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    fn take_body_bytes(&mut self) {
        let n = self.remaining.min(self.buffer.len());
        let bytes = self.buffer.split_to(n);
        self.body.extend_from_slice(&bytes);
        self.remaining -= n;
    }

    fn truncated(&self) -> ConstellationError {
        ConstellationError::TruncatedBody {
            status: self.status,
            partial: Bytes::copy_from_slice(&self.body),
        }
    }

    /// Whether the response is complete.
    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// Whether the body ends only when the stream runs dry (no length, not chunked).
    pub fn reads_until_idle(&self) -> bool {
        self.state == ParseState::PlainBody && self.content_length.is_none()
    }

    /// Close the response: the stream has nothing more to give.
    ///
    /// # Errors
    ///
    /// Returns [`ConstellationError::Protocol`] if the head never completed and
    /// [`ConstellationError::TruncatedBody`] if a chunk or a fixed-length body
    /// was cut short.
    pub fn finish(self) -> Result<HttpResponse> {
        match self.state {
            ParseState::Done | ParseState::Trailers => {}
            ParseState::PlainBody if self.content_length.is_none() => {}
            ParseState::StatusLine | ParseState::Headers => {
                return Err(ConstellationError::Protocol(
                    "connection closed before the end of the response head".into(),
                ));
            }
            ParseState::Error => {
                return Err(ConstellationError::Protocol("response framing failed".into()));
            }
            _ => return Err(self.truncated()),
        }
        Ok(HttpResponse {
            status: self.status,
            headers: self.headers,
            body: self.body.freeze(),
        })
    }

    /// Current parse state.
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Status code, 0 until the status line is parsed.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Body bytes accumulated so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Read one response from `transport`.
///
/// Waits up to `timeout` for the first byte, then reads until the parser
/// reports the response complete, the stream closes, or (for a body without
/// length) the stream has no more bytes available.
///
/// # Errors
///
/// [`ConstellationError::Timeout`] when no byte arrived in time,
/// [`ConstellationError::Transport`] for I/O failures, plus every parser error.
pub fn read_response<T: Transport + ?Sized>(
    transport: &mut T,
    timeout: Duration,
) -> Result<HttpResponse> {
    if !transport.connected() {
        return Err(io::Error::from(io::ErrorKind::NotConnected).into());
    }

    let started = Instant::now();
    while transport.available() == 0 {
        if !transport.connected() {
            return Err(io::Error::from(io::ErrorKind::ConnectionAborted).into());
        }
        if started.elapsed() > timeout {
            tracing::error!("HTTP Timeout reached");
            return Err(ConstellationError::Timeout(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    let mut parser = ResponseParser::new();
    let mut buf = [0u8; 1024];
    loop {
        let available = transport.available();
        if available == 0 && parser.reads_until_idle() {
            break;
        }
        let want = if available == 0 { buf.len() } else { available.min(buf.len()) };
        let n = transport.read(&mut buf[..want])?;
        if n == 0 {
            if matches!(
                parser.state(),
                ParseState::ChunkSize | ParseState::ChunkData | ParseState::ChunkTrailer
            ) {
                tracing::error!("Connection lost while reading the chunked response");
            }
            break;
        }
        if parser.feed(&buf[..n])? {
            break;
        }
    }

    let response = parser.finish()?;
    tracing::trace!("HTTP response code: {}", response.status);
    Ok(response)
}
