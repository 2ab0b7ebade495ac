//! Request parsing.
//!
//! # Responsibilities
//! - Accumulate bytes until the CRLF CRLF header terminator
//! - Split the request line and header lines into a structured request
//! - Read exactly `Content-Length` body bytes, draining buffered bytes first
//!
//! # Design Decisions
//! - Header names are case-insensitive; the last duplicate wins
//! - A peer that closes mid-headers yields an empty request, not an error
//! - A peer that closes mid-body yields the partial body, flagged as truncated
//! - Every socket read is bounded by the idle timeout
//! - Bytes past the current message stay buffered for the next one

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::schema::LimitsConfig;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 4096;

/// Errors raised while reading a request off a connection.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header block exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },

    #[error("declared body of {declared} bytes exceeds {limit} bytes")]
    BodyTooLarge { declared: usize, limit: usize },
}

/// Case-insensitive header map. Inserting an existing name replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.inner
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate `(lowercased name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// A parsed HTTP/1.1 request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
    query: Option<String>,
    version: String,
    headers: Headers,
    body: Bytes,
    body_truncated: bool,
}

impl Request {
    /// Build a request from a request target such as `/login?next=/home`.
    pub fn new(method: &str, target: &str, headers: Headers, body: impl Into<Bytes>) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method: method.to_string(),
            path,
            query,
            version: "HTTP/1.1".to_string(),
            headers,
            body: body.into(),
            body_truncated: false,
        }
    }

    /// The request produced when the peer closes before the header terminator.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.method.is_empty() && self.path.is_empty()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// True when the peer closed before sending the declared body length.
    pub fn body_truncated(&self) -> bool {
        self.body_truncated
    }

    /// True for `Upgrade: websocket` requests.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers
            .get("upgrade")
            .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
    }

    /// True when the client asked to close after this exchange.
    pub fn wants_close(&self) -> bool {
        self.headers
            .get("connection")
            .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("close")))
            .unwrap_or(false)
    }
}

/// Reads successive requests off one connection, keeping unread bytes.
#[derive(Debug)]
pub struct RequestReader {
    buf: BytesMut,
    idle_timeout: Duration,
    max_header_bytes: usize,
    max_body_bytes: usize,
}

impl RequestReader {
    pub fn new(limits: &LimitsConfig, idle_timeout: Duration) -> Self {
        Self {
            buf: BytesMut::with_capacity(READ_CHUNK),
            idle_timeout,
            max_header_bytes: limits.max_header_bytes,
            max_body_bytes: limits.max_body_bytes,
        }
    }

    /// Whether bytes of a following message are already buffered.
    pub fn has_buffered(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Hand over whatever has been read but not consumed.
    pub fn into_buffered(self) -> BytesMut {
        self.buf
    }

    /// Perform one socket read into the buffer. Returns 0 on EOF.
    pub async fn fill<R>(&mut self, stream: &mut R) -> Result<usize, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        self.buf.reserve(READ_CHUNK);
        match tokio::time::timeout(self.idle_timeout, stream.read_buf(&mut self.buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ParseError::Timeout(self.idle_timeout)),
        }
    }

    /// Read the next complete request.
    pub async fn read_request<R>(&mut self, stream: &mut R) -> Result<Request, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let head_end = loop {
            if let Some(pos) = find(&self.buf, HEADER_TERMINATOR) {
                break pos;
            }
            if self.buf.len() > self.max_header_bytes {
                return Err(ParseError::HeadersTooLarge {
                    limit: self.max_header_bytes,
                });
            }
            if self.fill(stream).await? == 0 {
                self.buf.clear();
                return Ok(Request::empty());
            }
        };
        if head_end > self.max_header_bytes {
            return Err(ParseError::HeadersTooLarge {
                limit: self.max_header_bytes,
            });
        }

        let head = self.buf.split_to(head_end + HEADER_TERMINATOR.len());
        let mut request = parse_head(&String::from_utf8_lossy(&head[..head_end]));

        let content_length = request
            .headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if content_length > self.max_body_bytes {
            return Err(ParseError::BodyTooLarge {
                declared: content_length,
                limit: self.max_body_bytes,
            });
        }

        while self.buf.len() < content_length {
            if self.fill(stream).await? == 0 {
                tracing::warn!(
                    expected = content_length,
                    received = self.buf.len(),
                    path = %request.path,
                    "Peer closed before full body arrived"
                );
                request.body_truncated = true;
                break;
            }
        }

        let take = content_length.min(self.buf.len());
        request.body = self.buf.split_to(take).freeze();
        Ok(request)
    }
}

/// Parse the request line and header lines (terminator already removed).
fn parse_head(head: &str) -> Request {
    let mut lines = head.split("\r\n");

    let mut parts = lines.next().unwrap_or_default().split(' ');
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let version = parts.next().unwrap_or_default();

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
        .collect();

    let mut request = Request::new(method, target, headers, Bytes::new());
    request.version = version.to_string();
    request
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
