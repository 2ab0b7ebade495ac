//! Response construction and serialization.
//!
//! # Responsibilities
//! - Render status line, headers and body into one byte buffer
//! - Compute `Content-Length` from the actual body bytes
//! - Provide JSON, raw and redirect helpers
//!
//! # Design Decisions
//! - Responses are plain values; the connection decides keep-alive vs close
//!   at write time and the matching `Connection` header is rendered then
//! - Extra headers keep insertion order and are written verbatim

use serde::Serialize;

/// Content type used for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";
/// Content type used for short plain-text bodies.
pub const TEXT_PLAIN: &str = "text/plain; charset=UTF-8";

/// Reason phrase for a status code. Unknown codes read "OK".
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// An HTTP/1.1 response ready to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    content_type: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// Response with an arbitrary content type and binary body.
    pub fn raw(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Response whose body is `payload` serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(status: u16, payload: &T) -> Self {
        match serde_json::to_vec(payload) {
            Ok(body) => Self::raw(status, APPLICATION_JSON, body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON response");
                Self::raw(500, APPLICATION_JSON, br#"{"error":"Server error"}"#.to_vec())
            }
        }
    }

    /// JSON body of the form `{"error": message}`.
    pub fn json_error(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    /// 302 redirect to `location` with a short plain-text body.
    pub fn redirect(location: &str) -> Self {
        Self::raw(302, TEXT_PLAIN, b"Found".to_vec()).with_header("Location", location)
    }

    /// Append an extra header; written after the standard ones, in order.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// First extra header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize into wire bytes.
    pub fn to_bytes(&self, keep_alive: bool) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: {}\r\n",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len(),
            if keep_alive { "keep-alive" } else { "close" },
        );
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_exact_bytes() {
        let response = Response::raw(200, "text/html", b"<h1>hi</h1>".to_vec());
        assert_eq!(
            response.to_bytes(true),
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 11\r\nConnection: keep-alive\r\n\r\n<h1>hi</h1>".to_vec()
        );
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let response = Response::raw(200, TEXT_PLAIN, "ümlaut".as_bytes().to_vec());
        let text = String::from_utf8(response.to_bytes(false)).unwrap();
        assert!(text.contains("Content-Length: 7\r\n"));
        assert!(text.contains("Connection: close\r\n"));
    }

    #[test]
    fn extra_headers_keep_order() {
        let response = Response::json(200, &serde_json::json!({"ok": true}))
            .with_header("Set-Cookie", "a=1")
            .with_header("X-Trace", "t");
        let text = String::from_utf8(response.to_bytes(true)).unwrap();
        let cookie = text.find("Set-Cookie: a=1\r\n").unwrap();
        let trace = text.find("X-Trace: t\r\n").unwrap();
        assert!(cookie < trace);
        assert!(text.ends_with("\r\n\r\n{\"ok\":true}"));
    }

    #[test]
    fn redirect_carries_location() {
        let response = Response::redirect("/login");
        assert_eq!(response.status(), 302);
        assert_eq!(response.header("location"), Some("/login"));
        assert_eq!(response.body(), b"Found");
    }

    #[test]
    fn unknown_status_reads_ok() {
        assert_eq!(reason_phrase(418), "OK");
        assert_eq!(reason_phrase(404), "Not Found");
    }

    #[test]
    fn json_error_shape() {
        let response = Response::json_error(404, "Endpoint Not found");
        assert_eq!(response.body(), br#"{"error":"Endpoint Not found"}"#);
        assert_eq!(response.content_type(), APPLICATION_JSON);
    }
}
