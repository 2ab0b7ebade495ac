//! Opening handshake (RFC 6455 section 4.2).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

use crate::http::request::Headers;
use crate::http::response::reason_phrase;

/// Magic GUID appended to the client key.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// `Sec-WebSocket-Accept` for a client key: base64(SHA-1(key + GUID)).
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.trim().as_bytes());
    hasher.update(WS_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// The client key, if the request carries a non-empty one.
pub fn client_key(headers: &Headers) -> Option<&str> {
    headers
        .get("sec-websocket-key")
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// Raw `101 Switching Protocols` response bytes.
pub fn switching_protocols(accept: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 {}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        reason_phrase(101),
        accept
    )
    .into_bytes()
}
