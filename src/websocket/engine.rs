//! Per-connection chat session.
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → handshake.rs (101 + Sec-WebSocket-Accept)
//!     → registry.register(id) ──→ writer task (queue → socket)
//!     → read loop: frame.rs read_frame
//!         Text/Binary → registry.broadcast
//!         Ping        → Pong to this peer
//!         Close       → Close echoed, loop ends
//!     → registry.unregister(id), writer drains and closes
//! ```

use std::io::Cursor;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::WebSocketConfig;
use crate::http::request::Request;
use crate::net::{connection_scope, ConnectionId};
use crate::websocket::frame::{read_frame, Frame, OpCode, WsError};
use crate::websocket::handshake::{accept_key, client_key, switching_protocols};
use crate::websocket::registry::BroadcastRegistry;

/// How long a closing session waits for its queued frames to flush.
const WRITER_DRAIN: Duration = Duration::from_secs(5);

/// Runs upgraded connections against a shared broadcast registry.
#[derive(Debug, Clone)]
pub struct WebSocketEngine {
    registry: BroadcastRegistry,
    max_payload: u64,
    echo_to_sender: bool,
}

impl WebSocketEngine {
    pub fn new(config: &WebSocketConfig, registry: BroadcastRegistry) -> Self {
        Self {
            registry,
            max_payload: config.max_payload_bytes,
            echo_to_sender: config.echo_to_sender,
        }
    }

    pub fn registry(&self) -> &BroadcastRegistry {
        &self.registry
    }

    /// Complete the handshake for `request` and run the session until the
    /// peer leaves or the server shuts down.
    ///
    /// `buffered` holds bytes read past the upgrade request; they are
    /// consumed before the socket.
    pub async fn serve(
        &self,
        mut stream: TcpStream,
        request: &Request,
        buffered: BytesMut,
        id: ConnectionId,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), WsError> {
        let key = client_key(request.headers()).ok_or(WsError::MissingKey)?;

        // Must be registered before the peer can see the 101.
        let mut queue = self.registry.register(id);
        if let Err(e) = stream.write_all(&switching_protocols(&accept_key(key))).await {
            self.registry.unregister(id);
            return Err(e.into());
        }
        tracing::debug!(connection_id = %id, path = request.path(), "WebSocket handshake complete");

        let (read_half, mut write_half) = stream.into_split();

        let mut writer = tokio::spawn(connection_scope(id, async move {
            while let Some(bytes) = queue.recv().await {
                if let Err(e) = write_half.write_all(&bytes).await {
                    tracing::debug!(connection_id = %id, error = %e, "Chat write failed");
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        }));

        let mut reader = Cursor::new(buffered).chain(read_half);
        loop {
            let frame = tokio::select! {
                frame = read_frame(&mut reader, self.max_payload) => frame,
                _ = shutdown.recv() => {
                    self.registry.send_to(id, Frame::close().encode());
                    break;
                }
            };

            match frame {
                Ok(frame) => {
                    if !self.on_frame(id, frame) {
                        break;
                    }
                    if !self.registry.contains(id) {
                        tracing::warn!(connection_id = %id, "Chat peer dropped, ending session");
                        break;
                    }
                }
                Err(WsError::ConnectionClosed) => break,
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Chat session ended");
                    break;
                }
            }
        }

        self.registry.unregister(id);
        if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
            writer.abort();
        }
        Ok(())
    }

    /// Handle one inbound frame. Returns false when the session should end.
    fn on_frame(&self, id: ConnectionId, frame: Frame) -> bool {
        match frame.opcode {
            OpCode::Close => {
                self.registry.send_to(id, Frame::close().encode());
                false
            }
            OpCode::Ping => {
                self.registry
                    .send_to(id, Frame::new(OpCode::Pong, frame.payload).encode());
                true
            }
            OpCode::Pong => true,
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                tracing::debug!(connection_id = %id, bytes = frame.payload.len(), "Chat message");
                let outbound = Frame {
                    fin: frame.fin,
                    opcode: frame.opcode,
                    mask: None,
                    payload: frame.payload,
                };
                let except = (!self.echo_to_sender).then_some(id);
                self.registry.broadcast(outbound.encode(), except);
                true
            }
            OpCode::Reserved(op) => {
                tracing::debug!(connection_id = %id, opcode = op, "Ignoring reserved opcode");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Headers;
    use bytes::Bytes;
    use tokio::net::TcpListener;

    fn engine(echo_to_sender: bool) -> WebSocketEngine {
        let config = WebSocketConfig {
            echo_to_sender,
            ..WebSocketConfig::default()
        };
        WebSocketEngine::new(&config, BroadcastRegistry::new())
    }

    #[test]
    fn data_frames_fan_out_per_echo_setting() {
        for (echo, expected) in [(true, 2), (false, 1)] {
            let engine = engine(echo);
            let (a, b) = (ConnectionId::new(), ConnectionId::new());
            let mut rx_a = engine.registry().register(a);
            let mut rx_b = engine.registry().register(b);

            assert!(engine.on_frame(a, Frame::text("hi")));
            let received = [rx_a.try_recv().is_ok(), rx_b.try_recv().is_ok()];
            assert_eq!(received.iter().filter(|r| **r).count(), expected);
        }
    }

    #[test]
    fn ping_answers_only_the_sender() {
        let engine = engine(true);
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let mut rx_a = engine.registry().register(a);
        let mut rx_b = engine.registry().register(b);

        assert!(engine.on_frame(a, Frame::new(OpCode::Ping, Bytes::from_static(b"p"))));
        assert_eq!(rx_a.try_recv().unwrap(), Frame::new(OpCode::Pong, Bytes::from_static(b"p")).encode());
        assert!(rx_b.try_recv().is_err());

        assert!(!engine.on_frame(a, Frame::close()));
        assert_eq!(rx_a.try_recv().unwrap(), Frame::close().encode());
    }

    #[tokio::test]
    async fn missing_key_fails_before_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();

        let headers: Headers = [("Upgrade", "websocket")].into_iter().collect();
        let request = Request::new("GET", "/ws/chat", headers, Bytes::new());
        let (_tx, rx) = broadcast::channel(1);

        let result = engine(true)
            .serve(server, &request, BytesMut::new(), ConnectionId::new(), rx)
            .await;
        assert!(matches!(result, Err(WsError::MissingKey)));
    }

    #[tokio::test]
    async fn stop_sent_before_session_starts_still_closes_it() {
        const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();

        let headers: Headers = [("Upgrade", "websocket"), ("Sec-WebSocket-Key", KEY)]
            .into_iter()
            .collect();
        let request = Request::new("GET", "/ws/chat", headers, Bytes::new());
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let engine = engine(true);
        let id = ConnectionId::new();
        tokio::time::timeout(
            Duration::from_secs(5),
            engine.serve(server, &request, BytesMut::new(), id, rx),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!engine.registry().contains(id));

        let expected = switching_protocols(&accept_key(KEY));
        let mut head = vec![0u8; expected.len()];
        client.read_exact(&mut head).await.unwrap();
        assert_eq!(head, expected);
        assert_eq!(read_frame(&mut client, u64::MAX).await.unwrap().opcode, OpCode::Close);
    }
}
