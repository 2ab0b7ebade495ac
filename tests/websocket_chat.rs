//! Chat over raw WebSocket connections.

use std::time::Duration;

use arsenal_server::websocket::OpCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::{is_closed, start_server, ws_connect, ws_recv, ws_send, SAMPLE_KEY};

#[tokio::test]
async fn handshake_response_is_byte_exact() {
    let server = start_server().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let request = format!(
        "GET /anything HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {}\r\n\r\n",
        SAMPLE_KEY
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let expected = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n";
    let mut got = vec![0u8; expected.len()];
    stream.read_exact(&mut got).await.unwrap();
    assert_eq!(got, expected.to_vec());

    server.stop().await;
}

#[tokio::test]
async fn upgrade_without_key_is_closed() {
    let server = start_server().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\n\r\n")
        .await
        .unwrap();
    assert!(is_closed(&mut stream).await);

    server.stop().await;
}

#[tokio::test]
async fn messages_reach_every_peer_including_sender() {
    let server = start_server().await;
    let mut alice = ws_connect(server.addr).await;
    let mut bob = ws_connect(server.addr).await;

    ws_send(&mut alice, OpCode::Text, b"hello").await;

    for peer in [&mut alice, &mut bob] {
        let frame = ws_recv(peer).await;
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.mask, None);
        assert_eq!(&frame.payload[..], b"hello");
    }

    server.stop().await;
}

#[tokio::test]
async fn large_frames_keep_their_length_class() {
    let server = start_server().await;
    let mut alice = ws_connect(server.addr).await;

    for len in [126usize, 70_000] {
        let payload: Vec<u8> = (0..len).map(|i| (i % 200) as u8).collect();
        ws_send(&mut alice, OpCode::Binary, &payload).await;
        let frame = ws_recv(&mut alice).await;
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(&frame.payload[..], &payload[..]);
    }

    server.stop().await;
}

#[tokio::test]
async fn ping_pong_and_close() {
    let server = start_server().await;
    let mut alice = ws_connect(server.addr).await;
    let mut bob = ws_connect(server.addr).await;

    ws_send(&mut alice, OpCode::Ping, b"are you there").await;
    let pong = ws_recv(&mut alice).await;
    assert_eq!(pong.opcode, OpCode::Pong);
    assert_eq!(&pong.payload[..], b"are you there");

    ws_send(&mut alice, OpCode::Close, b"").await;
    assert_eq!(ws_recv(&mut alice).await.opcode, OpCode::Close);
    assert!(is_closed(&mut alice).await);

    // bob saw neither the pong nor the close, only later traffic
    ws_send(&mut bob, OpCode::Text, b"still here").await;
    assert_eq!(&ws_recv(&mut bob).await.payload[..], b"still here");

    server.stop().await;
}

#[tokio::test]
async fn departed_peer_does_not_break_broadcast() {
    let server = start_server().await;
    let mut alice = ws_connect(server.addr).await;
    let bob = ws_connect(server.addr).await;
    drop(bob);
    tokio::time::sleep(Duration::from_millis(100)).await;

    ws_send(&mut alice, OpCode::Text, b"anyone?").await;
    assert_eq!(&ws_recv(&mut alice).await.payload[..], b"anyone?");

    server.stop().await;
}

#[tokio::test]
async fn shutdown_sends_close_to_peers() {
    let server = start_server().await;
    let mut alice = ws_connect(server.addr).await;

    server.shutdown.stop();
    assert_eq!(ws_recv(&mut alice).await.opcode, OpCode::Close);
    assert!(is_closed(&mut alice).await);

    server.stop().await;
}
