//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arsenal_server::auth::{InMemoryUserDirectory, SessionStore};
use arsenal_server::config::ServerConfig;
use arsenal_server::lifecycle::{startup, Shutdown};
use arsenal_server::net::Listener;
use arsenal_server::websocket::frame::{read_frame, Frame, OpCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const USERNAME: &str = "natasha";
pub const PASSWORD: &str = "widow";

/// A server running on an ephemeral port with its own page root.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub sessions: SessionStore,
    pub handle: JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop the server and wait for `run` to return.
    pub async fn stop(self) {
        self.shutdown.stop();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

/// Start a server with default settings.
pub async fn start_server() -> TestServer {
    start_server_with(|_| {}).await
}

/// Start a server after letting `tweak` adjust the configuration.
pub async fn start_server_with(tweak: impl FnOnce(&mut ServerConfig)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let pages = dir.path().join("pages");
    for page in ["default", "login", "home"] {
        std::fs::create_dir_all(pages.join(page)).unwrap();
        std::fs::write(
            pages.join(page).join(format!("{}.html", page)),
            format!("<h1>{}</h1>", page),
        )
        .unwrap();
    }
    std::fs::write(pages.join("login").join("login.js"), "// login").unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("notes.txt"), "ammo count").unwrap();

    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.static_files.pages_root = pages.to_string_lossy().into_owned();
    config.static_files.data_root = data.to_string_lossy().into_owned();
    config.observability.log_file = None;
    config.shutdown.drain_timeout_secs = 2;
    tweak(&mut config);

    let users = Arc::new(InMemoryUserDirectory::new().with_user(1, USERNAME, PASSWORD, "Admin"));
    let services = startup::assemble(&config, users);

    let tcp = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_listener(tcp, config.listener.max_connections);

    let shutdown = Shutdown::new();
    let server = services.server.clone();
    let run_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, run_shutdown).await.unwrap();
    });

    TestServer {
        addr,
        shutdown,
        sessions: services.sessions,
        handle,
        _dir: dir,
    }
}

/// A parsed response read off a raw socket.
#[derive(Debug)]
pub struct RawResponse {
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn status(&self) -> u16 {
        self.head
            .split(' ')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.split("\r\n").skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}

/// Read one response: head up to CRLF CRLF, then `Content-Length` bytes.
/// `pending` carries bytes read past the previous response.
pub async fn read_response(stream: &mut TcpStream, pending: &mut Vec<u8>) -> RawResponse {
    let head_end = loop {
        if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response head");
        pending.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8(pending[..head_end].to_vec()).unwrap();
    pending.drain(..head_end + 4);

    let len: usize = head
        .split("\r\n")
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while pending.len() < len {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        pending.extend_from_slice(&chunk[..n]);
    }
    let body = pending.drain(..len).collect();
    RawResponse { head, body }
}

/// Send a bare GET and read the response on an existing connection.
pub async fn get(stream: &mut TcpStream, path: &str, extra: &str) -> RawResponse {
    let request = format!("GET {} HTTP/1.1\r\nHost: test\r\n{}\r\n", path, extra);
    stream.write_all(request.as_bytes()).await.unwrap();
    read_response(stream, &mut Vec::new()).await
}

/// True once the peer has closed its side.
pub async fn is_closed(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 1];
    matches!(
        tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await,
        Ok(Ok(0)) | Ok(Err(_))
    )
}

pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

/// Open a chat connection and complete the handshake.
pub async fn ws_connect(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /ws/chat HTTP/1.1\r\nHost: test\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n\r\n",
        SAMPLE_KEY
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        head.push(stream.read_u8().await.unwrap());
    }
    assert!(head.starts_with(b"HTTP/1.1 101 "));
    stream
}

/// Send a masked client frame.
pub async fn ws_send(stream: &mut TcpStream, opcode: OpCode, payload: &[u8]) {
    let frame = Frame {
        fin: true,
        opcode,
        mask: Some([0x11, 0x22, 0x33, 0x44]),
        payload: payload.to_vec().into(),
    };
    stream.write_all(&frame.encode()).await.unwrap();
}

/// Receive one server frame.
pub async fn ws_recv(stream: &mut TcpStream) -> Frame {
    tokio::time::timeout(Duration::from_secs(5), read_frame(stream, u64::MAX))
        .await
        .expect("no frame within 5s")
        .unwrap()
}
