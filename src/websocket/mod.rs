//! WebSocket chat.
//!
//! # Responsibilities
//! - Complete the upgrade handshake on any path carrying `Upgrade: websocket`
//! - Encode and decode frames in all three length classes
//! - Fan text and binary frames out to every open peer
//!
//! # Design Decisions
//! - WebSocket handled separately from HTTP request/response once upgraded
//! - Server frames are never masked
//! - Each frame is one message; fragments are relayed as they arrive
//! - Close is echoed, Ping is answered, Pong is ignored

pub mod engine;
pub mod frame;
pub mod handshake;
pub mod registry;

pub use engine::WebSocketEngine;
pub use frame::{Frame, OpCode, PayloadLen, WsError};
pub use registry::BroadcastRegistry;
