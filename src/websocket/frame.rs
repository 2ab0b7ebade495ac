//! WebSocket frame codec (RFC 6455 section 5).
//!
//! ```text
//!  0               1               2               3
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |     Masking-key (0 or 4 bytes), then payload                  |
//! +---------------------------------------------------------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

const FIN_BIT: u8 = 0x80;
const OPCODE_MASK: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LEN_MASK: u8 = 0x7F;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

/// Errors raised by the codec and the session loop.
#[derive(Debug, Error)]
pub enum WsError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer closed the connection")]
    ConnectionClosed,

    #[error("frame payload of {len} bytes exceeds {limit} bytes")]
    PayloadTooLarge { len: u64, limit: u64 },

    #[error("upgrade request has no Sec-WebSocket-Key")]
    MissingKey,
}

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved(u8),
}

impl OpCode {
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl From<u8> for OpCode {
    fn from(value: u8) -> Self {
        match value & OPCODE_MASK {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        match op {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(v) => v & OPCODE_MASK,
        }
    }
}

/// Payload length class as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLen {
    /// 0..=125, stored in the 7-bit field.
    Short(u8),
    /// 126..=65535, 7-bit field is 126, then 16-bit big-endian.
    Medium(u16),
    /// Larger, 7-bit field is 127, then 64-bit big-endian.
    Long(u64),
}

impl PayloadLen {
    pub fn for_len(len: usize) -> Self {
        if len <= 125 {
            PayloadLen::Short(len as u8)
        } else if len <= u16::MAX as usize {
            PayloadLen::Medium(len as u16)
        } else {
            PayloadLen::Long(len as u64)
        }
    }

    pub fn get(self) -> u64 {
        match self {
            PayloadLen::Short(n) => n as u64,
            PayloadLen::Medium(n) => n as u64,
            PayloadLen::Long(n) => n,
        }
    }

    /// Bytes of the extended length field.
    pub fn extended_bytes(self) -> usize {
        match self {
            PayloadLen::Short(_) => 0,
            PayloadLen::Medium(_) => 2,
            PayloadLen::Long(_) => 8,
        }
    }
}

/// A single WebSocket frame. `payload` is always stored unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload: Bytes,
}

impl Frame {
    /// Final, unmasked frame as the server sends it.
    pub fn new(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::new(OpCode::Text, text)
    }

    pub fn close() -> Self {
        Self::new(OpCode::Close, Bytes::new())
    }

    pub fn payload_len(&self) -> PayloadLen {
        PayloadLen::for_len(self.payload.len())
    }

    /// Serialize; the payload is masked on the wire when `mask` is set.
    pub fn encode(&self) -> Bytes {
        let len = self.payload_len();
        let mut out = BytesMut::with_capacity(
            2 + len.extended_bytes() + self.mask.map_or(0, |_| 4) + self.payload.len(),
        );

        let fin = if self.fin { FIN_BIT } else { 0 };
        out.put_u8(fin | u8::from(self.opcode));

        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };
        match len {
            PayloadLen::Short(n) => out.put_u8(mask_bit | n),
            PayloadLen::Medium(n) => {
                out.put_u8(mask_bit | LEN_16);
                out.put_u16(n);
            }
            PayloadLen::Long(n) => {
                out.put_u8(mask_bit | LEN_64);
                out.put_u64(n);
            }
        }

        match self.mask {
            Some(key) => {
                out.put_slice(&key);
                let start = out.len();
                out.put_slice(&self.payload);
                apply_mask(&mut out[start..], key);
            }
            None => out.put_slice(&self.payload),
        }
        out.freeze()
    }
}

/// XOR `buf` with the 4-byte key cycled from its first byte.
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Read one frame, unmasking its payload.
///
/// EOF before the first header byte is [`WsError::ConnectionClosed`].
pub async fn read_frame<R>(reader: &mut R, max_payload: u64) -> Result<Frame, WsError>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; 2];
    reader.read_exact(&mut head).await.map_err(eof_as_closed)?;

    let fin = head[0] & FIN_BIT != 0;
    let opcode = OpCode::from(head[0]);
    let masked = head[1] & MASK_BIT != 0;

    let len = match head[1] & LEN_MASK {
        LEN_16 => PayloadLen::Medium(reader.read_u16().await.map_err(eof_as_closed)?),
        LEN_64 => PayloadLen::Long(reader.read_u64().await.map_err(eof_as_closed)?),
        n => PayloadLen::Short(n),
    };
    if len.get() > max_payload {
        return Err(WsError::PayloadTooLarge {
            len: len.get(),
            limit: max_payload,
        });
    }

    let mask = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await.map_err(eof_as_closed)?;
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; len.get() as usize];
    reader.read_exact(&mut payload).await.map_err(eof_as_closed)?;
    if let Some(key) = mask {
        apply_mask(&mut payload, key);
    }

    Ok(Frame {
        fin,
        opcode,
        mask,
        payload: Bytes::from(payload),
    })
}

fn eof_as_closed(e: std::io::Error) -> WsError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        WsError::ConnectionClosed
    } else {
        WsError::Io(e)
    }
}
