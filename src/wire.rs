//! Packet envelope and payloads exchanged with trading clients.
//!
//! Framing (all integers little-endian):
//!
//! ```text
//! u32 version_len | version ("V1")
//! u32 tag_len     | tag ("t_1000".."t_1004")
//! u32 timestamp   (unix seconds)
//! u32 data_len    | data (bincode payload)
//! ```
//!
//! Tags:
//! - `t_1000` trader session handshake, server to client
//! - `t_1001` order instruction (client to server) and fill notification
//! - `t_1002` cancelled
//! - `t_1003` not cancelled
//! - `t_1004` rejected
//!
//! Decoding is streaming: [`Packet::decode`] consumes one complete frame from
//! the front of a buffer, or returns `Ok(None)` and leaves the buffer alone
//! when more bytes are needed.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::command::{Instruction, InstructionKind, Notification, NotificationKind};
use crate::error::{EngineError, WireError};

pub const VERSION: &[u8] = b"V1";

pub const TAG_TRADER_SESSION: &str = "t_1000";
pub const TAG_ORDER: &str = "t_1001";
pub const TAG_CANCELLED: &str = "t_1002";
pub const TAG_NOT_CANCELLED: &str = "t_1003";
pub const TAG_REJECTED: &str = "t_1004";

/// Upper bound on a whole encoded frame, header included.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

const MAX_VERSION_LEN: usize = 16;
const MAX_TAG_LEN: usize = 32;

/// One framed message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub version: Bytes,
    pub tag: Bytes,
    pub timestamp: u32,
    pub data: Bytes,
}

impl Packet {
    /// Build a `V1` packet stamped with the current time.
    pub fn new(tag: &'static str, data: impl Into<Bytes>) -> Self {
        Self {
            version: Bytes::from_static(VERSION),
            tag: Bytes::from_static(tag.as_bytes()),
            timestamp: Utc::now().timestamp() as u32,
            data: data.into(),
        }
    }

    /// Serialize `payload` with bincode and wrap it.
    pub fn with_payload<T: Serialize>(tag: &'static str, payload: &T) -> Result<Self, WireError> {
        Ok(Self::new(tag, bincode::serialize(payload)?))
    }

    /// Handshake telling a new session its trader id.
    pub fn trader_session(trader_id: u32) -> Result<Self, WireError> {
        Self::with_payload(TAG_TRADER_SESSION, &TradeSession { trader_id })
    }

    /// Order instruction from a client.
    pub fn order(message: &OrderMessage) -> Result<Self, WireError> {
        Self::with_payload(TAG_ORDER, message)
    }

    /// Outbound packet for a notification, tagged by its kind.
    pub fn notification(notification: &Notification) -> Result<Self, WireError> {
        let tag = match notification.kind {
            NotificationKind::Partial | NotificationKind::Full => TAG_ORDER,
            NotificationKind::Cancelled => TAG_CANCELLED,
            NotificationKind::NotCancelled => TAG_NOT_CANCELLED,
            NotificationKind::Rejected(_) => TAG_REJECTED,
        };
        Self::with_payload(tag, &OrderMessage::from(notification))
    }

    /// Tag as text, if it is valid UTF-8.
    pub fn tag_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.tag).ok()
    }

    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, WireError> {
        Ok(bincode::deserialize(&self.data)?)
    }

    /// Size of the encoded frame.
    pub fn encoded_len(&self) -> usize {
        16 + self.version.len() + self.tag.len() + self.data.len()
    }

    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), WireError> {
        let len = self.encoded_len();
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge { len, max: MAX_FRAME_LEN });
        }

        dst.reserve(len);
        dst.put_u32_le(self.version.len() as u32);
        dst.put_slice(&self.version);
        dst.put_u32_le(self.tag.len() as u32);
        dst.put_slice(&self.tag);
        dst.put_u32_le(self.timestamp);
        dst.put_u32_le(self.data.len() as u32);
        dst.put_slice(&self.data);
        Ok(())
    }

    /// Take one complete frame off the front of `src`.
    ///
    /// Header fields are validated as soon as they are readable, so an
    /// oversized or malformed frame is reported before its body arrives.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, WireError> {
        let Some(version_len) = peek_len(src, 0) else {
            return Ok(None);
        };
        if version_len > MAX_VERSION_LEN {
            return Err(WireError::InvalidHeader("version length out of range"));
        }

        let tag_at = 4 + version_len;
        let Some(tag_len) = peek_len(src, tag_at) else {
            return Ok(None);
        };
        if tag_len > MAX_TAG_LEN {
            return Err(WireError::InvalidHeader("tag length out of range"));
        }

        let data_len_at = tag_at + 4 + tag_len + 4;
        let Some(data_len) = peek_len(src, data_len_at) else {
            return Ok(None);
        };

        let len = data_len_at + 4 + data_len;
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge { len, max: MAX_FRAME_LEN });
        }
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(len).freeze();
        frame.advance(4);
        let version = frame.split_to(version_len);
        if version != VERSION {
            return Err(WireError::InvalidHeader("unsupported version"));
        }
        frame.advance(4);
        let tag = frame.split_to(tag_len);
        let timestamp = frame.get_u32_le();
        frame.advance(4);

        Ok(Some(Self {
            version,
            tag,
            timestamp,
            data: frame,
        }))
    }
}

fn peek_len(src: &[u8], at: usize) -> Option<usize> {
    let bytes = src.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
}

// ============================================================================
// Payloads
// ============================================================================

/// Handshake payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSession {
    pub trader_id: u32,
}

/// Order payload, shared by instructions and notifications.
///
/// `kind` codes: BUY 0, SELL 1, CANCEL 2, NOT_CANCELLED 3, PARTIAL 4,
/// FULL 5, REJECTED 6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    pub trader_id: u32,
    pub trade_id: u32,
    pub instrument_id: u64,
    pub kind: i32,
    pub quantity: u64,
    pub price: u64,
}

impl OrderMessage {
    /// Turn a client message into an instruction acting for `trader_id`.
    ///
    /// The trader id carried in the message is ignored; a session can only
    /// act for itself.
    pub fn into_instruction(self, trader_id: u32) -> Result<Instruction, EngineError> {
        Ok(Instruction {
            kind: InstructionKind::try_from(self.kind)?,
            trader_id,
            trade_id: self.trade_id,
            instrument_id: self.instrument_id,
            price: self.price,
            quantity: self.quantity,
        })
    }
}

impl From<&Instruction> for OrderMessage {
    fn from(instruction: &Instruction) -> Self {
        Self {
            trader_id: instruction.trader_id,
            trade_id: instruction.trade_id,
            instrument_id: instruction.instrument_id,
            kind: instruction.kind.code(),
            quantity: instruction.quantity,
            price: instruction.price,
        }
    }
}

impl From<&Notification> for OrderMessage {
    fn from(notification: &Notification) -> Self {
        Self {
            trader_id: notification.trader_id,
            trade_id: notification.trade_id,
            instrument_id: notification.instrument_id,
            kind: notification.kind.code(),
            quantity: notification.quantity,
            price: notification.price,
        }
    }
}
