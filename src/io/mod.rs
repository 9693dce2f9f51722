// src/io/mod.rs
//
// CAN frame type shared by the codecs and the UDP transport, plus the
// host-facing plugin trait.

pub mod codec; // Frame codec trait and wire layouts
mod error;
pub mod traits; // Host-facing hardware plugin trait
pub mod udp; // UDP tunnel transport

pub use codec::{consts, FrameCodec, WireLayout};
pub use error::{CodecError, SendError, TransportError};
pub use traits::CanHardwarePlugin;
pub use udp::{
    CompactCodec, FixedCodec, PipelineStats, SessionState, UdpCanConfig, UdpCanTransport,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Shared Types
// ============================================================================

/// A classic CAN frame as seen by the host CAN stack.
///
/// `data` always holds 8 bytes; only the first `data_length` are payload.
/// Equality ignores the padding bytes and `timestamp_us`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CanFrame {
    /// 11-bit (standard) or 29-bit (extended) identifier, without flag bits
    pub identifier: u32,
    pub is_extended: bool,
    /// Number of payload bytes (0-8)
    pub data_length: u8,
    pub data: [u8; 8],
    /// Host UNIX timestamp in microseconds, stamped on receipt.
    pub timestamp_us: u64,
    /// Logical channel. Always 0 for the UDP transport.
    pub channel: u8,
}

impl CanFrame {
    /// Build a frame, deriving the extended flag from the identifier
    /// magnitude. Returns `None` when the payload exceeds 8 bytes.
    pub fn new(identifier: u32, payload: &[u8]) -> Option<Self> {
        let is_extended = identifier > consts::CAN_SFF_MASK;
        Self::with_flags(identifier, is_extended, payload)
    }

    /// Build an extended (29-bit) frame regardless of identifier magnitude.
    pub fn new_extended(identifier: u32, payload: &[u8]) -> Option<Self> {
        Self::with_flags(identifier, true, payload)
    }

    fn with_flags(identifier: u32, is_extended: bool, payload: &[u8]) -> Option<Self> {
        if payload.len() > consts::CAN_MAX_DLEN {
            return None;
        }
        let mask = if is_extended {
            consts::CAN_EFF_MASK
        } else {
            consts::CAN_SFF_MASK
        };
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Some(Self {
            identifier: identifier & mask,
            is_extended,
            data_length: payload.len() as u8,
            data,
            timestamp_us: 0,
            channel: 0,
        })
    }

    /// The used part of `data`. Never longer than 8 bytes, even if
    /// `data_length` was set out of range by hand.
    pub fn payload(&self) -> &[u8] {
        let len = (self.data_length as usize).min(consts::CAN_MAX_DLEN);
        &self.data[..len]
    }
}

impl PartialEq for CanFrame {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.is_extended == other.is_extended
            && self.channel == other.channel
            && self.data_length == other.data_length
            && self.payload() == other.payload()
    }
}

impl Eq for CanFrame {}

/// candump-style `123#DEADBEEF` / `12345678#01`
impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended {
            write!(f, "{:08X}#", self.identifier)?;
        } else {
            write!(f, "{:03X}#", self.identifier)?;
        }
        f.write_str(&hex::encode_upper(self.payload()))
    }
}

/// Get current time in microseconds since UNIX epoch
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

// ============================================================================
// Tests
// ============================================================================
