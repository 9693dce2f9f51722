// src/io/codec.rs
//
// Frame codec trait and wire layout selection.
//
// Each layout is implemented in the udp driver module:
// - udp/codec.rs - CompactCodec (5 + DLC bytes) and FixedCodec (16 bytes)
//
// One datagram carries exactly one frame. The layout is chosen by
// configuration and never guessed from the datagram size.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::io::error::CodecError;
use crate::io::udp::codec::{CompactCodec, FixedCodec};
use crate::io::CanFrame;

/// CAN identifier flags and masks (SocketCAN `can_id` conventions)
pub mod consts {
    /// Extended frame format flag, bit 31
    pub const CAN_EFF_FLAG: u32 = 0x8000_0000;
    /// Remote transmission request flag, bit 30
    pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
    /// Error frame flag, bit 29
    pub const CAN_ERR_FLAG: u32 = 0x2000_0000;
    /// 29-bit extended identifier
    pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;
    /// 11-bit standard identifier
    pub const CAN_SFF_MASK: u32 = 0x0000_07FF;
    /// Classic CAN payload limit
    pub const CAN_MAX_DLEN: usize = 8;
}

// ============================================================================
// Frame Codec Trait
// ============================================================================

/// Trait for CAN-over-UDP frame codecs.
///
/// Implementations are stateless: the same input always yields the same
/// output and no I/O is performed.
pub trait FrameCodec {
    /// Smallest datagram the layout can decode.
    const MIN_LEN: usize;

    /// Decode one datagram into a frame.
    ///
    /// The returned frame has `timestamp_us == 0`; the receiver stamps it.
    fn decode(raw: &[u8]) -> Result<CanFrame, CodecError>;

    /// Encode a frame into the bytes of one datagram.
    fn encode(frame: &CanFrame) -> Result<Vec<u8>, CodecError>;
}

// ============================================================================
// Wire Layout
// ============================================================================

/// The on-the-wire layout used by both ends of a tunnel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireLayout {
    /// `id(4, BE) | dlc(1) | data(dlc)`. Extended status from id > 0x7FF.
    #[default]
    Compact,
    /// `id(4, BE, EFF flag in bit 31) | dlc(1) | reserved(3) | data(8)`
    Fixed,
}

impl WireLayout {
    pub fn encode(self, frame: &CanFrame) -> Result<Vec<u8>, CodecError> {
        match self {
            WireLayout::Compact => CompactCodec::encode(frame),
            WireLayout::Fixed => FixedCodec::encode(frame),
        }
    }

    pub fn decode(self, raw: &[u8]) -> Result<CanFrame, CodecError> {
        match self {
            WireLayout::Compact => CompactCodec::decode(raw),
            WireLayout::Fixed => FixedCodec::decode(raw),
        }
    }

    /// Largest datagram a well-formed frame produces in this layout.
    pub fn max_datagram_len(self) -> usize {
        match self {
            WireLayout::Compact => CompactCodec::MIN_LEN + consts::CAN_MAX_DLEN,
            WireLayout::Fixed => FixedCodec::MIN_LEN,
        }
    }
}

impl fmt::Display for WireLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireLayout::Compact => f.write_str("compact"),
            WireLayout::Fixed => f.write_str("fixed"),
        }
    }
}

impl FromStr for WireLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(WireLayout::Compact),
            "fixed" | "cannelloni" => Ok(WireLayout::Fixed),
            other => Err(format!(
                "unknown wire layout '{}' (expected 'compact' or 'fixed')",
                other
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
