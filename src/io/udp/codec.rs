// src/io/udp/codec.rs
//
// CAN-over-UDP frame codecs.
//
// Compact layout (5 + DLC bytes):
//   id(4, big-endian) | dlc(1) | data(0-8)
// Fixed layout (16 bytes, cannelloni / struct can_frame style):
//   id(4, big-endian, EFF flag in bit 31) | dlc(1) | reserved(3) | data(8)
//
// A DLC above 8 is clamped to 8 on decode. Bridges are not consistent
// about what they put there and a clamp keeps the frame usable.

use crate::io::codec::{consts, FrameCodec};
use crate::io::error::CodecError;
use crate::io::CanFrame;

/// Compact CAN-over-UDP codec. Extended status is derived from the
/// identifier magnitude, so extended frames with an identifier at or
/// below 0x7FF come back as standard frames.
pub struct CompactCodec;

/// Fixed 16-byte CAN-over-UDP codec with an explicit extended flag.
pub struct FixedCodec;

fn check_encodable(frame: &CanFrame) -> Result<usize, CodecError> {
    if frame.data_length as usize > consts::CAN_MAX_DLEN {
        return Err(CodecError::OversizedPayload(frame.data_length));
    }
    Ok(frame.data_length as usize)
}

fn read_can_id(raw: &[u8]) -> u32 {
    u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])
}

impl FrameCodec for CompactCodec {
    const MIN_LEN: usize = 5;

    fn decode(raw: &[u8]) -> Result<CanFrame, CodecError> {
        if raw.len() < Self::MIN_LEN {
            return Err(CodecError::TooShort {
                len: raw.len(),
                min: Self::MIN_LEN,
            });
        }

        let raw_id = read_can_id(raw);
        let dlc = raw[4];
        let len = (dlc as usize).min(consts::CAN_MAX_DLEN);
        let needed = Self::MIN_LEN + len;
        if raw.len() < needed {
            return Err(CodecError::Truncated {
                dlc,
                needed,
                len: raw.len(),
            });
        }

        let identifier = raw_id & consts::CAN_EFF_MASK;
        // Some bridges set the SocketCAN EFF flag even in this layout
        let is_extended =
            identifier > consts::CAN_SFF_MASK || (raw_id & consts::CAN_EFF_FLAG) != 0;

        let mut data = [0u8; 8];
        data[..len].copy_from_slice(&raw[Self::MIN_LEN..needed]);

        Ok(CanFrame {
            identifier,
            is_extended,
            data_length: len as u8,
            data,
            timestamp_us: 0,
            channel: 0,
        })
    }

    fn encode(frame: &CanFrame) -> Result<Vec<u8>, CodecError> {
        let len = check_encodable(frame)?;

        let mut buf = Vec::with_capacity(Self::MIN_LEN + len);
        buf.extend_from_slice(&(frame.identifier & consts::CAN_EFF_MASK).to_be_bytes());
        buf.push(len as u8);
        buf.extend_from_slice(&frame.data[..len]);
        Ok(buf)
    }
}

impl FrameCodec for FixedCodec {
    const MIN_LEN: usize = 16;

    fn decode(raw: &[u8]) -> Result<CanFrame, CodecError> {
        if raw.len() < Self::MIN_LEN {
            return Err(CodecError::TooShort {
                len: raw.len(),
                min: Self::MIN_LEN,
            });
        }

        // RTR and ERR flags are not represented in CanFrame
        let can_id = read_can_id(raw);
        let is_extended = (can_id & consts::CAN_EFF_FLAG) != 0;
        let identifier = if is_extended {
            can_id & consts::CAN_EFF_MASK
        } else {
            can_id & consts::CAN_SFF_MASK
        };

        let len = (raw[4] as usize).min(consts::CAN_MAX_DLEN);
        let mut data = [0u8; 8];
        data[..len].copy_from_slice(&raw[8..8 + len]);

        Ok(CanFrame {
            identifier,
            is_extended,
            data_length: len as u8,
            data,
            timestamp_us: 0,
            channel: 0,
        })
    }

    fn encode(frame: &CanFrame) -> Result<Vec<u8>, CodecError> {
        let len = check_encodable(frame)?;

        // An identifier that does not fit 11 bits is extended whatever the flag says
        let can_id = if frame.is_extended || frame.identifier > consts::CAN_SFF_MASK {
            (frame.identifier & consts::CAN_EFF_MASK) | consts::CAN_EFF_FLAG
        } else {
            frame.identifier & consts::CAN_SFF_MASK
        };

        let mut buf = vec![0u8; Self::MIN_LEN];
        buf[0..4].copy_from_slice(&can_id.to_be_bytes());
        buf[4] = len as u8;
        // bytes 5-7 reserved
        buf[8..8 + len].copy_from_slice(&frame.data[..len]);
        Ok(buf)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::udp::test_util::XorShift;

    #[test]
    fn test_compact_encode_standard_frame() {
        let frame = CanFrame::new(0x123, &[0x01, 0x02, 0x03]).unwrap();
        let encoded = CompactCodec::encode(&frame).unwrap();
        assert_eq!(encoded, vec![0x00, 0x00, 0x01, 0x23, 0x03, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_compact_decode_derives_extended() {
        let raw = [0x18, 0xFE, 0xF1, 0x00, 0x02, 0xAA, 0xBB];
        let frame = CompactCodec::decode(&raw).unwrap();
        assert_eq!(frame.identifier, 0x18FE_F100);
        assert!(frame.is_extended);
        assert_eq!(frame.payload(), &[0xAA, 0xBB]);

        let raw = [0x00, 0x00, 0x07, 0xFF, 0x00];
        let frame = CompactCodec::decode(&raw).unwrap();
        assert_eq!(frame.identifier, 0x7FF);
        assert!(!frame.is_extended);
        assert_eq!(frame.data_length, 0);
    }

    #[test]
    fn test_compact_decode_honours_eff_flag() {
        let raw = [0x80, 0x00, 0x01, 0x00, 0x01, 0x42];
        let frame = CompactCodec::decode(&raw).unwrap();
        assert_eq!(frame.identifier, 0x100);
        assert!(frame.is_extended);
    }

    #[test]
    fn test_compact_roundtrip() {
        let frames = [
            CanFrame::new(0x000, &[]).unwrap(),
            CanFrame::new(0x7FF, &[0xFF; 8]).unwrap(),
            CanFrame::new(0x800, &[1]).unwrap(),
            CanFrame::new(0x1FFF_FFFF, &[1, 2, 3, 4, 5]).unwrap(),
        ];
        for frame in frames {
            let encoded = CompactCodec::encode(&frame).unwrap();
            assert_eq!(encoded.len(), 5 + frame.data_length as usize);
            assert_eq!(CompactCodec::decode(&encoded).unwrap(), frame);
        }
    }

    #[test]
    fn test_compact_clamps_dlc() {
        for dlc in 9u8..=15 {
            let mut raw = vec![0x00, 0x00, 0x01, 0x00, dlc];
            raw.extend(1..=8u8);
            let frame = CompactCodec::decode(&raw).unwrap();
            assert_eq!(frame.data_length, 8);
            assert_eq!(frame.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        }
    }

    #[test]
    fn test_compact_clamped_dlc_still_needs_eight_bytes() {
        let raw = [0x00, 0x00, 0x01, 0x00, 12, 1, 2, 3];
        assert_eq!(
            CompactCodec::decode(&raw),
            Err(CodecError::Truncated { dlc: 12, needed: 13, len: 8 })
        );
    }

    #[test]
    fn test_compact_too_short_and_truncated() {
        let full = [0x00, 0x00, 0x01, 0x23, 0x04, 0xAA, 0xBB, 0xCC, 0xDD];
        for n in 0..5 {
            assert_eq!(
                CompactCodec::decode(&full[..n]),
                Err(CodecError::TooShort { len: n, min: 5 })
            );
        }
        for n in 5..9 {
            assert!(matches!(
                CompactCodec::decode(&full[..n]),
                Err(CodecError::Truncated { dlc: 4, needed: 9, .. })
            ));
        }
        assert!(CompactCodec::decode(&full).is_ok());
    }

    #[test]
    fn test_compact_ignores_trailing_bytes() {
        let raw = [0x00, 0x00, 0x01, 0x23, 0x01, 0xAA, 0xEE, 0xEE];
        let frame = CompactCodec::decode(&raw).unwrap();
        assert_eq!(frame.payload(), &[0xAA]);
    }

    #[test]
    fn test_fixed_encode_layout() {
        let frame = CanFrame::new_extended(0x1234_5678 & 0x1FFF_FFFF, &[0xDE, 0xAD]).unwrap();
        let encoded = FixedCodec::encode(&frame).unwrap();
        assert_eq!(encoded.len(), 16);
        assert_eq!(
            u32::from_be_bytes(encoded[0..4].try_into().unwrap()),
            0x1234_5678 | consts::CAN_EFF_FLAG
        );
        assert_eq!(encoded[4], 2);
        assert_eq!(&encoded[5..8], &[0, 0, 0]);
        assert_eq!(&encoded[8..10], &[0xDE, 0xAD]);
        assert_eq!(&encoded[10..], &[0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_fixed_zero_pads_unused_data() {
        let mut frame = CanFrame::new(0x10, &[0x01]).unwrap();
        frame.data[3] = 0x99; // padding must not leak onto the wire
        let encoded = FixedCodec::encode(&frame).unwrap();
        assert_eq!(&encoded[8..], &[0x01, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_fixed_roundtrip() {
        let frames = [
            CanFrame::new(0x000, &[]).unwrap(),
            CanFrame::new(0x123, &[0x01, 0x02, 0x03]).unwrap(),
            CanFrame::new(0x7FF, &[0xFF; 8]).unwrap(),
            CanFrame::new_extended(0x001, &[0x10]).unwrap(),
            CanFrame::new_extended(0x1FFF_FFFF, &[9, 8, 7, 6, 5, 4, 3, 2]).unwrap(),
        ];
        for frame in frames {
            let encoded = FixedCodec::encode(&frame).unwrap();
            assert_eq!(FixedCodec::decode(&encoded).unwrap(), frame);
        }
    }

    #[test]
    fn test_fixed_wide_identifier_without_flag_goes_out_extended() {
        // Fields are public, so a standard-flagged frame can carry a 29-bit id
        let frame = CanFrame {
            identifier: 0x12_3456,
            is_extended: false,
            data_length: 2,
            data: [0x11, 0x22, 0, 0, 0, 0, 0, 0],
            timestamp_us: 0,
            channel: 0,
        };

        let encoded = FixedCodec::encode(&frame).unwrap();
        assert_eq!(
            u32::from_be_bytes(encoded[0..4].try_into().unwrap()),
            0x12_3456 | consts::CAN_EFF_FLAG
        );

        let fixed = FixedCodec::decode(&encoded).unwrap();
        assert_eq!(fixed.identifier, 0x12_3456);
        assert!(fixed.is_extended);
        assert_eq!(fixed.payload(), &[0x11, 0x22]);

        // Both layouts agree on the same input
        let compact = CompactCodec::decode(&CompactCodec::encode(&frame).unwrap()).unwrap();
        assert_eq!(compact, fixed);
    }

    fn generated_frames() -> Vec<CanFrame> {
        let mut rng = XorShift::new(0x2545_F491);
        let mut frames = Vec::new();
        for round in 0..64 {
            for dlc in 0..=consts::CAN_MAX_DLEN {
                let payload: Vec<u8> = (0..dlc).map(|_| rng.next_u32() as u8).collect();
                let sff = rng.next_u32() & consts::CAN_SFF_MASK;
                let eff = rng.next_u32() & consts::CAN_EFF_MASK;
                frames.push(CanFrame::new(sff, &payload).unwrap());
                frames.push(CanFrame::new(eff, &payload).unwrap());
                frames.push(CanFrame::new_extended(eff, &payload).unwrap());
                if round == 0 {
                    // Range edges
                    let edges = [0, consts::CAN_SFF_MASK, consts::CAN_SFF_MASK + 1, consts::CAN_EFF_MASK];
                    for id in edges {
                        frames.push(CanFrame::new(id, &payload).unwrap());
                    }
                }
            }
        }
        frames
    }

    #[test]
    fn test_generated_frames_roundtrip_both_layouts() {
        for mut frame in generated_frames() {
            frame.timestamp_us = 1_700_000_000_000_000;

            let fixed = FixedCodec::decode(&FixedCodec::encode(&frame).unwrap()).unwrap();
            assert_eq!(fixed, frame, "fixed layout: {}", frame);

            // Compact derives the flag from magnitude, so it only preserves
            // extended frames whose identifier needs more than 11 bits
            if frame.is_extended == (frame.identifier > consts::CAN_SFF_MASK) {
                let compact =
                    CompactCodec::decode(&CompactCodec::encode(&frame).unwrap()).unwrap();
                assert_eq!(compact, frame, "compact layout: {}", frame);
            }
        }
    }

    #[test]
    fn test_fixed_masks_flags() {
        let mut raw = [0u8; 16];
        let can_id = 0x123 | consts::CAN_RTR_FLAG;
        raw[0..4].copy_from_slice(&can_id.to_be_bytes());
        let frame = FixedCodec::decode(&raw).unwrap();
        assert_eq!(frame.identifier, 0x123);
        assert!(!frame.is_extended);
    }

    #[test]
    fn test_fixed_clamps_dlc() {
        for dlc in 9u8..=15 {
            let mut raw = [0u8; 16];
            raw[3] = 0x42;
            raw[4] = dlc;
            raw[8..13].copy_from_slice(&[1, 2, 3, 4, 5]);
            let frame = FixedCodec::decode(&raw).unwrap();
            assert_eq!(frame.data_length, 8);
            assert_eq!(frame.payload(), &[1, 2, 3, 4, 5, 0, 0, 0]);
        }
    }

    #[test]
    fn test_fixed_too_short() {
        let raw = [0u8; 16];
        for n in 0..16 {
            assert_eq!(
                FixedCodec::decode(&raw[..n]),
                Err(CodecError::TooShort { len: n, min: 16 })
            );
        }
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut frame = CanFrame::new(0x123, &[0; 8]).unwrap();
        frame.data_length = 9;
        assert_eq!(
            CompactCodec::encode(&frame),
            Err(CodecError::OversizedPayload(9))
        );
        assert_eq!(FixedCodec::encode(&frame), Err(CodecError::OversizedPayload(9)));
    }
}
