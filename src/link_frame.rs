use crate::error::{EncodeError, ValidationError};
use crate::link_define::{
    CK3862S_FRAME_LEN, CK3864S_FRAME_LEN, CMD_CK3862S, CMD_CK3864S, CMD_DEBUG,
    DEBUG_RESPONSE_LEN, FRAME_OVERHEAD, READ_REQUEST,
};
use crate::parameter::Parameter;
use crate::variant::DeviceVariant;

/// One complete checksummed protocol message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub length: u8,
    pub payload: Vec<u8>,
    pub checksum: u8,
}

impl Frame {
    /// Serialize to wire bytes: `[command][length][payload...][checksum]`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + FRAME_OVERHEAD);
        out.push(self.command);
        out.push(self.length);
        out.extend_from_slice(&self.payload);
        out.push(self.checksum);
        out
    }

    /// Total byte count on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }
}

/// Inbound frame layouts, keyed by their command byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// 16-byte frame of the 13-item controller.
    Ck3864s,
    /// 11-byte frame of the 8-item controller.
    Ck3862s,
    /// 5-byte live-debug response.
    DebugResponse,
}

impl FrameKind {
    #[must_use]
    pub const fn from_command(command: u8) -> Option<Self> {
        match command {
            CMD_CK3864S => Some(Self::Ck3864s),
            CMD_CK3862S => Some(Self::Ck3862s),
            CMD_DEBUG => Some(Self::DebugResponse),
            _ => None,
        }
    }

    /// Required total length of a frame of this kind.
    #[must_use]
    pub const fn total_len(&self) -> usize {
        match self {
            Self::Ck3864s => CK3864S_FRAME_LEN,
            Self::Ck3862s => CK3862S_FRAME_LEN,
            Self::DebugResponse => DEBUG_RESPONSE_LEN,
        }
    }

    /// Variant whose parameter list a frame of this kind carries.
    #[must_use]
    pub const fn variant(&self) -> Option<DeviceVariant> {
        match self {
            Self::Ck3864s => Some(DeviceVariant::Ck3864s),
            Self::Ck3862s => Some(DeviceVariant::Ck3862s),
            Self::DebugResponse => None,
        }
    }
}

/// Sum `bytes[start..start + count]` and keep the low 8 bits.
///
/// `count == None` sums to the end of the buffer; a count running past the
/// end is clamped. Returns 0 when `start` is out of bounds.
#[must_use]
pub fn checksum(bytes: &[u8], start: usize, count: Option<usize>) -> u8 {
    if start >= bytes.len() {
        return 0;
    }
    let end = match count {
        Some(n) => start.saturating_add(n).min(bytes.len()),
        None => bytes.len(),
    };
    let sum = bytes[start..end]
        .iter()
        .fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)));
    let check = (sum & 0xFF) as u8;
    log::trace!("checksum over [{start}, {end}) = 0x{check:02X}");
    check
}

/// Build the normal write frame for `variant` from the parameter list.
///
/// # Errors
///
/// `EncodeError::BadItemCount` when `parameters.len()` differs from the
/// variant's fixed item count.
pub fn encode(variant: DeviceVariant, parameters: &[Parameter]) -> Result<Frame, EncodeError> {
    encode_with_command(variant.command(), variant, parameters)
}

/// Same as [`encode`] but with an explicit command byte (the debug poll
/// reuses the normal layout under its own opcode).
///
/// # Errors
///
/// `EncodeError::BadItemCount` when `parameters.len()` differs from the
/// variant's fixed item count.
pub fn encode_with_command(
    command: u8,
    variant: DeviceVariant,
    parameters: &[Parameter],
) -> Result<Frame, EncodeError> {
    let expected = variant.item_count();
    if parameters.len() != expected {
        debug_assert!(
            false,
            "encode: {} parameters for {variant} (expected {expected})",
            parameters.len()
        );
        return Err(EncodeError::BadItemCount {
            expected,
            actual: parameters.len(),
        });
    }
    let payload: Vec<u8> = parameters.iter().map(|p| p.current).collect();
    // item count fits in a byte for every variant
    let length = payload.len() as u8;
    let mut head = Vec::with_capacity(payload.len() + 1);
    head.push(length);
    head.extend_from_slice(&payload);
    let check = checksum(&head, 0, None);
    Ok(Frame {
        command,
        length,
        payload,
        checksum: check,
    })
}

/// Fixed read request understood by both controller models.
#[must_use]
pub const fn read_request() -> [u8; 5] {
    READ_REQUEST
}

/// Check whether `buf` starts with a complete, correctly checksummed frame.
///
/// Returns the detected kind on success. Bytes past the required length are
/// not inspected.
///
/// # Errors
///
/// - `Incomplete` when the buffer is empty or shorter than the frame its
///   command byte announces (keep accumulating).
/// - `UnknownCommand` when the first byte is not a known command.
/// - `LengthMismatch` when the length byte disagrees with the payload size
///   the command byte implies.
/// - `ChecksumMismatch` when the trailing byte does not match.
pub fn validate(buf: &[u8]) -> Result<FrameKind, ValidationError> {
    let Some(&command) = buf.first() else {
        return Err(ValidationError::Incomplete { have: 0, need: 1 });
    };
    let kind = FrameKind::from_command(command).ok_or(ValidationError::UnknownCommand(command))?;
    let need = kind.total_len();
    if buf.len() < need {
        return Err(ValidationError::Incomplete {
            have: buf.len(),
            need,
        });
    }
    let payload_len = need - FRAME_OVERHEAD;
    if usize::from(buf[1]) != payload_len {
        return Err(ValidationError::LengthMismatch {
            expected: payload_len,
            actual: buf[1],
        });
    }
    let expected = checksum(buf, 1, Some(need - 2));
    let actual = buf[need - 1];
    if expected != actual {
        log::debug!("validate: cmd=0x{command:02X} checksum computed=0x{expected:02X} carried=0x{actual:02X}");
        return Err(ValidationError::ChecksumMismatch { expected, actual });
    }
    Ok(kind)
}

/// Validate `buf` and split the leading frame into its fields.
///
/// # Errors
///
/// Same as [`validate`].
pub fn decode(buf: &[u8]) -> Result<Frame, ValidationError> {
    let kind = validate(buf)?;
    let need = kind.total_len();
    Ok(Frame {
        command: buf[0],
        length: buf[1],
        payload: buf[2..need - 1].to_vec(),
        checksum: buf[need - 1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_registry::DeviceRegistry;

    const EXAMPLE_PAYLOAD: [u8; 13] = [12, 20, 10, 5, 5, 30, 25, 15, 25, 5, 10, 4, 2];

    #[test]
    fn encode_ck3864s_defaults_matches_reference_frame() {
        let reg = DeviceRegistry::new(DeviceVariant::Ck3864s);
        let frame = encode(DeviceVariant::Ck3864s, reg.parameters()).expect("encode");
        assert_eq!(frame.payload, EXAMPLE_PAYLOAD);
        assert_eq!(frame.checksum, 181);
        assert_eq!(
            frame.to_bytes(),
            vec![
                0xAA, 0x0D, 0x0C, 0x14, 0x0A, 0x05, 0x05, 0x1E, 0x19, 0x0F, 0x19, 0x05, 0x0A,
                0x04, 0x02, 0xB5
            ]
        );
        assert_eq!(frame.wire_len(), 16);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn encode_rejects_wrong_item_count() {
        let reg = DeviceRegistry::new(DeviceVariant::Ck3862s);
        assert_eq!(
            encode(DeviceVariant::Ck3864s, reg.parameters()),
            Err(EncodeError::BadItemCount {
                expected: 13,
                actual: 8
            })
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "encode: 8 parameters")]
    fn encode_wrong_item_count_asserts_in_debug_builds() {
        let reg = DeviceRegistry::new(DeviceVariant::Ck3862s);
        let _ = encode(DeviceVariant::Ck3864s, reg.parameters());
    }

    #[test]
    fn encoded_frames_validate_and_checksum_over_payload() {
        for variant in DeviceVariant::ALL {
            let reg = DeviceRegistry::new(variant);
            let bytes = encode(variant, reg.parameters()).expect("encode").to_bytes();
            let kind = validate(&bytes).expect("validate");
            assert_eq!(kind.variant(), Some(variant));
            let frame = decode(&bytes).expect("decode");
            let mut head = vec![frame.length];
            head.extend_from_slice(&frame.payload);
            assert_eq!(checksum(&head, 0, None), frame.checksum);
        }
    }

    #[test]
    fn checksum_bounds() {
        let data = [1u8, 2, 3, 250];
        assert_eq!(checksum(&data, 4, None), 0);
        assert_eq!(checksum(&data, 1, None), 255);
        assert_eq!(checksum(&data, 0, Some(2)), 3);
        assert_eq!(checksum(&data, 2, Some(100)), 253);
        assert_eq!(checksum(&[], 0, None), 0);
        // wraps modulo 256
        assert_eq!(checksum(&[200, 100], 0, None), 44);
    }

    #[test]
    fn short_buffers_are_incomplete_never_mismatch() {
        let reg = DeviceRegistry::new(DeviceVariant::Ck3864s);
        let mut bytes = encode(DeviceVariant::Ck3864s, reg.parameters())
            .expect("encode")
            .to_bytes();
        // corrupt the checksum: prefixes must still report Incomplete
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        for n in 0..bytes.len() {
            let err = validate(&bytes[..n]).expect_err("prefix must not validate");
            assert!(err.is_incomplete(), "prefix of {n} bytes gave {err:?}");
        }
        assert!(matches!(
            validate(&bytes),
            Err(ValidationError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn length_byte_must_match_command() {
        // checksum is valid for the bytes, but 0xAA frames carry 13 items
        let mut bytes = vec![CMD_CK3864S, 0x05];
        bytes.extend_from_slice(&[1; 13]);
        bytes.push(checksum(&bytes, 1, None));
        assert_eq!(bytes.len(), CK3864S_FRAME_LEN);
        assert_eq!(
            validate(&bytes),
            Err(ValidationError::LengthMismatch { expected: 13, actual: 5 })
        );
        assert!(decode(&bytes).is_err());

        let short_debug = [CMD_DEBUG, 0x03, 0x10, 0x20, 0x33];
        assert!(matches!(
            validate(&short_debug),
            Err(ValidationError::LengthMismatch { expected: 2, .. })
        ));
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(
            validate(&[0x38, 0x02, 0x00, 0x00, 0x02]),
            Err(ValidationError::UnknownCommand(0x38))
        );
    }

    #[test]
    fn debug_response_is_five_bytes() {
        let ok = [CMD_DEBUG, 0x02, 0x10, 0x20, 0x32];
        assert_eq!(validate(&ok), Ok(FrameKind::DebugResponse));
        let frame = decode(&ok).expect("decode");
        assert_eq!(frame.payload, vec![0x10, 0x20]);
        assert_eq!(
            validate(&ok[..4]),
            Err(ValidationError::Incomplete { have: 4, need: 5 })
        );
    }

    #[test]
    fn read_request_is_fixed() {
        assert_eq!(read_request(), [0x38, 0x02, 0x00, 0x00, 0x02]);
    }
}
