//! # Packet Codec
//!
//! RSP frames every payload as:
//!
//! ```text
//! $<payload>#<cc>
//! ```
//!
//! where `cc` is the sum of the payload bytes modulo 256, written as two
//! lowercase hex digits. The checksum is always recomputed from the payload
//! when encoding; it is never carried around separately.
//!
//! Payload bytes that would break the framing (`$`, `#`, `}` and `*`) are
//! sent as `}` followed by the byte XOR `0x20`. The checksum covers the
//! escaped bytes as they appear on the wire.
//!
//! Acknowledgments are single bytes outside any frame: `+` accepts the last
//! packet, `-` asks for a retransmission.
//!
//! Everything here is pure; the ack/retry policy lives in
//! [`crate::exchange`].

use crate::error::PacketError;
use crate::hex;

/// First byte of every packet.
pub const PACKET_START: u8 = b'$';

/// Separates the payload from the checksum digits.
pub const CHECKSUM_MARKER: u8 = b'#';

/// Number of hex digits following [`CHECKSUM_MARKER`].
pub const CHECKSUM_DIGITS: usize = 2;

/// Marks the next byte as escaped.
pub const ESCAPE: u8 = b'}';

/// XOR applied to an escaped byte.
const ESCAPE_XOR: u8 = 0x20;

/// Run-length marker; escaped so a payload never reads as compressed.
const RUN_LENGTH: u8 = b'*';

/// Single-byte acknowledgment exchanged outside packet framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckSymbol
{
    /// `+`: packet received intact.
    Positive,
    /// `-`: packet corrupted, send it again.
    Negative,
}

impl AckSymbol
{
    /// Interpret a byte as an ack symbol. Returns `None` for anything else.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self>
    {
        match byte {
            b'+' => Some(Self::Positive),
            b'-' => Some(Self::Negative),
            _ => None,
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_byte(self) -> u8
    {
        match self {
            Self::Positive => b'+',
            Self::Negative => b'-',
        }
    }
}

/// Sum of the payload bytes modulo 256.
#[must_use]
pub fn checksum(payload: &[u8]) -> u8
{
    payload.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}

/// Frame a payload for the wire.
///
/// ```rust
/// use dbxdebug_protocol::packet;
///
/// assert_eq!(packet::encode(b"OK"), b"$OK#9a");
/// assert_eq!(packet::encode(b"a#b"), b"$a}\x03b#43");
/// ```
#[must_use]
pub fn encode(payload: &[u8]) -> Vec<u8>
{
    let mut frame = Vec::with_capacity(payload.len() + 1 + 1 + CHECKSUM_DIGITS);
    frame.push(PACKET_START);
    for &byte in payload {
        if needs_escape(byte) {
            frame.extend_from_slice(&[ESCAPE, byte ^ ESCAPE_XOR]);
        } else {
            frame.push(byte);
        }
    }
    let sum = checksum(&frame[1..]);
    frame.push(CHECKSUM_MARKER);
    frame.extend_from_slice(&hex::byte_digits(sum));
    frame
}

const fn needs_escape(byte: u8) -> bool
{
    matches!(byte, PACKET_START | CHECKSUM_MARKER | ESCAPE | RUN_LENGTH)
}

fn unescape(wire: &[u8]) -> Result<Vec<u8>, PacketError>
{
    let mut payload = Vec::with_capacity(wire.len());
    let mut bytes = wire.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESCAPE {
            let Some(&escaped) = bytes.next() else {
                return Err(PacketError::Malformed("payload ends with an escape byte".to_string()));
            };
            payload.push(escaped ^ ESCAPE_XOR);
        } else {
            payload.push(byte);
        }
    }
    Ok(payload)
}

/// Strip the framing from a complete packet and verify its checksum.
///
/// ## Errors
///
/// - `Malformed`: missing `$`, missing `#`, not exactly two digits after it,
///   or a dangling `}` escape
/// - `InvalidHex`: checksum digits are not hex
/// - `Checksum`: digits are valid but disagree with the payload
pub fn decode(frame: &[u8]) -> Result<Vec<u8>, PacketError>
{
    let Some(body) = frame.strip_prefix(&[PACKET_START]) else {
        return Err(PacketError::Malformed("packet does not start with '$'".to_string()));
    };

    let Some(marker) = body.iter().position(|&byte| byte == CHECKSUM_MARKER) else {
        return Err(PacketError::Malformed("packet has no '#' checksum marker".to_string()));
    };

    let (payload, trailer) = body.split_at(marker);
    let digits = &trailer[1..];
    if digits.len() != CHECKSUM_DIGITS {
        return Err(PacketError::Malformed(format!(
            "expected {CHECKSUM_DIGITS} checksum digits, found {}",
            digits.len()
        )));
    }

    let expected = match hex::decode(digits)?.as_slice() {
        [value] => *value,
        _ => return Err(PacketError::Malformed("checksum is not one byte".to_string())),
    };
    let actual = checksum(payload);
    if expected != actual {
        return Err(PacketError::Checksum { expected, actual });
    }

    unescape(payload)
}

/// Length of the complete packet at the start of `buffer`, if one has fully
/// arrived.
///
/// `buffer` must begin with [`PACKET_START`]. Returns `None` while the
/// checksum marker or its digits are still missing, so a reader can keep
/// accumulating partial reads.
#[must_use]
pub fn complete_frame_len(buffer: &[u8]) -> Option<usize>
{
    if buffer.first() != Some(&PACKET_START) {
        return None;
    }
    let marker = buffer.iter().position(|&byte| byte == CHECKSUM_MARKER)?;
    let len = marker + 1 + CHECKSUM_DIGITS;
    (buffer.len() >= len).then_some(len)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn encode_appends_checksum()
    {
        assert_eq!(encode(b""), b"$#00");
        assert_eq!(encode(b"g"), b"$g#67");
        assert_eq!(encode(b"m100,4"), b"$m100,4#5e");
    }

    #[test]
    fn decode_strips_framing()
    {
        assert_eq!(decode(b"$OK#9a").unwrap(), b"OK");
        assert_eq!(decode(b"$#00").unwrap(), b"");
    }

    #[test]
    fn decode_reports_checksum_mismatch()
    {
        assert_eq!(
            decode(b"$OK#9b"),
            Err(PacketError::Checksum {
                expected: 0x9b,
                actual: 0x9a
            })
        );
    }

    #[test]
    fn decode_rejects_bad_framing()
    {
        assert!(matches!(decode(b"OK#9a"), Err(PacketError::Malformed(_))));
        assert!(matches!(decode(b"$OK"), Err(PacketError::Malformed(_))));
        assert!(matches!(decode(b"$OK#9"), Err(PacketError::Malformed(_))));
        assert!(matches!(decode(b"$OK#zz"), Err(PacketError::InvalidHex(_))));
    }

    #[test]
    fn escapes_framing_bytes()
    {
        assert_eq!(encode(b"}"), b"$}]#da");
        assert_eq!(encode(b"$*"), b"$}\x04}\x0a#08");
        assert_eq!(decode(b"$a}\x03b#43").unwrap(), b"a#b");
        assert!(matches!(decode(b"$a}#de"), Err(PacketError::Malformed(_))));
    }

    #[test]
    fn frame_length_waits_for_checksum_digits()
    {
        assert_eq!(complete_frame_len(b"$OK"), None);
        assert_eq!(complete_frame_len(b"$OK#"), None);
        assert_eq!(complete_frame_len(b"$OK#9"), None);
        assert_eq!(complete_frame_len(b"$OK#9a"), Some(6));
        assert_eq!(complete_frame_len(b"$OK#9a+$S05"), Some(6));
        assert_eq!(complete_frame_len(b"+$OK#9a"), None);
    }

    #[test]
    fn ack_symbols()
    {
        assert_eq!(AckSymbol::from_byte(b'+'), Some(AckSymbol::Positive));
        assert_eq!(AckSymbol::from_byte(b'-'), Some(AckSymbol::Negative));
        assert_eq!(AckSymbol::from_byte(b'x'), None);
        assert_eq!(AckSymbol::Positive.as_byte(), b'+');
    }
}
