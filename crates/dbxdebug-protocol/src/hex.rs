//! Hex text helpers.
//!
//! RSP carries binary data (memory contents, register blobs) as pairs of hex
//! digits, and numbers (addresses, lengths) as minimal-width lowercase hex
//! with no `0x` prefix.

use crate::error::PacketError;

const HEXCHARS: &[u8; 16] = b"0123456789abcdef";

/// Render bytes as lowercase hex pairs.
#[must_use]
pub fn encode(bytes: &[u8]) -> String
{
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(char::from(HEXCHARS[usize::from(byte >> 4)]));
        out.push(char::from(HEXCHARS[usize::from(byte & 0x0f)]));
    }
    out
}

/// Parse hex pairs back into bytes. Either letter case is accepted.
///
/// ## Errors
///
/// `InvalidHex` if the text has odd length or contains a non-hex character.
pub fn decode(text: &[u8]) -> Result<Vec<u8>, PacketError>
{
    if text.len() % 2 != 0 {
        return Err(PacketError::InvalidHex(format!("odd number of digits ({})", text.len())));
    }

    text.chunks_exact(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(high), Some(low)) => Ok((high << 4) | low),
            _ => Err(PacketError::InvalidHex(String::from_utf8_lossy(pair).into_owned())),
        })
        .collect()
}

/// Format a number as minimal lowercase hex (`0x100` becomes `100`).
#[must_use]
pub fn format_u64(value: u64) -> String
{
    format!("{value:x}")
}

/// Parse a hex number without prefix.
///
/// ## Errors
///
/// `InvalidHex` if the text is empty, too long for `u64`, or not hex.
pub fn parse_u64(text: &[u8]) -> Result<u64, PacketError>
{
    if text.is_empty() || text.len() > 16 {
        return Err(PacketError::InvalidHex(format!(
            "expected 1-16 hex digits, got {:?}",
            String::from_utf8_lossy(text)
        )));
    }

    text.iter().try_fold(0u64, |acc, &digit| {
        nibble(digit)
            .map(|value| (acc << 4) | u64::from(value))
            .ok_or_else(|| PacketError::InvalidHex(String::from_utf8_lossy(text).into_owned()))
    })
}

/// Render a byte as exactly two lowercase hex digits.
pub(crate) fn byte_digits(byte: u8) -> [u8; 2]
{
    [HEXCHARS[usize::from(byte >> 4)], HEXCHARS[usize::from(byte & 0x0f)]]
}

const fn nibble(digit: u8) -> Option<u8>
{
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
