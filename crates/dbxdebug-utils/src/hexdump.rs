//! Classic offset / hex / ASCII dump of a byte buffer.
//!
//! ```text
//! 000b8000  48 07 65 07 6c 07 6c 07  6f 07 20 07 20 07 20 07  |H.e.l.l.o. . . .|
//! ```

/// Bytes shown on each line.
pub const BYTES_PER_LINE: usize = 16;

/// Format `data` as dump lines, numbering offsets from `start`.
///
/// Each line has the address (8 hex digits, wider if needed), the bytes in
/// two groups of eight, and the printable ASCII characters between bars
/// (anything else shows as `.`). The last line is padded so the ASCII column
/// stays aligned.
///
/// ## Example
///
/// ```rust
/// use dbxdebug_utils::hexdump;
///
/// let lines = hexdump(b"Hi!", 0x100);
/// assert_eq!(
///     lines,
///     ["00000100  48 69 21                                          |Hi!|"]
/// );
/// ```
#[must_use]
pub fn hexdump(data: &[u8], start: u64) -> Vec<String>
{
    data.chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(index, line)| format_line(start.wrapping_add((index * BYTES_PER_LINE) as u64), line))
        .collect()
}

fn format_line(address: u64, bytes: &[u8]) -> String
{
    let mut hex = String::with_capacity(BYTES_PER_LINE * 3 + 1);
    for column in 0..BYTES_PER_LINE {
        if column == BYTES_PER_LINE / 2 {
            hex.push(' ');
        }
        match bytes.get(column) {
            Some(byte) => hex.push_str(&format!("{byte:02x} ")),
            None => hex.push_str("   "),
        }
    }

    let ascii: String = bytes
        .iter()
        .map(|&byte| if byte.is_ascii_graphic() || byte == b' ' { char::from(byte) } else { '.' })
        .collect();

    format!("{address:08x}  {hex} |{ascii}|")
}
