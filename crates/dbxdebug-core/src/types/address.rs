//! Linear addresses and the address resolver.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use dbxdebug_protocol::hex;

use crate::error::{DbxError, DbxResult};

/// Strongly typed linear address in the target
///
/// This wrapper around `u64` keeps addresses from being mixed up with
/// lengths and counts. Memory and breakpoint commands take an `Address`;
/// strings typed by a user go through [`resolve`] first.
///
/// ## Example
///
/// ```rust
/// use dbxdebug_core::types::Address;
///
/// let addr = Address::from(0xb8000);
/// let next_row = addr + 160;
/// assert_eq!(next_row.value(), 0xb80a0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Self(0);

    /// Create a new address from a `u64` value
    ///
    /// Usable in const contexts:
    ///
    /// ```rust
    /// use dbxdebug_core::types::Address;
    ///
    /// const TEXT_VIDEO: Address = Address::new(0xb8000);
    /// ```
    #[must_use]
    pub const fn new(value: u64) -> Self
    {
        Self(value)
    }

    /// Create the linear address of a real-mode `segment:offset` pair
    ///
    /// The linear address is `segment * 16 + offset`. No 20-bit wrap is
    /// applied, so `FFFF:0010` addresses the high memory area.
    ///
    /// ```rust
    /// use dbxdebug_core::types::Address;
    ///
    /// assert_eq!(Address::from_segmented(0xb800, 0x0000).value(), 0xb8000);
    /// assert_eq!(Address::from_segmented(0x1234, 0x5678).value(), 0x179b8);
    /// ```
    #[must_use]
    pub fn from_segmented(segment: u16, offset: u32) -> Self
    {
        Self((u64::from(segment) << 4) + u64::from(offset))
    }

    /// Get the raw `u64` value of this address
    #[must_use]
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    #[must_use]
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Self)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output
    {
        Self(self.0.wrapping_add(rhs))
    }
}

impl FromStr for Address
{
    type Err = DbxError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        resolve(s)
    }
}

/// Resolve an address string to a linear address
///
/// Accepted forms (all hexadecimal):
///
/// | Input | Meaning |
/// |---|---|
/// | `B800:0000`, `0xb800:0x10` | real-mode `segment:offset`, linear = segment * 16 + offset |
/// | `0xb8000`, `b8000`, `b8000h` | flat linear address |
///
/// Protected-mode selectors are not translated: that would need the
/// target's descriptor tables. A `segment:offset` pair is always treated as
/// real mode.
///
/// ## Errors
///
/// `InvalidAddress` for empty input, non-hex digits, a segment wider than
/// 16 bits, an offset wider than 32 bits, or a value that does not fit in
/// 64 bits.
///
/// ## Example
///
/// ```rust
/// use dbxdebug_core::types::address::resolve;
///
/// assert_eq!(resolve("B800:0000")?.value(), 0xb8000);
/// assert_eq!(resolve("0x100")?.value(), 0x100);
/// assert!(resolve("ds:si").is_err());
/// # Ok::<(), dbxdebug_core::error::DbxError>(())
/// ```
pub fn resolve(text: &str) -> DbxResult<Address>
{
    let trimmed = text.trim();
    let invalid = |why: &str| DbxError::InvalidAddress(format!("{trimmed:?}: {why}"));

    if let Some((segment, offset)) = trimmed.split_once(':') {
        let segment = parse_number(segment).ok_or_else(|| invalid("segment is not a hex number"))?;
        let offset = parse_number(offset).ok_or_else(|| invalid("offset is not a hex number"))?;
        let segment = u16::try_from(segment).map_err(|_| invalid("segment does not fit in 16 bits"))?;
        let offset = u32::try_from(offset).map_err(|_| invalid("offset does not fit in 32 bits"))?;
        return Ok(Address::from_segmented(segment, offset));
    }

    parse_number(trimmed)
        .map(Address::new)
        .ok_or_else(|| invalid("expected a hex address or segment:offset"))
}

/// Parse one hex number with an optional `0x` prefix or `h` suffix.
fn parse_number(text: &str) -> Option<u64>
{
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_suffix('h'))
        .or_else(|| text.strip_suffix('H'))
        .unwrap_or(text);
    hex::parse_u64(digits.as_bytes()).ok()
}
