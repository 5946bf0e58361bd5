//! Stop replies: why the target halted after `s` or `c`.
//!
//! Two shapes are understood:
//!
//! ```text
//! S<sig>                       signal only
//! T<sig><name>:<value>;...     signal plus named fields
//! ```
//!
//! `sig` is two hex digits. Field names are kept verbatim (a name can be a
//! register number like `05`, or a keyword like `swbreak` or `watch`).

use std::fmt;

use dbxdebug_protocol::hex;

use crate::breakpoints::WatchpointAccess;
use crate::error::{DbxError, DbxResult};
use crate::types::Address;

/// Signal reported in a stop reply
///
/// The numbers follow GDB's target signal numbering. Numbers without a
/// variant are kept as `Other` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal
{
    /// SIGINT (2): the target was interrupted
    Interrupt,
    /// SIGILL (4): illegal instruction
    IllegalInstruction,
    /// SIGTRAP (5): single-step completed or breakpoint hit
    Trap,
    /// SIGABRT (6)
    Abort,
    /// SIGBUS (7)
    Bus,
    /// SIGFPE (8): arithmetic exception such as divide by zero
    FloatingPoint,
    /// SIGKILL (9)
    Kill,
    /// SIGSEGV (11): memory protection fault
    SegmentationFault,
    /// SIGTERM (15)
    Terminate,
    /// Any other signal number
    Other(u8),
}

impl Signal
{
    /// Map a signal number to its variant.
    #[must_use]
    pub const fn from_number(number: u8) -> Self
    {
        match number {
            2 => Self::Interrupt,
            4 => Self::IllegalInstruction,
            5 => Self::Trap,
            6 => Self::Abort,
            7 => Self::Bus,
            8 => Self::FloatingPoint,
            9 => Self::Kill,
            11 => Self::SegmentationFault,
            15 => Self::Terminate,
            other => Self::Other(other),
        }
    }

    /// Signal number as sent on the wire.
    #[must_use]
    pub const fn number(self) -> u8
    {
        match self {
            Self::Interrupt => 2,
            Self::IllegalInstruction => 4,
            Self::Trap => 5,
            Self::Abort => 6,
            Self::Bus => 7,
            Self::FloatingPoint => 8,
            Self::Kill => 9,
            Self::SegmentationFault => 11,
            Self::Terminate => 15,
            Self::Other(number) => number,
        }
    }

    /// Conventional signal name, if the number has one.
    #[must_use]
    pub const fn name(self) -> Option<&'static str>
    {
        match self {
            Self::Interrupt => Some("SIGINT"),
            Self::IllegalInstruction => Some("SIGILL"),
            Self::Trap => Some("SIGTRAP"),
            Self::Abort => Some("SIGABRT"),
            Self::Bus => Some("SIGBUS"),
            Self::FloatingPoint => Some("SIGFPE"),
            Self::Kill => Some("SIGKILL"),
            Self::SegmentationFault => Some("SIGSEGV"),
            Self::Terminate => Some("SIGTERM"),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for Signal
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.number()),
            None => write!(f, "signal {}", self.number()),
        }
    }
}

/// Interpretation of a stop reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason
{
    /// The stub reported a software breakpoint (`swbreak` field)
    SoftwareBreakpoint,
    /// The stub reported a hardware breakpoint (`hwbreak` field)
    HardwareBreakpoint,
    /// A watchpoint fired (`watch`, `rwatch` or `awatch` field)
    Watchpoint
    {
        /// Kind of access that triggered it
        access: WatchpointAccess,
        /// Data address, when the stub included a parseable one
        address: Option<Address>,
    },
    /// No more specific reason than the signal itself
    Signal(Signal),
}

/// Which stop reply packet the stub sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind
{
    /// `S<sig>`: signal only
    Short,
    /// `T<sig>...`: signal plus `name:value` fields, possibly none
    Detailed,
}

impl StopKind
{
    /// Leading byte on the wire.
    #[must_use]
    pub const fn as_byte(self) -> u8
    {
        match self {
            Self::Short => b'S',
            Self::Detailed => b'T',
        }
    }
}

/// Decoded `S`/`T` stop reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReply
{
    /// Packet form the reply arrived in
    pub kind: StopKind,
    /// Signal that stopped the target
    pub signal: Signal,
    /// `name:value` pairs from a `T` reply, in wire order (empty for `S`)
    pub fields: Vec<(String, String)>,
}

impl StopReply
{
    /// Parse a stop reply payload.
    ///
    /// ## Errors
    ///
    /// `Protocol` if the payload is not `S<sig>` or `T<sig>[name:value;]...`.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use dbxdebug_core::types::{Signal, StopReply};
    ///
    /// let stop = StopReply::parse(b"T0505:00000000;")?;
    /// assert_eq!(stop.signal, Signal::Trap);
    /// assert_eq!(stop.field("05"), Some("00000000"));
    /// # Ok::<(), dbxdebug_core::error::DbxError>(())
    /// ```
    pub fn parse(payload: &[u8]) -> DbxResult<Self>
    {
        let malformed = |why: &str| {
            DbxError::Protocol(format!(
                "malformed stop reply {:?}: {why}",
                String::from_utf8_lossy(payload)
            ))
        };

        let (kind, rest) = payload.split_first().ok_or_else(|| malformed("empty"))?;
        if rest.len() < 2 {
            return Err(malformed("missing signal number"));
        }
        let (signal_digits, body) = rest.split_at(2);
        let number = hex::decode(signal_digits).map_err(|_| malformed("signal is not hex"))?[0];
        let signal = Signal::from_number(number);

        match kind {
            b'S' if body.is_empty() => Ok(Self {
                kind: StopKind::Short,
                signal,
                fields: Vec::new(),
            }),
            b'S' => Err(malformed("unexpected data after signal")),
            b'T' => {
                let body = std::str::from_utf8(body).map_err(|_| malformed("fields are not text"))?;
                let fields = body
                    .split(';')
                    .filter(|field| !field.is_empty())
                    .map(|field| match field.split_once(':') {
                        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
                        _ => Err(malformed("field is not name:value")),
                    })
                    .collect::<DbxResult<Vec<_>>>()?;
                Ok(Self {
                    kind: StopKind::Detailed,
                    signal,
                    fields,
                })
            }
            _ => Err(malformed("expected 'S' or 'T'")),
        }
    }

    /// Value of the first field with the given name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str>
    {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Derive the most specific reason the fields support.
    #[must_use]
    pub fn reason(&self) -> StopReason
    {
        for (name, value) in &self.fields {
            let access = match name.as_str() {
                "swbreak" => return StopReason::SoftwareBreakpoint,
                "hwbreak" => return StopReason::HardwareBreakpoint,
                "watch" => WatchpointAccess::Write,
                "rwatch" => WatchpointAccess::Read,
                "awatch" => WatchpointAccess::ReadWrite,
                _ => continue,
            };
            let address = hex::parse_u64(value.as_bytes()).ok().map(Address::new);
            return StopReason::Watchpoint { access, address };
        }
        StopReason::Signal(self.signal)
    }

    /// Human-readable summary, e.g. `Stopped by SIGTRAP (5)`.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self.reason() {
            StopReason::SoftwareBreakpoint => format!("Hit software breakpoint ({})", self.signal),
            StopReason::HardwareBreakpoint => format!("Hit hardware breakpoint ({})", self.signal),
            StopReason::Watchpoint {
                access,
                address: Some(address),
            } => format!("Hit {access} watchpoint at {address}"),
            StopReason::Watchpoint { access, address: None } => format!("Hit {access} watchpoint"),
            StopReason::Signal(signal) => format!("Stopped by {signal}"),
        }
    }
}

impl fmt::Display for StopReply
{
    /// Renders the reply in wire form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}{:02x}", char::from(self.kind.as_byte()), self.signal.number())?;
        for (name, value) in &self.fields {
            write!(f, "{name}:{value};")?;
        }
        Ok(())
    }
}
