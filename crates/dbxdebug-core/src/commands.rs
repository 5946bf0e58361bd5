//! # Command Layer
//!
//! Maps each debugger operation to one RSP request payload and decodes the
//! single reply shape that request expects.
//!
//! ## Requests
//!
//! | Request | Payload |
//! |---|---|
//! | `ReadMemory` | `m<addr>,<len>` |
//! | `WriteMemory` | `M<addr>,<len>:<hex bytes>` |
//! | `ReadRegisters` | `g` |
//! | `WriteRegisters` | `G<register blob>` |
//! | `InsertBreakpoint` | `Z<type>,<addr>,<kind>` |
//! | `RemoveBreakpoint` | `z<type>,<addr>,<kind>` |
//! | `Step` | `s` |
//! | `Continue` | `c` |
//!
//! Numbers are lowercase hex without prefix or padding.
//!
//! ## Replies
//!
//! Two reply shapes mean the same thing for every command: `E<nn>` is a
//! refusal with an error code, and an empty packet means the stub does not
//! implement the command. Anything else must match the request: hex data
//! for `m`/`g`, `OK` for writes and breakpoints, a stop reply for `s`/`c`.

use dbxdebug_protocol::{hex, ReplyWait};

use crate::breakpoints::Breakpoint;
use crate::error::{DbxError, DbxResult};
use crate::types::{Address, RegisterSet, SegmentWidth, StopReply};

/// One request to the stub, built per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRequest<'a>
{
    /// Read `length` bytes starting at `address`.
    ReadMemory
    {
        address: Address,
        length: usize,
    },
    /// Write `data` starting at `address`.
    WriteMemory
    {
        address: Address,
        data: &'a [u8],
    },
    /// Read the whole register file.
    ReadRegisters,
    /// Replace the whole register file.
    WriteRegisters
    {
        registers: &'a RegisterSet,
        segments: SegmentWidth,
    },
    InsertBreakpoint(Breakpoint),
    RemoveBreakpoint(Breakpoint),
    /// Execute one instruction.
    Step,
    /// Resume until the target stops.
    Continue,
}

/// Decoded reply, before the caller checks it is the shape it wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply
{
    /// Hex data from `m` or `g`, already decoded to bytes.
    RawBytes(Vec<u8>),
    /// `OK`
    Ok,
    /// `E<nn>`
    Error(u8),
    /// `S<sig>` or `T<sig>...`
    StopReply(StopReply),
    /// Empty packet: command not supported.
    Empty,
}

impl CommandRequest<'_>
{
    /// Operation name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str
    {
        match self {
            Self::ReadMemory { .. } => "read_memory",
            Self::WriteMemory { .. } => "write_memory",
            Self::ReadRegisters => "read_registers",
            Self::WriteRegisters { .. } => "write_registers",
            Self::InsertBreakpoint(_) => "set_breakpoint",
            Self::RemoveBreakpoint(_) => "clear_breakpoint",
            Self::Step => "step",
            Self::Continue => "continue",
        }
    }

    /// Render the request payload (without `$...#cc` framing).
    ///
    /// ```rust
    /// use dbxdebug_core::commands::CommandRequest;
    /// use dbxdebug_core::types::Address;
    ///
    /// let read = CommandRequest::ReadMemory { address: Address::new(0x100), length: 4 };
    /// assert_eq!(read.encode(), "m100,4");
    /// ```
    #[must_use]
    pub fn encode(&self) -> String
    {
        match self {
            Self::ReadMemory { address, length } => {
                format!("m{},{length:x}", hex::format_u64(address.value()))
            }
            Self::WriteMemory { address, data } => format!(
                "M{},{:x}:{}",
                hex::format_u64(address.value()),
                data.len(),
                hex::encode(data)
            ),
            Self::ReadRegisters => "g".to_string(),
            Self::WriteRegisters { registers, segments } => format!("G{}", registers.encode(*segments)),
            Self::InsertBreakpoint(bp) => breakpoint_payload('Z', bp),
            Self::RemoveBreakpoint(bp) => breakpoint_payload('z', bp),
            Self::Step => "s".to_string(),
            Self::Continue => "c".to_string(),
        }
    }

    /// How long the exchange may wait for this request's reply.
    #[must_use]
    pub const fn reply_wait(&self) -> ReplyWait
    {
        match self {
            Self::Continue => ReplyWait::Unbounded,
            _ => ReplyWait::Bounded,
        }
    }

    /// Decode a reply payload into the shape this request expects.
    ///
    /// ## Errors
    ///
    /// `Protocol` if the payload is neither an error, an empty packet, nor
    /// the expected shape.
    pub fn parse_reply(&self, payload: &[u8]) -> DbxResult<CommandReply>
    {
        if payload.is_empty() {
            return Ok(CommandReply::Empty);
        }
        if let Some(code) = error_code(payload) {
            return Ok(CommandReply::Error(code));
        }

        match self {
            Self::ReadMemory { .. } | Self::ReadRegisters => hex::decode(payload)
                .map(CommandReply::RawBytes)
                .map_err(|err| DbxError::Protocol(format!("{} reply is not hex data: {err}", self.name()))),
            Self::WriteMemory { .. }
            | Self::WriteRegisters { .. }
            | Self::InsertBreakpoint(_)
            | Self::RemoveBreakpoint(_) => {
                if payload == b"OK" {
                    Ok(CommandReply::Ok)
                } else {
                    Err(DbxError::Protocol(format!(
                        "{} expected OK, got {:?}",
                        self.name(),
                        String::from_utf8_lossy(payload)
                    )))
                }
            }
            Self::Step | Self::Continue => StopReply::parse(payload).map(CommandReply::StopReply),
        }
    }

    /// Error for an `E<nn>` reply to this request.
    #[must_use]
    pub fn refusal(&self, code: u8) -> DbxError
    {
        match self {
            Self::ReadMemory { address, length } => DbxError::MemoryAccess {
                address: address.value(),
                length: *length,
                code,
            },
            Self::WriteMemory { address, data } => DbxError::MemoryAccess {
                address: address.value(),
                length: data.len(),
                code,
            },
            _ => DbxError::Remote {
                operation: self.name(),
                code,
            },
        }
    }
}

fn breakpoint_payload(prefix: char, bp: &Breakpoint) -> String
{
    format!(
        "{prefix}{},{},{:x}",
        bp.kind.type_code(),
        hex::format_u64(bp.address.value()),
        bp.length
    )
}

/// `E` followed by exactly two hex digits.
fn error_code(payload: &[u8]) -> Option<u8>
{
    match payload {
        [b'E', digits @ ..] if digits.len() == 2 => hex::decode(digits).ok().map(|code| code[0]),
        _ => None,
    }
}
