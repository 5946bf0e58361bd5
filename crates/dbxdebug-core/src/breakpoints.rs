//! Breakpoint and watchpoint descriptions.
//!
//! The stub keeps the breakpoint table: the client only describes what to
//! insert or remove, and does not track what is currently installed.
//!
//! On the wire a breakpoint is `Z<type>,<addr>,<kind>` (insert) or
//! `z<type>,<addr>,<kind>` (remove):
//!
//! | Type | Meaning | Kind field |
//! |---|---|---|
//! | 0 | software breakpoint | [`X86_BREAKPOINT_KIND`] |
//! | 1 | hardware breakpoint | [`X86_BREAKPOINT_KIND`] |
//! | 2 | write watchpoint | watched length |
//! | 3 | read watchpoint | watched length |
//! | 4 | access watchpoint | watched length |

use std::fmt;

use crate::types::Address;

/// Kind value sent for x86 execution breakpoints (the size of `int3`).
pub const X86_BREAKPOINT_KIND: usize = 1;

/// Access type for data watchpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchpointAccess
{
    /// Trigger on read access to the watched memory region.
    Read,
    /// Trigger on write access to the watched memory region.
    Write,
    /// Trigger on either read or write access to the watched memory region.
    ReadWrite,
}

impl fmt::Display for WatchpointAccess
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "access",
        })
    }
}

/// Different kinds of breakpoints / watchpoints the stub can install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointKind
{
    /// Software breakpoint, implemented by the stub (usually with `int3`).
    Software,
    /// Hardware breakpoint, using the emulated CPU's debug registers.
    Hardware,
    /// Data watchpoint (triggers on memory access).
    Watchpoint(WatchpointAccess),
}

impl BreakpointKind
{
    /// Numeric type placed after `Z`/`z`.
    #[must_use]
    pub const fn type_code(self) -> u8
    {
        match self {
            Self::Software => 0,
            Self::Hardware => 1,
            Self::Watchpoint(WatchpointAccess::Write) => 2,
            Self::Watchpoint(WatchpointAccess::Read) => 3,
            Self::Watchpoint(WatchpointAccess::ReadWrite) => 4,
        }
    }
}

impl fmt::Display for BreakpointKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Software => f.write_str("software breakpoint"),
            Self::Hardware => f.write_str("hardware breakpoint"),
            Self::Watchpoint(access) => write!(f, "{access} watchpoint"),
        }
    }
}

/// A breakpoint or watchpoint to insert into, or remove from, the stub.
///
/// ## Example
///
/// ```rust
/// use dbxdebug_core::breakpoints::Breakpoint;
/// use dbxdebug_core::types::Address;
///
/// let bp = Breakpoint::software(Address::new(0x100));
/// assert_eq!(bp.kind.type_code(), 0);
/// assert_eq!(bp.length, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Breakpoint
{
    /// Linear address of the breakpoint or start of the watched range.
    pub address: Address,
    /// Breakpoint type.
    pub kind: BreakpointKind,
    /// Value of the kind field: [`X86_BREAKPOINT_KIND`] for execution
    /// breakpoints, the watched byte count for watchpoints.
    pub length: usize,
}

impl Breakpoint
{
    /// Software breakpoint at `address`.
    #[must_use]
    pub const fn software(address: Address) -> Self
    {
        Self {
            address,
            kind: BreakpointKind::Software,
            length: X86_BREAKPOINT_KIND,
        }
    }

    /// Hardware execution breakpoint at `address`.
    #[must_use]
    pub const fn hardware(address: Address) -> Self
    {
        Self {
            address,
            kind: BreakpointKind::Hardware,
            length: X86_BREAKPOINT_KIND,
        }
    }

    /// Watchpoint on `length` bytes starting at `address`.
    #[must_use]
    pub const fn watchpoint(address: Address, length: usize, access: WatchpointAccess) -> Self
    {
        Self {
            address,
            kind: BreakpointKind::Watchpoint(access),
            length,
        }
    }
}

impl fmt::Display for Breakpoint
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.kind {
            BreakpointKind::Watchpoint(_) => write!(f, "{} at {} ({} bytes)", self.kind, self.address, self.length),
            _ => write!(f, "{} at {}", self.kind, self.address),
        }
    }
}
