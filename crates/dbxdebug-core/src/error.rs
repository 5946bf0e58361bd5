//! # Error Types
//!
//! Every way a client operation can fail.
//!
//! We use `thiserror` to derive `Error` and the display messages.
//!
//! ## Error Categories
//!
//! 1. **Connection errors**: `Transport`, `NotConnected`
//! 2. **Reply errors**: `Protocol` (reply has the wrong shape)
//! 3. **Stub-reported errors**: `MemoryAccess`, `Remote`, `Unsupported`
//! 4. **Caller errors**: `InvalidAddress`, `InvalidArgument`
//!
//! Checksum failures and lost acknowledgments never show up here: the
//! exchange engine retries them, and only if the retry budget runs out do
//! they surface as `Transport(RetriesExhausted { .. })`.

use dbxdebug_protocol::TransportError;
use thiserror::Error;

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum DbxError
{
    /// The connection failed, was closed, or retries were exhausted
    ///
    /// After this error the client is `Disconnected`.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The stub's reply does not have the shape the command expects
    ///
    /// Examples:
    /// - a memory read returning fewer bytes than requested
    /// - a register blob shorter than the register layout
    /// - a stop reply that is neither `S<nn>` nor `T<nn>...`
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The stub refused a memory read or write with `E<nn>`
    #[error("Memory access error at 0x{address:x} ({length} bytes): stub replied E{code:02x}")]
    MemoryAccess
    {
        /// Linear start address of the failed transfer
        address: u64,
        /// Number of bytes in the failed transfer
        length: usize,
        /// Error code from the `E<nn>` reply
        code: u8,
    },

    /// The stub refused a non-memory command with `E<nn>`
    #[error("Stub rejected {operation}: E{code:02x}")]
    Remote
    {
        /// Command that was rejected
        operation: &'static str,
        /// Error code from the `E<nn>` reply
        code: u8,
    },

    /// The stub answered with an empty packet, meaning it does not implement the command
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// An operation was attempted while the client is disconnected
    ///
    /// ## Solution
    ///
    /// Call `Client::reconnect()` (or create a new client) first.
    #[error("Not connected to a debug stub")]
    NotConnected,

    /// An address string could not be resolved to a linear address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid argument passed to a client function
    ///
    /// Examples:
    /// - a segment register value wider than 16 bits
    /// - a transfer whose end address overflows
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl DbxError
{
    /// Short name of the error category, for reporting at the CLI boundary.
    #[must_use]
    pub const fn kind(&self) -> &'static str
    {
        match self {
            Self::Transport(_) => "TransportError",
            Self::Protocol(_) => "ProtocolError",
            Self::MemoryAccess { .. } => "MemoryAccessError",
            Self::Remote { .. } => "RemoteError",
            Self::Unsupported(_) => "UnsupportedOperation",
            Self::NotConnected => "NotConnectedError",
            Self::InvalidAddress(_) => "InvalidAddressError",
            Self::InvalidArgument(_) => "InvalidArgumentError",
        }
    }
}

/// Convenience type alias for `Result<T, DbxError>`
///
/// ```rust
/// use dbxdebug_core::error::DbxResult;
/// fn foo() -> DbxResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type DbxResult<T> = std::result::Result<T, DbxError>;
