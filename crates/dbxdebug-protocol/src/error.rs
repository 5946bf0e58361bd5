//! # Error Types
//!
//! Errors produced below the command layer.
//!
//! [`PacketError`] is local to the codec: the exchange engine turns every
//! packet error into a retry, so callers of [`crate::Exchange`] only ever see
//! a [`TransportError`].

use std::fmt;
use std::io;

use thiserror::Error;

/// Why a single exchange attempt did not produce a reply.
///
/// Every failed attempt records one of these; when the retry budget runs out
/// the last one is carried by [`TransportError::RetriesExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause
{
    /// No acknowledgment or no complete reply arrived before the timeout.
    Timeout,
    /// The stub answered the request with `-`.
    NegativeAck,
    /// The reply arrived but its checksum did not match its payload.
    Checksum,
    /// The reply arrived but was not a well-formed packet.
    Malformed,
}

impl fmt::Display for FailureCause
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let text = match self {
            Self::Timeout => "timed out",
            Self::NegativeAck => "negative acknowledgment",
            Self::Checksum => "checksum mismatch",
            Self::Malformed => "malformed reply",
        };
        f.write_str(text)
    }
}

/// Errors from encoding or decoding a single packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError
{
    /// The checksum digits do not match the sum of the payload bytes.
    #[error("checksum mismatch: packet carries {expected:02x}, payload sums to {actual:02x}")]
    Checksum
    {
        /// Checksum transmitted after `#`.
        expected: u8,
        /// Checksum computed over the received payload.
        actual: u8,
    },

    /// The bytes are not framed as `$<payload>#<cc>`.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// A field that must be hexadecimal is not.
    #[error("invalid hex data: {0}")]
    InvalidHex(String),
}

/// Errors surfaced by the transport and the exchange engine.
///
/// Anything that reaches a caller as a `TransportError` is final: the
/// retry budget has already been spent, or retrying cannot help (the peer
/// closed the connection).
#[derive(Error, Debug)]
pub enum TransportError
{
    /// The TCP connection to the stub could not be established.
    #[error("failed to connect to {address}: {source}")]
    Connect
    {
        /// `host:port` that was dialed.
        address: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The stub closed or reset the connection.
    #[error("connection closed by the stub")]
    ConnectionClosed,

    /// Any other socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Every attempt failed; `cause` is what went wrong on the last one.
    #[error("no valid reply after {attempts} attempts (last failure: {cause})")]
    RetriesExhausted
    {
        /// Number of times the request was sent.
        attempts: u32,
        /// Failure observed on the final attempt.
        cause: FailureCause,
    },
}

/// Convenience alias for results from this crate.
pub type TransportResult<T> = std::result::Result<T, TransportError>;
