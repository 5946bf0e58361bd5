//! # dbxdebug-protocol
//!
//! Wire layer for talking to a GDB Remote Serial Protocol (RSP) stub.
//!
//! This crate knows nothing about memory, registers or breakpoints. It moves
//! opaque payloads between the client and the stub:
//!
//! - [`packet`]: framing (`$<payload>#<checksum>`) and acknowledgment symbols
//! - [`hex`]: the printable hex encoding RSP uses for binary data and numbers
//! - [`transport`]: the byte pipe ([`Transport`] trait and its TCP implementation)
//! - [`exchange`]: one reliable request/reply round trip with bounded retries
//!
//! ## Layering
//!
//! ```text
//! caller -> Exchange::exchange(payload)
//!             -> packet::encode        (frame + checksum)
//!             -> Transport::send       (bytes on the wire)
//!             <- Transport::receive    (partial reads accumulated)
//!             <- packet::decode        (checksum verified)
//! ```
//!
//! The library never installs a logger. Retries and packet traffic are
//! reported through `tracing` events, which are inert until the embedding
//! binary installs a subscriber.

pub mod error;
pub mod exchange;
pub mod hex;
pub mod packet;
pub mod transport;

pub use error::{FailureCause, PacketError, TransportError, TransportResult};
pub use exchange::{Exchange, ExchangeStats, ReplyWait, RetryPolicy};
pub use packet::AckSymbol;
pub use transport::{CancelHandle, TcpTransport, Transport};
