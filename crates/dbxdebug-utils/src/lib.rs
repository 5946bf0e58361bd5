//! # dbxdebug Utilities
//!
//! Logging setup and output formatting shared by the dbxdebug binaries.
//!
//! The library crates only emit `tracing` events; installing a subscriber is
//! left to the binary, through [`init_logging`] or [`init_logging_with_level`].

pub mod hexdump;
pub mod logging;

pub use hexdump::{hexdump, BYTES_PER_LINE};
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogGuard, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
