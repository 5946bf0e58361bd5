//! # dbxdebug-core
//!
//! Debugger operations for a DOSBox-X GDB stub: memory, registers,
//! breakpoints and execution control.
//!
//! This crate provides:
//! - [`Client`]: a connection to the stub, with one method per operation
//! - [`commands`]: the request encoding and reply decoding for each operation
//! - [`types`]: linear addresses and the address resolver, the x86 register
//!   file, and stop replies
//! - [`breakpoints`]: breakpoint and watchpoint descriptions
//!
//! Packet framing, acknowledgments and retries live in `dbxdebug-protocol`.
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber. Set
//! [`ClientConfig::trace_packets`] to also log every raw frame at `trace`
//! level.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbxdebug_core::prelude::*;
//!
//! let mut client = Client::connect(ClientConfig::new("localhost", 2159))?;
//! let regs = client.read_registers()?;
//! println!("{regs}");
//!
//! client.set_breakpoint(Breakpoint::software(resolve("1234:0100")?))?;
//! let stop = client.continue_execution()?;
//! println!("{}", stop.describe());
//! # Ok::<(), DbxError>(())
//! ```

pub mod breakpoints;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod prelude;
pub mod types;

pub use client::{Client, ConnectionState};
pub use config::ClientConfig;
pub use error::{DbxError, DbxResult};
