//! # Types
//!
//! Target-side values the client reads, writes and reports: linear
//! addresses, the x86 register file, and stop replies.

pub mod address;
pub mod registers;
pub mod stop;

pub use address::{resolve, Address};
pub use registers::{Register, RegisterSet, SegmentWidth};
pub use stop::{Signal, StopKind, StopReason, StopReply};
