//! Common imports for users of the client

pub use crate::breakpoints::{Breakpoint, BreakpointKind, WatchpointAccess};
pub use crate::client::{Client, ConnectionState};
pub use crate::config::ClientConfig;
pub use crate::error::{DbxError, DbxResult};
pub use crate::types::{
    resolve, Address, Register, RegisterSet, SegmentWidth, Signal, StopKind, StopReason,
    StopReply,
};
