//! # Client
//!
//! The debugger-facing API: one method per operation, each turned into a
//! single RSP request by the [command layer](crate::commands) and sent
//! through the [exchange engine](dbxdebug_protocol::Exchange).
//!
//! ## Lifecycle
//!
//! 1. Connect: `Client::connect(config)` (state `Connected`)
//! 2. Inspect/manipulate: `read_memory()`, `read_registers()`, `set_breakpoint()`, ...
//! 3. Disconnect: `disconnect()`, or drop the client (state `Disconnected`)
//!
//! Any transport failure (connection closed, socket error, retries
//! exhausted) also moves the client to `Disconnected`. Every operation on a
//! disconnected client fails with `NotConnected` without touching the
//! network; `reconnect()` opens a fresh connection with the same config.
//!
//! ## Thread Safety
//!
//! RSP allows one outstanding request per connection and every operation
//! takes `&mut self`. The client can move between threads but is not meant
//! to be shared; wrap it in a `Mutex` if several threads need it. The one
//! cross-thread action supported is aborting a blocked
//! [`continue_execution`](Client::continue_execution) through a
//! [`CancelHandle`].

use dbxdebug_protocol::{CancelHandle, Exchange, ExchangeStats, TcpTransport, Transport, TransportError};
use tracing::{debug, info, warn};

use crate::breakpoints::Breakpoint;
use crate::commands::{CommandReply, CommandRequest};
use crate::config::ClientConfig;
use crate::error::{DbxError, DbxResult};
use crate::types::{Address, Register, RegisterSet, StopReply};

/// Whether the client currently holds a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState
{
    /// No connection; operations fail with `NotConnected`.
    Disconnected,
    /// Connected to a stub; operations go over the wire.
    Connected,
}

/// GDB remote protocol client for a DOSBox-X debug stub
///
/// ## Example
///
/// ```rust,no_run
/// use dbxdebug_core::{Client, ClientConfig};
/// use dbxdebug_core::types::resolve;
///
/// let mut client = Client::connect(ClientConfig::default())?;
/// let tick_count = client.read_memory(resolve("0040:006C")?, 4)?;
/// println!("BIOS ticks: {tick_count:02x?}");
/// # Ok::<(), dbxdebug_core::error::DbxError>(())
/// ```
#[derive(Debug)]
pub struct Client<T: Transport = TcpTransport>
{
    config: ClientConfig,
    exchange: Option<Exchange<T>>,
}

impl Client<TcpTransport>
{
    /// Open a TCP connection to the stub named in `config`.
    ///
    /// ## Errors
    ///
    /// `Transport(Connect { .. })` if the host does not resolve or the
    /// connection is refused or times out.
    pub fn connect(config: ClientConfig) -> DbxResult<Self>
    {
        let transport = open(&config)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Drop the current connection (if any) and connect again.
    ///
    /// ## Errors
    ///
    /// Same as [`Client::connect`]; the client stays `Disconnected` on failure.
    pub fn reconnect(&mut self) -> DbxResult<()>
    {
        self.disconnect();
        let transport = open(&self.config)?;
        self.exchange = Some(self.new_exchange(transport));
        Ok(())
    }

    /// Handle that aborts a blocked operation from another thread.
    ///
    /// Cancelling shuts the socket down: the blocked call returns a
    /// `Transport` error and the client ends up `Disconnected`.
    ///
    /// ## Errors
    ///
    /// `NotConnected`, or `Transport(Io)` if the socket cannot be duplicated.
    pub fn cancel_handle(&self) -> DbxResult<CancelHandle>
    {
        let exchange = self.exchange.as_ref().ok_or(DbxError::NotConnected)?;
        exchange
            .transport()
            .cancel_handle()
            .map_err(|err| DbxError::Transport(TransportError::Io(err)))
    }
}

fn open(config: &ClientConfig) -> DbxResult<TcpTransport>
{
    info!(address = %config.address(), "connecting to debug stub");
    Ok(TcpTransport::connect(&config.host, config.port, config.timeout)?)
}

impl<T: Transport> Client<T>
{
    /// Wrap an already connected transport.
    ///
    /// Used for transports other than TCP, and by tests.
    pub fn with_transport(transport: T, config: ClientConfig) -> Self
    {
        let mut client = Self { config, exchange: None };
        client.exchange = Some(client.new_exchange(transport));
        client
    }

    fn new_exchange(&self, transport: T) -> Exchange<T>
    {
        Exchange::new(transport, self.config.retry_policy()).with_packet_tracing(self.config.trace_packets)
    }

    /// Settings this client was created with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig
    {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState
    {
        if self.exchange.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool
    {
        self.exchange.is_some()
    }

    /// Traffic counters for the current connection, if there is one.
    #[must_use]
    pub fn stats(&self) -> Option<ExchangeStats>
    {
        self.exchange.as_ref().map(Exchange::stats)
    }

    /// Close the connection. Safe to call when already disconnected.
    pub fn disconnect(&mut self)
    {
        if let Some(exchange) = self.exchange.take() {
            let stats = exchange.stats();
            drop(exchange.into_transport());
            info!(
                exchanges = stats.exchanges,
                retransmissions = stats.retransmissions,
                "disconnected from debug stub"
            );
        }
    }

    /// Read `length` bytes of target memory starting at `address`.
    ///
    /// Transfers larger than the configured chunk size are split into
    /// several `m` requests. A zero-length read returns at once.
    ///
    /// ## Errors
    ///
    /// - `NotConnected`: no connection
    /// - `MemoryAccess`: the stub refused a chunk (`E<nn>`)
    /// - `Protocol`: a chunk came back with the wrong length or non-hex data
    /// - `InvalidArgument`: `address + length` overflows
    /// - `Transport`: the exchange failed
    pub fn read_memory(&mut self, address: Address, length: usize) -> DbxResult<Vec<u8>>
    {
        self.ensure_connected()?;
        check_range(address, length)?;

        let mut data = Vec::with_capacity(length);
        while data.len() < length {
            let chunk = self.config.chunk_size().min(length - data.len());
            let request = CommandRequest::ReadMemory {
                address: address + data.len() as u64,
                length: chunk,
            };
            match self.execute(&request)? {
                CommandReply::RawBytes(bytes) if bytes.len() == chunk => data.extend(bytes),
                CommandReply::RawBytes(bytes) => {
                    return Err(DbxError::Protocol(format!(
                        "memory read at {} returned {} bytes, expected {chunk}",
                        address + data.len() as u64,
                        bytes.len()
                    )));
                }
                other => return Err(unexpected(&request, &other)),
            }
        }
        Ok(data)
    }

    /// Write `data` to target memory starting at `address`.
    ///
    /// Split into chunks like [`read_memory`](Self::read_memory). An empty
    /// slice returns at once. A failure part way through leaves the earlier
    /// chunks written.
    ///
    /// ## Errors
    ///
    /// Same as [`read_memory`](Self::read_memory).
    pub fn write_memory(&mut self, address: Address, data: &[u8]) -> DbxResult<()>
    {
        self.ensure_connected()?;
        check_range(address, data.len())?;

        let mut offset = 0;
        for chunk in data.chunks(self.config.chunk_size()) {
            let request = CommandRequest::WriteMemory {
                address: address + offset as u64,
                data: chunk,
            };
            self.expect_ok(&request)?;
            offset += chunk.len();
        }
        Ok(())
    }

    /// Read the whole register file with `g`.
    ///
    /// ## Errors
    ///
    /// - `Protocol`: the blob is shorter than the register layout
    /// - `Remote`: the stub refused (`E<nn>`)
    /// - `NotConnected`, `Transport`
    pub fn read_registers(&mut self) -> DbxResult<RegisterSet>
    {
        let request = CommandRequest::ReadRegisters;
        match self.execute(&request)? {
            CommandReply::RawBytes(blob) => RegisterSet::decode(&blob, self.config.segment_width),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Replace the whole register file with `G`.
    ///
    /// ## Errors
    ///
    /// `Remote` if the stub refused, plus `NotConnected` and `Transport`.
    pub fn write_registers(&mut self, registers: &RegisterSet) -> DbxResult<()>
    {
        self.expect_ok(&CommandRequest::WriteRegisters {
            registers,
            segments: self.config.segment_width,
        })
    }

    /// Read one register (fetches the whole file).
    ///
    /// ## Errors
    ///
    /// Same as [`read_registers`](Self::read_registers).
    pub fn read_register(&mut self, register: Register) -> DbxResult<u32>
    {
        Ok(self.read_registers()?.get(register))
    }

    /// Set one register by reading the file, changing the value and writing
    /// the file back.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` for a segment value above `0xffff`, otherwise the
    /// errors of [`read_registers`](Self::read_registers) and
    /// [`write_registers`](Self::write_registers).
    pub fn write_register(&mut self, register: Register, value: u32) -> DbxResult<()>
    {
        let mut registers = self.read_registers()?;
        registers.set(register, value)?;
        self.write_registers(&registers)
    }

    /// Insert a breakpoint or watchpoint.
    ///
    /// Returns `false` if the stub does not support this breakpoint type
    /// (it answered with an empty packet).
    ///
    /// ## Errors
    ///
    /// `Remote` if the stub refused (`E<nn>`), plus `NotConnected` and `Transport`.
    pub fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> DbxResult<bool>
    {
        self.breakpoint_request(&CommandRequest::InsertBreakpoint(breakpoint))
    }

    /// Remove a breakpoint or watchpoint. Same results as [`set_breakpoint`](Self::set_breakpoint).
    ///
    /// ## Errors
    ///
    /// `Remote` if the stub refused (`E<nn>`), plus `NotConnected` and `Transport`.
    pub fn clear_breakpoint(&mut self, breakpoint: Breakpoint) -> DbxResult<bool>
    {
        self.breakpoint_request(&CommandRequest::RemoveBreakpoint(breakpoint))
    }

    /// Execute a single instruction and report why the target stopped.
    ///
    /// ## Errors
    ///
    /// `Protocol` for a malformed stop reply, plus `Remote`, `NotConnected`
    /// and `Transport`.
    pub fn step(&mut self) -> DbxResult<StopReply>
    {
        self.expect_stop(&CommandRequest::Step)
    }

    /// Resume the target and block until it stops.
    ///
    /// There is no timeout on the stop reply. To give up early, call
    /// `cancel()` on a handle from `cancel_handle()` taken beforehand.
    ///
    /// ## Errors
    ///
    /// Same as [`step`](Self::step); a cancelled wait is a `Transport` error.
    pub fn continue_execution(&mut self) -> DbxResult<StopReply>
    {
        self.expect_stop(&CommandRequest::Continue)
    }

    fn ensure_connected(&self) -> DbxResult<()>
    {
        if self.exchange.is_some() {
            Ok(())
        } else {
            Err(DbxError::NotConnected)
        }
    }

    /// Send one request and classify its reply. `E<nn>` and empty replies
    /// become errors here; a transport failure drops the connection.
    fn execute(&mut self, request: &CommandRequest<'_>) -> DbxResult<CommandReply>
    {
        let exchange = self.exchange.as_mut().ok_or(DbxError::NotConnected)?;
        let payload = request.encode();
        debug!(command = request.name(), len = payload.len(), "sending command");

        let reply = match exchange.exchange(payload.as_bytes(), request.reply_wait()) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(command = request.name(), error = %err, "transport failed; disconnecting");
                self.disconnect();
                return Err(err.into());
            }
        };

        match request.parse_reply(&reply)? {
            CommandReply::Error(code) => {
                debug!(command = request.name(), code, "stub refused command");
                Err(request.refusal(code))
            }
            CommandReply::Empty => Err(DbxError::Unsupported(request.name().to_string())),
            reply => Ok(reply),
        }
    }

    fn expect_ok(&mut self, request: &CommandRequest<'_>) -> DbxResult<()>
    {
        match self.execute(request)? {
            CommandReply::Ok => Ok(()),
            other => Err(unexpected(request, &other)),
        }
    }

    fn expect_stop(&mut self, request: &CommandRequest<'_>) -> DbxResult<StopReply>
    {
        match self.execute(request)? {
            CommandReply::StopReply(stop) => {
                debug!(command = request.name(), stop = %stop, "target stopped");
                Ok(stop)
            }
            other => Err(unexpected(request, &other)),
        }
    }

    fn breakpoint_request(&mut self, request: &CommandRequest<'_>) -> DbxResult<bool>
    {
        match self.expect_ok(request) {
            Ok(()) => Ok(true),
            Err(DbxError::Unsupported(_)) => {
                debug!(command = request.name(), "breakpoint type not supported by stub");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

impl<T: Transport> Drop for Client<T>
{
    fn drop(&mut self)
    {
        self.disconnect();
    }
}

fn check_range(address: Address, length: usize) -> DbxResult<()>
{
    address.checked_add(length as u64).map(|_| ()).ok_or_else(|| {
        DbxError::InvalidArgument(format!("{length} bytes at {address} run past the end of the address space"))
    })
}

fn unexpected(request: &CommandRequest<'_>, reply: &CommandReply) -> DbxError
{
    DbxError::Protocol(format!("unexpected reply to {}: {reply:?}", request.name()))
}
