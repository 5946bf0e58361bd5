//! # Transport
//!
//! The byte pipe under the exchange engine. It has no protocol knowledge:
//! it sends bytes, receives whatever has arrived (possibly fewer bytes than
//! asked for), and closes.
//!
//! ## Why a trait?
//!
//! The exchange engine is the only component that must cope with an
//! unreliable peer, so it is tested against scripted transports that drop
//! acks, corrupt checksums or split replies across reads. [`TcpTransport`]
//! is the real implementation.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{TransportError, TransportResult};

/// Blocking byte-level connection to a debug stub.
///
/// ## Receive contract
///
/// - `Ok(bytes)` with at least one byte: data arrived (may be a partial packet)
/// - `Ok(empty)`: the peer closed the connection
/// - `Err(e)` with kind `TimedOut` or `WouldBlock`: nothing arrived in time
/// - any other `Err`: the connection is broken
///
/// A `timeout` of `None` blocks until data arrives.
pub trait Transport
{
    /// Write all of `bytes` to the peer.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read up to `max_bytes`, waiting at most `timeout`.
    fn receive(&mut self, max_bytes: usize, timeout: Option<Duration>) -> io::Result<Vec<u8>>;

    /// Release the connection. Calling it twice is harmless.
    fn close(&mut self);
}

/// Whether an I/O error means "nothing arrived before the deadline".
#[must_use]
pub fn is_timeout(err: &io::Error) -> bool
{
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

/// Whether an I/O error means the peer went away.
#[must_use]
pub fn is_disconnect(err: &io::Error) -> bool
{
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// TCP connection to a stub.
///
/// Write timeouts are fixed at connect time; read timeouts are set per
/// `receive` call.
#[derive(Debug)]
pub struct TcpTransport
{
    stream: TcpStream,
    peer: String,
    closed: bool,
}

impl TcpTransport
{
    /// Connect to `host:port`, trying every resolved address in turn.
    ///
    /// `timeout` bounds each connection attempt and every subsequent write.
    ///
    /// ## Errors
    ///
    /// `Connect` if the name does not resolve or no address accepts the
    /// connection.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> TransportResult<Self>
    {
        let peer = format!("{host}:{port}");
        let connect_error = |source: io::Error| TransportError::Connect {
            address: peer.clone(),
            source,
        };

        let addrs = (host, port).to_socket_addrs().map_err(connect_error)?;

        let mut last_error =
            io::Error::new(io::ErrorKind::AddrNotAvailable, "host name resolved to no addresses");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).map_err(connect_error)?;
                    stream.set_write_timeout(Some(timeout)).map_err(connect_error)?;
                    debug!(%peer, %addr, "connected to debug stub");
                    return Ok(Self {
                        stream,
                        peer: peer.clone(),
                        closed: false,
                    });
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connection attempt failed");
                    last_error = err;
                }
            }
        }

        Err(connect_error(last_error))
    }

    /// `host:port` this transport was connected to.
    #[must_use]
    pub fn peer(&self) -> &str
    {
        &self.peer
    }

    /// Create a handle that can abort a blocked `receive` from another thread.
    ///
    /// ## Errors
    ///
    /// Fails if the socket cannot be duplicated.
    pub fn cancel_handle(&self) -> io::Result<CancelHandle>
    {
        Ok(CancelHandle {
            stream: self.stream.try_clone()?,
        })
    }
}

impl Transport for TcpTransport
{
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>
    {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn receive(&mut self, max_bytes: usize, timeout: Option<Duration>) -> io::Result<Vec<u8>>
    {
        // A zero read timeout is rejected by the OS; treat it as already expired.
        if timeout == Some(Duration::ZERO) {
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }
        self.stream.set_read_timeout(timeout)?;

        let mut buffer = vec![0u8; max_bytes.max(1)];
        loop {
            match self.stream.read(&mut buffer) {
                Ok(read) => {
                    buffer.truncate(read);
                    return Ok(buffer);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    }

    fn close(&mut self)
    {
        if !self.closed {
            self.closed = true;
            // The peer may already be gone; there is nothing useful to do with the error.
            let _ = self.stream.shutdown(Shutdown::Both);
            debug!(peer = %self.peer, "closed connection to debug stub");
        }
    }
}

impl Drop for TcpTransport
{
    fn drop(&mut self)
    {
        self.close();
    }
}

/// Aborts a blocking operation on a [`TcpTransport`] from another thread.
///
/// Cancelling shuts the shared socket down, so the blocked call returns a
/// transport error and the connection is gone afterwards. This is the only
/// way to interrupt a `continue` that never produces a stop reply; no
/// out-of-band interrupt byte is sent.
#[derive(Debug)]
pub struct CancelHandle
{
    stream: TcpStream,
}

impl CancelHandle
{
    /// Shut the connection down.
    ///
    /// ## Errors
    ///
    /// Returns the socket error, except when the socket is already closed.
    pub fn cancel(&self) -> io::Result<()>
    {
        match self.stream.shutdown(Shutdown::Both) {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            result => result,
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn tcp_transport_round_trips_bytes()
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).unwrap();
            socket.write_all(&buf).unwrap();
        });

        let mut transport = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        assert_eq!(transport.peer(), format!("127.0.0.1:{port}"));
        transport.send(b"ping").unwrap();

        let mut echoed = Vec::new();
        while echoed.len() < 4 {
            let chunk = transport.receive(16, Some(Duration::from_secs(2))).unwrap();
            assert!(!chunk.is_empty());
            echoed.extend(chunk);
        }
        assert_eq!(echoed, b"ping");
        server.join().unwrap();
    }

    #[test]
    fn receive_times_out_when_nothing_arrives()
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || listener.accept().unwrap());

        let mut transport = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let err = transport.receive(16, Some(Duration::from_millis(50))).unwrap_err();
        assert!(is_timeout(&err));
        drop(server.join().unwrap());
    }

    #[test]
    fn connect_to_closed_port_fails()
    {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = TcpTransport::connect("127.0.0.1", port, Duration::from_millis(500)).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
