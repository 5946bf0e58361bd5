//! # Exchange Engine
//!
//! Drives one request/reply round trip over an unreliable transport.
//!
//! ## Attempt sequence
//!
//! ```text
//! send $payload#cc
//!   wait for ack ──'-'────────────────────────> next attempt
//!      │          ──timeout──────────────────> next attempt
//!      '+' (or a '$' with no ack before it)
//!   read reply packet ──bad checksum──────────> next attempt (request resent)
//!      │              ──timeout──────────────> next attempt
//!   send '+' and return the reply payload
//! ```
//!
//! Retries form an explicit bounded loop with an attempt counter, so the
//! number of transmissions is exactly what [`RetryPolicy::max_attempts`]
//! allows and can be checked through [`ExchangeStats`]. A closed or reset
//! connection ends the exchange immediately; retrying cannot fix it.
//!
//! After a failed attempt the stub may still answer the request it already
//! acknowledged, so a single request can produce two replies. Once any
//! attempt has failed, whatever the transport has ready is discarded before
//! the next request packet goes out, for the retransmission and again for
//! the following exchange.
//!
//! RSP is strictly one request at a time. `exchange` takes `&mut self`, so a
//! second request cannot start while one is waiting for its reply.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{FailureCause, PacketError, TransportError, TransportResult};
use crate::packet::{self, AckSymbol, PACKET_START};
use crate::transport::{self, Transport};

/// Default number of times a request is sent before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default time to wait for an ack, and then again for the reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest read requested from the transport at once.
const RECEIVE_CHUNK: usize = 4096;

/// How long a late reply is given to show up before a resend.
pub const STALE_POLL: Duration = Duration::from_millis(20);

/// How many times to try and how long to wait each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy
{
    /// Total transmissions allowed for one request (at least 1 is always made).
    pub max_attempts: u32,
    /// Bound on each wait: for the ack, then for the reply packet.
    pub timeout: Duration,
}

impl Default for RetryPolicy
{
    fn default() -> Self
    {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// How long to wait for the reply once the request has been acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyWait
{
    /// Give up after the policy timeout (every command except continue).
    Bounded,
    /// Wait as long as it takes. Used for `c`, whose reply only comes when
    /// the target halts.
    Unbounded,
}

/// Counters describing the traffic an [`Exchange`] has produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeStats
{
    /// Requests started.
    pub exchanges: u64,
    /// Request packets written to the transport, retransmissions included.
    pub packets_sent: u64,
    /// Request packets written beyond the first for their exchange.
    pub retransmissions: u64,
    /// Attempts made by the most recent exchange.
    pub last_attempts: u32,
}

enum AttemptError
{
    /// Worth retrying.
    Failed(FailureCause),
    /// Retrying cannot help.
    Fatal(TransportError),
}

/// Reliable request/reply over a [`Transport`].
#[derive(Debug)]
pub struct Exchange<T>
{
    transport: T,
    policy: RetryPolicy,
    trace_packets: bool,
    pending: Vec<u8>,
    resync: bool,
    stats: ExchangeStats,
}

impl<T: Transport> Exchange<T>
{
    /// Wrap a connected transport.
    pub fn new(transport: T, policy: RetryPolicy) -> Self
    {
        Self {
            transport,
            policy,
            trace_packets: false,
            pending: Vec::new(),
            resync: false,
            stats: ExchangeStats::default(),
        }
    }

    /// Emit every frame sent and received as a `trace` event.
    #[must_use]
    pub fn with_packet_tracing(mut self, enabled: bool) -> Self
    {
        self.trace_packets = enabled;
        self
    }

    /// Retry policy in effect.
    pub const fn policy(&self) -> RetryPolicy
    {
        self.policy
    }

    /// Traffic counters since creation.
    pub const fn stats(&self) -> ExchangeStats
    {
        self.stats
    }

    /// Borrow the underlying transport.
    pub const fn transport(&self) -> &T
    {
        &self.transport
    }

    /// Close the transport and give it back.
    pub fn into_transport(mut self) -> T
    {
        self.transport.close();
        self.transport
    }

    /// Send `payload` and return the stub's reply payload.
    ///
    /// ## Errors
    ///
    /// - `RetriesExhausted`: every attempt failed; carries the last cause
    /// - `ConnectionClosed`: the stub closed or reset the connection
    /// - `Io`: any other socket failure
    pub fn exchange(&mut self, payload: &[u8], wait: ReplyWait) -> TransportResult<Vec<u8>>
    {
        let frame = packet::encode(payload);
        let max_attempts = self.policy.max_attempts.max(1);

        // Bytes left from an earlier exchange belong to a reply nobody waits for anymore.
        if !self.pending.is_empty() {
            debug!(stale = self.pending.len(), "discarding unread bytes from previous exchange");
            self.pending.clear();
        }
        self.stats.exchanges += 1;

        let mut last_cause = FailureCause::Timeout;
        for attempt in 1..=max_attempts {
            self.stats.last_attempts = attempt;
            if attempt > 1 {
                self.stats.retransmissions += 1;
            }

            if self.resync {
                self.discard_stale()?;
            }

            match self.attempt(&frame, wait) {
                Ok(reply) => {
                    debug!(attempt, reply_len = reply.len(), "exchange complete");
                    // A late answer to an earlier attempt may still be in flight.
                    self.resync = attempt > 1;
                    return Ok(reply);
                }
                Err(AttemptError::Failed(cause)) => {
                    warn!(attempt, max_attempts, %cause, "exchange attempt failed");
                    last_cause = cause;
                    self.resync = true;
                }
                Err(AttemptError::Fatal(err)) => {
                    debug!(attempt, error = %err, "exchange aborted");
                    return Err(err);
                }
            }
        }

        Err(TransportError::RetriesExhausted {
            attempts: max_attempts,
            cause: last_cause,
        })
    }

    fn attempt(&mut self, frame: &[u8], wait: ReplyWait) -> Result<Vec<u8>, AttemptError>
    {
        if self.trace_packets {
            trace!(frame = %String::from_utf8_lossy(frame), "-> request");
        }
        self.transport.send(frame).map_err(fatal_io)?;
        self.stats.packets_sent += 1;

        self.await_ack(Instant::now() + self.policy.timeout)?;

        let reply_deadline = match wait {
            ReplyWait::Bounded => Some(Instant::now() + self.policy.timeout),
            ReplyWait::Unbounded => None,
        };
        let reply = self.read_reply(reply_deadline)?;

        self.transport
            .send(&[AckSymbol::Positive.as_byte()])
            .map_err(fatal_io)?;
        Ok(reply)
    }

    /// Drop everything the transport delivers within [`STALE_POLL`].
    fn discard_stale(&mut self) -> TransportResult<()>
    {
        let mut discarded = std::mem::take(&mut self.pending).len();
        loop {
            match self.transport.receive(RECEIVE_CHUNK, Some(STALE_POLL)) {
                Ok(bytes) if bytes.is_empty() => return Err(TransportError::ConnectionClosed),
                Ok(bytes) => {
                    if self.trace_packets {
                        trace!(bytes = %String::from_utf8_lossy(&bytes), "<- stale");
                    }
                    discarded += bytes.len();
                }
                Err(err) if transport::is_timeout(&err) => break,
                Err(err) => return Err(io_error(err)),
            }
        }
        if discarded > 0 {
            debug!(discarded, "discarded late bytes before sending");
        }
        self.resync = false;
        Ok(())
    }

    /// Consume bytes up to and including the ack for the request just sent.
    fn await_ack(&mut self, deadline: Instant) -> Result<(), AttemptError>
    {
        loop {
            while let Some(&byte) = self.pending.first() {
                if byte == PACKET_START {
                    // Some stubs skip the ack and answer straight away.
                    trace!("reply arrived without an ack; treating it as accepted");
                    return Ok(());
                }
                self.pending.remove(0);
                match AckSymbol::from_byte(byte) {
                    Some(AckSymbol::Positive) => return Ok(()),
                    Some(AckSymbol::Negative) => return Err(AttemptError::Failed(FailureCause::NegativeAck)),
                    None => trace!(byte, "discarding stray byte while waiting for ack"),
                }
            }
            self.fill(Some(deadline))?;
        }
    }

    fn read_reply(&mut self, deadline: Option<Instant>) -> Result<Vec<u8>, AttemptError>
    {
        loop {
            // Anything before the packet start (duplicate acks, noise) is dropped.
            match self.pending.iter().position(|&byte| byte == PACKET_START) {
                Some(start) => {
                    self.pending.drain(..start);
                }
                None => self.pending.clear(),
            }

            if let Some(len) = packet::complete_frame_len(&self.pending) {
                let frame: Vec<u8> = self.pending.drain(..len).collect();
                if self.trace_packets {
                    trace!(frame = %String::from_utf8_lossy(&frame), "<- reply");
                }
                return packet::decode(&frame).map_err(|err| {
                    debug!(error = %err, "rejecting reply packet");
                    AttemptError::Failed(match err {
                        PacketError::Checksum { .. } => FailureCause::Checksum,
                        PacketError::Malformed(_) | PacketError::InvalidHex(_) => FailureCause::Malformed,
                    })
                });
            }

            self.fill(deadline)?;
        }
    }

    /// Append the next chunk from the transport to `pending`.
    fn fill(&mut self, deadline: Option<Instant>) -> Result<(), AttemptError>
    {
        let timeout = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(AttemptError::Failed(FailureCause::Timeout));
                }
                Some(remaining)
            }
            None => None,
        };

        match self.transport.receive(RECEIVE_CHUNK, timeout) {
            Ok(bytes) if bytes.is_empty() => Err(AttemptError::Fatal(TransportError::ConnectionClosed)),
            Ok(bytes) => {
                self.pending.extend_from_slice(&bytes);
                Ok(())
            }
            Err(err) if transport::is_timeout(&err) => Err(AttemptError::Failed(FailureCause::Timeout)),
            Err(err) => Err(fatal_io(err)),
        }
    }
}

fn io_error(err: std::io::Error) -> TransportError
{
    if transport::is_disconnect(&err) {
        TransportError::ConnectionClosed
    } else {
        TransportError::Io(err)
    }
}

fn fatal_io(err: std::io::Error) -> AttemptError
{
    AttemptError::Fatal(io_error(err))
}

#[cfg(test)]
mod tests
{
    use std::collections::VecDeque;
    use std::io;

    use super::*;

    /// Replays canned receive results and records everything sent.
    struct Canned
    {
        replies: VecDeque<io::Result<Vec<u8>>>,
        sent: Vec<Vec<u8>>,
    }

    impl Transport for Canned
    {
        fn send(&mut self, bytes: &[u8]) -> io::Result<()>
        {
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        fn receive(&mut self, _max_bytes: usize, _timeout: Option<Duration>) -> io::Result<Vec<u8>>
        {
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::TimedOut)))
        }

        fn close(&mut self) {}
    }

    fn canned(replies: Vec<io::Result<Vec<u8>>>) -> Exchange<Canned>
    {
        Exchange::new(
            Canned {
                replies: replies.into(),
                sent: Vec::new(),
            },
            RetryPolicy {
                max_attempts: 3,
                timeout: Duration::from_millis(100),
            },
        )
    }

    #[test]
    fn positive_ack_then_reply()
    {
        let mut exchange = canned(vec![Ok(b"+$OK#9a".to_vec())]);
        assert_eq!(exchange.exchange(b"g", ReplyWait::Bounded).unwrap(), b"OK");
        assert_eq!(exchange.transport().sent, vec![b"$g#67".to_vec(), b"+".to_vec()]);
        assert_eq!(exchange.stats().last_attempts, 1);
    }

    #[test]
    fn stray_bytes_before_ack_are_ignored()
    {
        let mut exchange = canned(vec![Ok(b"\0x+".to_vec()), Ok(b"$OK#9a".to_vec())]);
        assert_eq!(exchange.exchange(b"g", ReplyWait::Bounded).unwrap(), b"OK");
    }

    #[test]
    fn closed_connection_is_not_retried()
    {
        let mut exchange = canned(vec![Ok(Vec::new())]);
        let err = exchange.exchange(b"g", ReplyWait::Bounded).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
        assert_eq!(exchange.stats().packets_sent, 1);
    }

    #[test]
    fn reset_is_reported_as_closed()
    {
        let mut exchange = canned(vec![Err(io::Error::from(io::ErrorKind::ConnectionReset))]);
        let err = exchange.exchange(b"g", ReplyWait::Bounded).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    fn nothing_ready() -> io::Result<Vec<u8>>
    {
        Err(io::Error::from(io::ErrorKind::TimedOut))
    }

    #[test]
    fn malformed_reply_is_retried()
    {
        let mut exchange = canned(vec![Ok(b"+$OK#xx".to_vec()), nothing_ready(), Ok(b"+$OK#9a".to_vec())]);
        assert_eq!(exchange.exchange(b"g", ReplyWait::Bounded).unwrap(), b"OK");
        assert_eq!(exchange.stats().retransmissions, 1);
    }

    #[test]
    fn late_bytes_are_dropped_before_resending()
    {
        let mut exchange = canned(vec![
            Ok(b"+".to_vec()),
            nothing_ready(),
            Ok(b"$11#62".to_vec()),
            nothing_ready(),
            Ok(b"+$22#64".to_vec()),
        ]);
        assert_eq!(exchange.exchange(b"g", ReplyWait::Bounded).unwrap(), b"22");
        assert_eq!(exchange.stats().retransmissions, 1);
    }

    #[test]
    fn clean_exchanges_do_not_poll_for_stale_bytes()
    {
        let mut exchange = canned(vec![Ok(b"+$OK#9a".to_vec()), Ok(b"+$OK#9a".to_vec())]);
        assert_eq!(exchange.exchange(b"g", ReplyWait::Bounded).unwrap(), b"OK");
        assert_eq!(exchange.exchange(b"g", ReplyWait::Bounded).unwrap(), b"OK");
    }
}
