//! Tests for the exchange engine's ack and retry handling
//!
//! The scripted transport answers every request packet with whatever the
//! test's responder returns, split into reads of `chunk` bytes to exercise
//! partial-read accumulation.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use dbxdebug_protocol::{packet, Exchange, FailureCause, ReplyWait, RetryPolicy, Transport, TransportError};

type Responder = Box<dyn FnMut(usize) -> Vec<u8>>;

struct Scripted
{
    responder: Responder,
    chunk: usize,
    inbox: VecDeque<u8>,
    requests: Vec<Vec<u8>>,
    acks_sent: usize,
    closed: bool,
}

impl Scripted
{
    fn new(chunk: usize, responder: impl FnMut(usize) -> Vec<u8> + 'static) -> Self
    {
        Self {
            responder: Box::new(responder),
            chunk,
            inbox: VecDeque::new(),
            requests: Vec::new(),
            acks_sent: 0,
            closed: false,
        }
    }
}

impl Transport for Scripted
{
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>
    {
        if bytes == b"+" {
            self.acks_sent += 1;
            return Ok(());
        }
        self.requests.push(bytes.to_vec());
        let response = (self.responder)(self.requests.len());
        self.inbox.extend(response);
        Ok(())
    }

    fn receive(&mut self, max_bytes: usize, _timeout: Option<Duration>) -> io::Result<Vec<u8>>
    {
        if self.inbox.is_empty() {
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }
        let take = self.chunk.min(max_bytes).min(self.inbox.len());
        Ok(self.inbox.drain(..take).collect())
    }

    fn close(&mut self)
    {
        self.closed = true;
    }
}

fn policy(max_attempts: u32) -> RetryPolicy
{
    RetryPolicy {
        max_attempts,
        timeout: Duration::from_millis(50),
    }
}

fn ack_and_reply(payload: &[u8]) -> Vec<u8>
{
    let mut bytes = vec![b'+'];
    bytes.extend(packet::encode(payload));
    bytes
}

#[test]
fn test_always_negative_ack_exhausts_exact_attempt_count()
{
    for max_attempts in [1, 3, 5] {
        let mut exchange = Exchange::new(Scripted::new(64, |_| b"-".to_vec()), policy(max_attempts));

        let err = exchange.exchange(b"m100,4", ReplyWait::Bounded).unwrap_err();
        match err {
            TransportError::RetriesExhausted { attempts, cause } => {
                assert_eq!(attempts, max_attempts);
                assert_eq!(cause, FailureCause::NegativeAck);
            }
            other => panic!("unexpected error: {other}"),
        }

        let transport = exchange.transport();
        assert_eq!(transport.requests.len(), max_attempts as usize);
        assert!(transport.requests.iter().all(|frame| frame == b"$m100,4#5e"));
        assert_eq!(transport.acks_sent, 0);
        assert_eq!(exchange.stats().retransmissions, u64::from(max_attempts - 1));
    }
}

#[test]
fn test_one_negative_ack_then_success()
{
    let mut exchange = Exchange::new(
        Scripted::new(64, |request| {
            if request == 1 {
                b"-".to_vec()
            } else {
                ack_and_reply(b"deadbeef")
            }
        }),
        policy(3),
    );

    assert_eq!(exchange.exchange(b"m100,4", ReplyWait::Bounded).unwrap(), b"deadbeef");
    assert_eq!(exchange.transport().requests.len(), 2);
    assert_eq!(exchange.transport().acks_sent, 1);
    assert_eq!(exchange.stats().retransmissions, 1);
    assert_eq!(exchange.stats().last_attempts, 2);
}

#[test]
fn test_bad_reply_checksum_triggers_retransmission()
{
    let mut exchange = Exchange::new(
        Scripted::new(64, |request| {
            if request == 1 {
                b"+$deadbeef#21".to_vec()
            } else {
                ack_and_reply(b"deadbeef")
            }
        }),
        policy(3),
    );

    assert_eq!(exchange.exchange(b"m100,4", ReplyWait::Bounded).unwrap(), b"deadbeef");
    assert_eq!(exchange.transport().requests.len(), 2);
}

#[test]
fn test_persistent_checksum_failure_reports_checksum_cause()
{
    let mut exchange = Exchange::new(Scripted::new(64, |_| b"+$OK#00".to_vec()), policy(4));

    let err = exchange.exchange(b"g", ReplyWait::Bounded).unwrap_err();
    assert!(matches!(
        err,
        TransportError::RetriesExhausted {
            attempts: 4,
            cause: FailureCause::Checksum
        }
    ));
}

#[test]
fn test_silence_reports_timeout_cause()
{
    let mut exchange = Exchange::new(Scripted::new(64, |_| Vec::new()), policy(2));

    let err = exchange.exchange(b"g", ReplyWait::Bounded).unwrap_err();
    assert!(matches!(
        err,
        TransportError::RetriesExhausted {
            attempts: 2,
            cause: FailureCause::Timeout
        }
    ));
    assert_eq!(exchange.transport().requests.len(), 2);
}

#[test]
fn test_reply_split_across_single_byte_reads()
{
    let mut exchange = Exchange::new(Scripted::new(1, |_| ack_and_reply(b"T0505:00000000;")), policy(3));

    assert_eq!(exchange.exchange(b"s", ReplyWait::Bounded).unwrap(), b"T0505:00000000;");
    assert_eq!(exchange.stats().retransmissions, 0);
}

#[test]
fn test_unbounded_wait_still_receives_reply()
{
    let mut exchange = Exchange::new(Scripted::new(3, |_| ack_and_reply(b"S05")), policy(3));

    assert_eq!(exchange.exchange(b"c", ReplyWait::Unbounded).unwrap(), b"S05");
}

#[test]
fn test_reply_without_ack_is_accepted()
{
    let mut exchange = Exchange::new(Scripted::new(64, |_| packet::encode(b"OK")), policy(3));

    assert_eq!(exchange.exchange(b"Z0,100,1", ReplyWait::Bounded).unwrap(), b"OK");
}

#[test]
fn test_into_transport_closes_it()
{
    let exchange = Exchange::new(Scripted::new(64, |_| Vec::new()), policy(1));
    assert!(exchange.into_transport().closed);
}

#[test]
fn test_late_reply_does_not_answer_the_next_request()
{
    // The first m100 reply misses its deadline and arrives together with
    // the answer to the retransmission.
    let mut exchange = Exchange::new(
        Scripted::new(4, |request| match request {
            1 => b"+".to_vec(),
            2 => {
                let mut bytes = packet::encode(b"11111111");
                bytes.extend(ack_and_reply(b"11111111"));
                bytes
            }
            _ => ack_and_reply(b"22222222"),
        }),
        policy(3),
    );

    assert_eq!(exchange.exchange(b"m100,4", ReplyWait::Bounded).unwrap(), b"11111111");
    assert_eq!(exchange.stats().retransmissions, 1);

    assert_eq!(exchange.exchange(b"m200,4", ReplyWait::Bounded).unwrap(), b"22222222");
    assert_eq!(exchange.transport().requests.last().unwrap(), b"$m200,4#5f");
    assert_eq!(exchange.stats().last_attempts, 1);
}
