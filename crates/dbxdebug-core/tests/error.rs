//! Tests for error handling

use dbxdebug_core::error::{DbxError, DbxResult};
use dbxdebug_protocol::{FailureCause, TransportError};

#[test]
fn test_memory_access_error_message()
{
    let error = DbxError::MemoryAccess {
        address: 0xb8000,
        length: 16,
        code: 0x0e,
    };
    let message = format!("{error}");
    assert!(message.contains("0xb8000"));
    assert!(message.contains("16 bytes"));
    assert!(message.contains("E0e"));
}

#[test]
fn test_remote_error_names_operation()
{
    let error = DbxError::Remote {
        operation: "read_registers",
        code: 1,
    };
    assert_eq!(error.to_string(), "Stub rejected read_registers: E01");
    assert_eq!(error.kind(), "RemoteError");
}

#[test]
fn test_transport_error_conversion()
{
    let transport = TransportError::RetriesExhausted {
        attempts: 3,
        cause: FailureCause::NegativeAck,
    };
    let error: DbxError = transport.into();
    assert!(matches!(error, DbxError::Transport(_)));
    let message = error.to_string();
    assert!(message.contains('3'));
    assert!(message.contains("negative acknowledgment"));
}

#[test]
fn test_error_kinds()
{
    assert_eq!(DbxError::NotConnected.kind(), "NotConnectedError");
    assert_eq!(DbxError::Protocol(String::new()).kind(), "ProtocolError");
    assert_eq!(DbxError::Unsupported("step".into()).kind(), "UnsupportedOperation");
    assert_eq!(DbxError::InvalidAddress("x".into()).kind(), "InvalidAddressError");
    assert_eq!(DbxError::InvalidArgument("x".into()).kind(), "InvalidArgumentError");
}

#[test]
fn test_result_type()
{
    fn returns_ok() -> DbxResult<u32>
    {
        Ok(42)
    }

    fn returns_err() -> DbxResult<u32>
    {
        Err(DbxError::NotConnected)
    }

    assert_eq!(returns_ok().unwrap(), 42);
    assert!(returns_err().is_err());
}
