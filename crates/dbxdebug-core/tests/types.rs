//! Tests for the target data types

use dbxdebug_core::breakpoints::{Breakpoint, BreakpointKind};
use dbxdebug_core::types::{resolve, Address, Register, RegisterSet, SegmentWidth, Signal, StopReply};

#[test]
fn test_address_from_u64()
{
    let addr = Address::from(0xb8000);
    assert_eq!(addr.value(), 0xb8000);
    let value: u64 = addr.into();
    assert_eq!(value, 0xb8000);
}

#[test]
fn test_address_checked_add_overflow()
{
    assert_eq!(Address::new(u64::MAX).checked_add(1), None);
    assert_eq!(Address::new(0x100).checked_add(4), Some(Address::new(0x104)));
}

#[test]
fn test_resolve_real_mode_addresses()
{
    assert_eq!(resolve("B800:0000").unwrap(), Address::new(0xb8000));
    assert_eq!(resolve("f000:fff0").unwrap(), Address::new(0xffff0));
    assert_eq!(resolve("0000:7C00").unwrap(), Address::new(0x7c00));
}

#[test]
fn test_resolve_flat_addresses()
{
    assert_eq!(resolve("0x7c00").unwrap(), resolve("7c00").unwrap());
    assert_eq!(resolve("7c00h").unwrap(), Address::new(0x7c00));
}

#[test]
fn test_register_blob_decode_does_not_shift_fields()
{
    // Each register holds its own index so a misplaced field is visible.
    let mut blob = Vec::new();
    for (index, register) in Register::ALL.iter().enumerate() {
        let value = (index as u32 + 1) * 0x0101;
        blob.extend_from_slice(&value.to_le_bytes()[..register.wire_bytes(SegmentWidth::Bits16)]);
    }
    // FPU state some stubs append.
    blob.extend_from_slice(&[0xff; 8]);

    let regs = RegisterSet::decode(&blob, SegmentWidth::Bits16).unwrap();
    for (index, register) in Register::ALL.iter().enumerate() {
        assert_eq!(regs.get(*register), (index as u32 + 1) * 0x0101, "{register}");
    }
}

#[test]
fn test_register_blob_truncated()
{
    let blob = vec![0u8; RegisterSet::blob_len(SegmentWidth::Bits16) - 1];
    assert!(RegisterSet::decode(&blob, SegmentWidth::Bits16).is_err());
}

#[test]
fn test_register_encode_matches_wire_layout()
{
    let regs = RegisterSet {
        eax: 0x1234_5678,
        cs: 0xb800,
        ..RegisterSet::default()
    };
    let blob = regs.encode(SegmentWidth::Bits16);
    assert_eq!(blob.len(), RegisterSet::blob_len(SegmentWidth::Bits16) * 2);
    assert!(blob.starts_with("78563412"));
    assert_eq!(&blob[80..84], "00b8");
}

#[test]
fn test_register_display_sections()
{
    let text = RegisterSet::default().to_string();
    assert!(text.contains("General Purpose:"));
    assert!(text.contains("EIP=00000000"));
    assert!(text.contains("CS=0000"));
}

#[test]
fn test_stop_reply_signal_only()
{
    let stop = StopReply::parse(b"S05").unwrap();
    assert_eq!(stop.signal, Signal::Trap);
    assert_eq!(stop.describe(), "Stopped by SIGTRAP (5)");
}

#[test]
fn test_stop_reply_with_register_field()
{
    let stop = StopReply::parse(b"T0505:00000000;").unwrap();
    assert_eq!(stop.signal.number(), 5);
    assert_eq!(stop.fields, vec![("05".to_string(), "00000000".to_string())]);
}

#[test]
fn test_breakpoint_constructors()
{
    let addr = Address::new(0x100);
    assert_eq!(Breakpoint::software(addr).kind, BreakpointKind::Software);
    assert_eq!(Breakpoint::hardware(addr).kind, BreakpointKind::Hardware);
    assert_eq!(Breakpoint::hardware(addr).length, 1);
}
