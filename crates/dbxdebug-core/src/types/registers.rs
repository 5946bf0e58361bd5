//! CPU register types and the `g`/`G` register blob layout.
//!
//! The stub transfers all registers as one hex blob in a fixed order:
//!
//! ```text
//! eax ecx edx ebx esp ebp esi edi eip eflags cs ss ds es fs gs
//! └──────────── 32 bits each ──────────────┘ └─ segment width ─┘
//! ```
//!
//! Each field is little-endian (x86 byte order) and fixed width, so a
//! value's position in the blob is what identifies it. Decoding and
//! encoding both walk [`Register::ALL`]; reordering that table would
//! silently shift every value after the change.

use std::fmt;
use std::str::FromStr;

use dbxdebug_protocol::hex;
use tracing::trace;

use crate::error::{DbxError, DbxResult};

/// Identifier for one register of the i386 register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register
{
    /// EAX - accumulator
    Eax,
    /// ECX - counter
    Ecx,
    /// EDX - data
    Edx,
    /// EBX - base
    Ebx,
    /// ESP - stack pointer
    Esp,
    /// EBP - base pointer
    Ebp,
    /// ESI - source index
    Esi,
    /// EDI - destination index
    Edi,
    /// EIP - instruction pointer
    Eip,
    /// EFLAGS - flags
    Eflags,
    /// CS - code segment
    Cs,
    /// SS - stack segment
    Ss,
    /// DS - data segment
    Ds,
    /// ES - extra segment
    Es,
    /// FS
    Fs,
    /// GS
    Gs,
}

impl Register
{
    /// All registers in wire order.
    pub const ALL: [Self; 16] = [
        Self::Eax,
        Self::Ecx,
        Self::Edx,
        Self::Ebx,
        Self::Esp,
        Self::Ebp,
        Self::Esi,
        Self::Edi,
        Self::Eip,
        Self::Eflags,
        Self::Cs,
        Self::Ss,
        Self::Ds,
        Self::Es,
        Self::Fs,
        Self::Gs,
    ];

    /// Lowercase register name.
    #[must_use]
    pub const fn name(self) -> &'static str
    {
        match self {
            Self::Eax => "eax",
            Self::Ecx => "ecx",
            Self::Edx => "edx",
            Self::Ebx => "ebx",
            Self::Esp => "esp",
            Self::Ebp => "ebp",
            Self::Esi => "esi",
            Self::Edi => "edi",
            Self::Eip => "eip",
            Self::Eflags => "eflags",
            Self::Cs => "cs",
            Self::Ss => "ss",
            Self::Ds => "ds",
            Self::Es => "es",
            Self::Fs => "fs",
            Self::Gs => "gs",
        }
    }

    /// Whether this is one of the 16-bit segment registers.
    #[must_use]
    pub const fn is_segment(self) -> bool
    {
        matches!(self, Self::Cs | Self::Ss | Self::Ds | Self::Es | Self::Fs | Self::Gs)
    }

    /// Width of this register's field in the blob, in bytes.
    #[must_use]
    pub const fn wire_bytes(self, segments: SegmentWidth) -> usize
    {
        if self.is_segment() {
            segments.bytes()
        } else {
            4
        }
    }
}

impl fmt::Display for Register
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.name())
    }
}

impl FromStr for Register
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|reg| reg.name() == wanted)
            .ok_or_else(|| format!("Unknown register: {s}. Use one of eax, ecx, edx, ebx, esp, ebp, esi, edi, eip, eflags, cs, ss, ds, es, fs, gs"))
    }
}

/// How wide segment registers are in the register blob
///
/// The DOSBox-X stub sends segment registers as 16-bit fields. Stubs that
/// follow GDB's stock i386 description send them as 32-bit fields instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentWidth
{
    /// Four hex digits per segment register (default)
    #[default]
    Bits16,
    /// Eight hex digits per segment register
    Bits32,
}

impl SegmentWidth
{
    /// Field width in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize
    {
        match self {
            Self::Bits16 => 2,
            Self::Bits32 => 4,
        }
    }
}

impl FromStr for SegmentWidth
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim() {
            "16" => Ok(Self::Bits16),
            "32" => Ok(Self::Bits32),
            _ => Err(format!("Unknown segment width: {s}. Use '16' or '32'")),
        }
    }
}

/// Snapshot of the i386 register file
///
/// General-purpose registers, `eip` and `eflags` are 32 bits; segment
/// registers are 16 bits.
///
/// ## Example
///
/// ```rust
/// use dbxdebug_core::types::{Register, RegisterSet};
///
/// let mut regs = RegisterSet::default();
/// regs.set(Register::Eax, 0x1234)?;
/// regs.set(Register::Cs, 0xf000)?;
/// assert_eq!(regs.get(Register::Eax), 0x1234);
/// assert!(regs.set(Register::Ds, 0x1_0000).is_err());
/// # Ok::<(), dbxdebug_core::error::DbxError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterSet
{
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub eip: u32,
    pub eflags: u32,
    pub cs: u16,
    pub ss: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
}

impl RegisterSet
{
    /// Number of bytes a blob must have for the given layout.
    #[must_use]
    pub fn blob_len(segments: SegmentWidth) -> usize
    {
        Register::ALL.iter().map(|reg| reg.wire_bytes(segments)).sum()
    }

    /// Read one register by identifier.
    #[must_use]
    pub fn get(&self, register: Register) -> u32
    {
        match register {
            Register::Eax => self.eax,
            Register::Ecx => self.ecx,
            Register::Edx => self.edx,
            Register::Ebx => self.ebx,
            Register::Esp => self.esp,
            Register::Ebp => self.ebp,
            Register::Esi => self.esi,
            Register::Edi => self.edi,
            Register::Eip => self.eip,
            Register::Eflags => self.eflags,
            Register::Cs => u32::from(self.cs),
            Register::Ss => u32::from(self.ss),
            Register::Ds => u32::from(self.ds),
            Register::Es => u32::from(self.es),
            Register::Fs => u32::from(self.fs),
            Register::Gs => u32::from(self.gs),
        }
    }

    /// Write one register by identifier.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if a segment register is given a value above `0xffff`.
    pub fn set(&mut self, register: Register, value: u32) -> DbxResult<()>
    {
        let segment = || {
            u16::try_from(value).map_err(|_| {
                DbxError::InvalidArgument(format!("{register} is 16 bits wide, {value:#x} does not fit"))
            })
        };

        match register {
            Register::Eax => self.eax = value,
            Register::Ecx => self.ecx = value,
            Register::Edx => self.edx = value,
            Register::Ebx => self.ebx = value,
            Register::Esp => self.esp = value,
            Register::Ebp => self.ebp = value,
            Register::Esi => self.esi = value,
            Register::Edi => self.edi = value,
            Register::Eip => self.eip = value,
            Register::Eflags => self.eflags = value,
            Register::Cs => self.cs = segment()?,
            Register::Ss => self.ss = segment()?,
            Register::Ds => self.ds = segment()?,
            Register::Es => self.es = segment()?,
            Register::Fs => self.fs = segment()?,
            Register::Gs => self.gs = segment()?,
        }
        Ok(())
    }

    /// Iterate `(register, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, u32)> + '_
    {
        Register::ALL.into_iter().map(move |reg| (reg, self.get(reg)))
    }

    /// Decode the blob of a `g` reply (after hex decoding).
    ///
    /// Data beyond the known registers (some stubs append FPU state) is
    /// ignored.
    ///
    /// ## Errors
    ///
    /// `Protocol` if the blob is shorter than the layout.
    pub fn decode(blob: &[u8], segments: SegmentWidth) -> DbxResult<Self>
    {
        let needed = Self::blob_len(segments);
        if blob.len() < needed {
            return Err(DbxError::Protocol(format!(
                "register blob truncated: expected {needed} bytes, got {}",
                blob.len()
            )));
        }
        if blob.len() > needed {
            trace!(extra = blob.len() - needed, "ignoring trailing register data");
        }

        let mut regs = Self::default();
        let mut cursor = 0;
        for register in Register::ALL {
            let width = register.wire_bytes(segments);
            let mut le = [0u8; 4];
            le[..width].copy_from_slice(&blob[cursor..cursor + width]);
            cursor += width;
            let value = u32::from_le_bytes(le);

            // Segment selectors are 16 bits; a 32-bit field only pads them.
            let value = if register.is_segment() { value & 0xffff } else { value };
            regs.set(register, value)?;
        }
        Ok(regs)
    }

    /// Encode as the hex blob of a `G` request, in the same layout `decode` reads.
    #[must_use]
    pub fn encode(&self, segments: SegmentWidth) -> String
    {
        let mut blob = String::with_capacity(Self::blob_len(segments) * 2);
        for (register, value) in self.iter() {
            let width = register.wire_bytes(segments);
            blob.push_str(&hex::encode(&value.to_le_bytes()[..width]));
        }
        blob
    }
}

impl fmt::Display for RegisterSet
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        writeln!(f, "General Purpose:")?;
        writeln!(
            f,
            "  EAX={:08X}  ECX={:08X}  EDX={:08X}  EBX={:08X}",
            self.eax, self.ecx, self.edx, self.ebx
        )?;
        writeln!(
            f,
            "  ESP={:08X}  EBP={:08X}  ESI={:08X}  EDI={:08X}",
            self.esp, self.ebp, self.esi, self.edi
        )?;
        writeln!(f)?;
        writeln!(f, "Instruction Pointer:")?;
        writeln!(f, "  EIP={:08X}  EFLAGS={:08X}", self.eip, self.eflags)?;
        writeln!(f)?;
        writeln!(f, "Segment Registers:")?;
        write!(
            f,
            "  CS={:04X}  SS={:04X}  DS={:04X}  ES={:04X}  FS={:04X}  GS={:04X}",
            self.cs, self.ss, self.ds, self.es, self.fs, self.gs
        )
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn blob_lengths()
    {
        assert_eq!(RegisterSet::blob_len(SegmentWidth::Bits16), 10 * 4 + 6 * 2);
        assert_eq!(RegisterSet::blob_len(SegmentWidth::Bits32), 16 * 4);
    }

    #[test]
    fn fields_are_little_endian()
    {
        let mut blob = vec![0x78, 0x56, 0x34, 0x12];
        blob.resize(RegisterSet::blob_len(SegmentWidth::Bits16), 0);
        let regs = RegisterSet::decode(&blob, SegmentWidth::Bits16).unwrap();
        assert_eq!(regs.eax, 0x1234_5678);
        assert_eq!(regs.ecx, 0);
    }

    #[test]
    fn register_names_parse_case_insensitively()
    {
        assert_eq!("EFLAGS".parse::<Register>().unwrap(), Register::Eflags);
        assert_eq!(" cs ".parse::<Register>().unwrap(), Register::Cs);
        assert!("rax".parse::<Register>().is_err());
    }

    #[test]
    fn segment_width_parses()
    {
        assert_eq!("16".parse::<SegmentWidth>().unwrap(), SegmentWidth::Bits16);
        assert_eq!("32".parse::<SegmentWidth>().unwrap(), SegmentWidth::Bits32);
        assert!("8".parse::<SegmentWidth>().is_err());
    }
}
