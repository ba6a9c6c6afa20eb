//! ELF identification: class, byte order, machine, entry point.

use crate::cursor::{Cursor, Endianness};
use crate::error::{DecodeError, Result};

/// File class from `EI_CLASS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class
{
    /// 32-bit object (`ELFCLASS32`)
    Elf32,
    /// 64-bit object (`ELFCLASS64`)
    Elf64,
}

impl Class
{
    /// Width of an address in this class, in bytes
    pub const fn address_size(self) -> usize
    {
        match self {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        }
    }
}

/// Target machine from `e_machine`
///
/// Only the machines this crate carries relocation layouts for get named
/// variants; everything else is passed through as [`Machine::Other`] so the
/// container reader keeps working on files we cannot decode relocations
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Machine
{
    /// `EM_NONE`
    None,
    /// `EM_MIPS` (covers MIPS64 when the class is 64-bit)
    Mips,
    /// `EM_X86_64`
    X86_64,
    /// `EM_AARCH64`
    Aarch64,
    /// Any machine without a named variant
    Other(u16),
}

impl Machine
{
    const EM_NONE: u16 = 0;
    const EM_MIPS: u16 = 8;
    const EM_X86_64: u16 = 62;
    const EM_AARCH64: u16 = 183;

    /// Map a raw `e_machine` value
    pub fn from_raw(value: u16) -> Self
    {
        match value {
            Self::EM_NONE => Machine::None,
            Self::EM_MIPS => Machine::Mips,
            Self::EM_X86_64 => Machine::X86_64,
            Self::EM_AARCH64 => Machine::Aarch64,
            other => Machine::Other(other),
        }
    }

    /// The raw `e_machine` value
    pub fn as_raw(self) -> u16
    {
        match self {
            Machine::None => Self::EM_NONE,
            Machine::Mips => Self::EM_MIPS,
            Machine::X86_64 => Self::EM_X86_64,
            Machine::Aarch64 => Self::EM_AARCH64,
            Machine::Other(other) => other,
        }
    }
}

/// Parsed ELF identification plus the entry point
///
/// This is everything the DWARF decoders need to interpret a debug section
/// standalone: the class fixes address widths, the endianness fixes every
/// multi-byte read. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfIdentity
{
    /// 32- or 64-bit object
    pub class: Class,
    /// Byte order of every multi-byte field in the file
    pub endianness: Endianness,
    /// Target machine
    pub machine: Machine,
    /// Virtual entry point (`e_entry`); 0 for relocatable objects
    pub entry_point: u64,
}

impl ElfIdentity
{
    /// Validate the magic and read class, endianness, machine and entry point
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InvalidMagic`] if the buffer does not start with
    ///   `\x7fELF`
    /// - [`DecodeError::UnsupportedClass`] for an `EI_CLASS` byte that is
    ///   neither 1 nor 2
    /// - [`DecodeError::InvalidHeader`] for an `EI_DATA` byte that names no
    ///   byte order
    pub fn parse(bytes: &[u8]) -> Result<Self>
    {
        let magic = bytes.get(..4).ok_or(DecodeError::InvalidMagic)?;
        if magic != b"\x7fELF" {
            return Err(DecodeError::InvalidMagic);
        }

        let class = match bytes.get(4) {
            Some(1) => Class::Elf32,
            Some(2) => Class::Elf64,
            Some(&other) => return Err(DecodeError::UnsupportedClass(other)),
            None => return Err(DecodeError::OutOfBounds { offset: 4 }),
        };

        let endianness = match bytes.get(5) {
            Some(1) => Endianness::Little,
            Some(2) => Endianness::Big,
            _ => {
                return Err(DecodeError::InvalidHeader {
                    offset: 5,
                    reason: "EI_DATA names no byte order",
                })
            }
        };

        let mut cursor = Cursor::new(bytes, endianness);
        cursor.seek(18)?;
        let machine = Machine::from_raw(cursor.read_u16()?);
        cursor.seek(24)?;
        let entry_point = match class {
            Class::Elf32 => u64::from(cursor.read_u32()?),
            Class::Elf64 => cursor.read_u64()?,
        };

        Ok(ElfIdentity {
            class,
            endianness,
            machine,
            entry_point,
        })
    }

    /// Width of an address in this file, in bytes
    pub const fn address_size(&self) -> usize
    {
        self.class.address_size()
    }
}
