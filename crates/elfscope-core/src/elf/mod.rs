//! # ELF Container Reading
//!
//! Structured, read-only views over an ELF byte buffer: identification,
//! section header table, program header table, relocation sections, and
//! note regions.
//!
//! Nothing in this module mutates the buffer or holds state beyond the
//! entities it returns; every operation is a pure function of the bytes
//! plus the parsed [`ElfIdentity`].

pub mod identity;
pub mod notes;
pub mod relocations;
pub mod sections;
pub mod segments;

pub use identity::{Class, ElfIdentity, Machine};
pub use notes::{decode_notes, DecodedNotes, NoteEntry, NoteOptions, TrailingBytes};
pub use relocations::{decode_relocations, RelocRegistry, RelocTypeTable, RelocationEntry};
pub use sections::{
    find_section, parse_section_headers, section_bytes, SectionFlags, SectionHeader, SectionType,
};
pub use segments::{
    parse_program_headers, segment_bytes, ProgramHeader, SegmentFlags, SegmentType,
};

use crate::cursor::Cursor;
use crate::error::Result;

/// File-header fields shared by the section and program table readers
///
/// Parsed fresh on each table read; the layout past `e_entry` differs
/// between the two classes, so the offsets below are class-selected.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ehdr
{
    pub phoff: u64,
    pub phentsize: u16,
    pub phnum: u16,
    pub shoff: u64,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl Ehdr
{
    pub(crate) fn parse(bytes: &[u8], identity: &ElfIdentity) -> Result<Self>
    {
        let mut cursor = Cursor::new(bytes, identity.endianness);
        match identity.class {
            Class::Elf32 => {
                cursor.seek(28)?;
                let phoff = u64::from(cursor.read_u32()?);
                let shoff = u64::from(cursor.read_u32()?);
                cursor.skip(6)?; // e_flags, e_ehsize
                let phentsize = cursor.read_u16()?;
                let phnum = cursor.read_u16()?;
                let shentsize = cursor.read_u16()?;
                let shnum = cursor.read_u16()?;
                let shstrndx = cursor.read_u16()?;
                Ok(Ehdr {
                    phoff,
                    phentsize,
                    phnum,
                    shoff,
                    shentsize,
                    shnum,
                    shstrndx,
                })
            }
            Class::Elf64 => {
                cursor.seek(32)?;
                let phoff = cursor.read_u64()?;
                let shoff = cursor.read_u64()?;
                cursor.skip(6)?; // e_flags, e_ehsize
                let phentsize = cursor.read_u16()?;
                let phnum = cursor.read_u16()?;
                let shentsize = cursor.read_u16()?;
                let shnum = cursor.read_u16()?;
                let shstrndx = cursor.read_u16()?;
                Ok(Ehdr {
                    phoff,
                    phentsize,
                    phnum,
                    shoff,
                    shentsize,
                    shnum,
                    shstrndx,
                })
            }
        }
    }
}
