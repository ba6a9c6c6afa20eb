//! Program header (segment) table parsing.

use bitflags::bitflags;

use super::{Class, Ehdr, ElfIdentity};
use crate::cursor::Cursor;
use crate::error::{DecodeError, Result};

/// Segment type from `p_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType
{
    Null,
    Load,
    Dynamic,
    Interp,
    /// Carries note records; see [`crate::elf::notes`]
    Note,
    Shlib,
    Phdr,
    Tls,
    GnuEhFrame,
    GnuStack,
    GnuRelro,
    GnuProperty,
    Other(u32),
}

impl SegmentType
{
    /// Map a raw `p_type` value
    pub fn from_raw(value: u32) -> Self
    {
        match value {
            0 => SegmentType::Null,
            1 => SegmentType::Load,
            2 => SegmentType::Dynamic,
            3 => SegmentType::Interp,
            4 => SegmentType::Note,
            5 => SegmentType::Shlib,
            6 => SegmentType::Phdr,
            7 => SegmentType::Tls,
            0x6474_e550 => SegmentType::GnuEhFrame,
            0x6474_e551 => SegmentType::GnuStack,
            0x6474_e552 => SegmentType::GnuRelro,
            0x6474_e553 => SegmentType::GnuProperty,
            other => SegmentType::Other(other),
        }
    }
}

bitflags! {
    /// Segment permission flags from `p_flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        const EXECUTE = 0x1;
        const WRITE = 0x2;
        const READ = 0x4;
        const _ = !0;
    }
}

/// One entry of the program header table
///
/// Segments may overlap sections; the only ordering invariant is the
/// on-disk table order, which the returned `Vec` preserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader
{
    /// Segment type
    pub segment_type: SegmentType,
    /// Permission flags
    pub flags: SegmentFlags,
    /// Offset of the segment's content in the file
    pub offset: u64,
    /// Virtual address of the segment in memory
    pub vaddr: u64,
    /// Physical address, where meaningful
    pub paddr: u64,
    /// Bytes of content present in the file
    pub filesz: u64,
    /// Bytes the segment occupies in memory
    pub memsz: u64,
    /// Declared alignment; note segments with `align == 8` pad each note
    /// entry to an 8-byte boundary
    pub align: u64,
}

/// Parse the program header table via `e_phoff`/`e_phnum`/`e_phentsize`
///
/// # Errors
///
/// [`DecodeError::TruncatedTable`] when the declared table exceeds the
/// buffer or `e_phentsize` is smaller than the class's fixed layout.
pub fn parse_program_headers(bytes: &[u8], identity: &ElfIdentity) -> Result<Vec<ProgramHeader>>
{
    let ehdr = Ehdr::parse(bytes, identity)?;
    if ehdr.phoff == 0 {
        return Ok(Vec::new());
    }

    let phoff = usize::try_from(ehdr.phoff)
        .map_err(|_| DecodeError::TruncatedTable { offset: usize::MAX })?;
    let entsize = usize::from(ehdr.phentsize);
    let min_size = match identity.class {
        Class::Elf32 => 32,
        Class::Elf64 => 56,
    };
    if entsize < min_size {
        return Err(DecodeError::TruncatedTable { offset: phoff });
    }

    let count = usize::from(ehdr.phnum);
    let table_size = count
        .checked_mul(entsize)
        .ok_or(DecodeError::TruncatedTable { offset: phoff })?;
    let table_end = phoff
        .checked_add(table_size)
        .ok_or(DecodeError::TruncatedTable { offset: phoff })?;
    if table_end > bytes.len() {
        return Err(DecodeError::TruncatedTable { offset: phoff });
    }

    let mut headers = Vec::with_capacity(count);
    for i in 0..count {
        let mut cursor = Cursor::new(bytes, identity.endianness);
        cursor.seek(phoff + i * entsize)?;
        headers.push(read_phdr(&mut cursor, identity.class)?);
    }
    Ok(headers)
}

// The field order differs between the classes: ELF32 keeps p_flags after
// p_memsz, ELF64 moved it up next to p_type to keep the 64-bit fields
// naturally aligned.
fn read_phdr(cursor: &mut Cursor<'_>, class: Class) -> Result<ProgramHeader>
{
    match class {
        Class::Elf32 => {
            let segment_type = SegmentType::from_raw(cursor.read_u32()?);
            let offset = u64::from(cursor.read_u32()?);
            let vaddr = u64::from(cursor.read_u32()?);
            let paddr = u64::from(cursor.read_u32()?);
            let filesz = u64::from(cursor.read_u32()?);
            let memsz = u64::from(cursor.read_u32()?);
            let flags = SegmentFlags::from_bits_retain(cursor.read_u32()?);
            let align = u64::from(cursor.read_u32()?);
            Ok(ProgramHeader {
                segment_type,
                flags,
                offset,
                vaddr,
                paddr,
                filesz,
                memsz,
                align,
            })
        }
        Class::Elf64 => {
            let segment_type = SegmentType::from_raw(cursor.read_u32()?);
            let flags = SegmentFlags::from_bits_retain(cursor.read_u32()?);
            let offset = cursor.read_u64()?;
            let vaddr = cursor.read_u64()?;
            let paddr = cursor.read_u64()?;
            let filesz = cursor.read_u64()?;
            let memsz = cursor.read_u64()?;
            let align = cursor.read_u64()?;
            Ok(ProgramHeader {
                segment_type,
                flags,
                offset,
                vaddr,
                paddr,
                filesz,
                memsz,
                align,
            })
        }
    }
}

/// Return the file-backed extent of a segment (`filesz` bytes at `offset`)
///
/// # Errors
///
/// [`DecodeError::OutOfBounds`] when the extent exceeds the buffer.
pub fn segment_bytes<'a>(bytes: &'a [u8], header: &ProgramHeader) -> Result<&'a [u8]>
{
    let start = usize::try_from(header.offset)
        .map_err(|_| DecodeError::OutOfBounds { offset: bytes.len() })?;
    let size = usize::try_from(header.filesz)
        .map_err(|_| DecodeError::OutOfBounds { offset: bytes.len() })?;
    let end = start
        .checked_add(size)
        .ok_or(DecodeError::OutOfBounds { offset: bytes.len() })?;
    bytes
        .get(start..end)
        .ok_or(DecodeError::OutOfBounds { offset: bytes.len() })
}
