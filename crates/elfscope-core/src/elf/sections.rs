//! Section header table parsing and section content access.

use bitflags::bitflags;
use tracing::debug;

use super::{Ehdr, Class, ElfIdentity};
use crate::cursor::Cursor;
use crate::error::{DecodeError, Result};

/// Special `e_shstrndx` value: the real string-table index is in
/// section 0's `sh_link`.
const SHN_XINDEX: u16 = 0xffff;

/// Section type from `sh_type`
///
/// Unrecognized values round-trip through [`SectionType::Other`]; they are
/// never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType
{
    Null,
    Progbits,
    Symtab,
    Strtab,
    Rela,
    Hash,
    Dynamic,
    Note,
    /// Occupies no file space; [`section_bytes`] returns an empty slice
    Nobits,
    Rel,
    Shlib,
    Dynsym,
    InitArray,
    FiniArray,
    Other(u32),
}

impl SectionType
{
    /// Map a raw `sh_type` value
    pub fn from_raw(value: u32) -> Self
    {
        match value {
            0 => SectionType::Null,
            1 => SectionType::Progbits,
            2 => SectionType::Symtab,
            3 => SectionType::Strtab,
            4 => SectionType::Rela,
            5 => SectionType::Hash,
            6 => SectionType::Dynamic,
            7 => SectionType::Note,
            8 => SectionType::Nobits,
            9 => SectionType::Rel,
            10 => SectionType::Shlib,
            11 => SectionType::Dynsym,
            14 => SectionType::InitArray,
            15 => SectionType::FiniArray,
            other => SectionType::Other(other),
        }
    }
}

bitflags! {
    /// Section attribute flags from `sh_flags`
    ///
    /// Unknown bits are retained so OS- and processor-specific flags
    /// survive a decode/inspect round trip.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u64 {
        const WRITE = 0x1;
        const ALLOC = 0x2;
        const EXECINSTR = 0x4;
        const MERGE = 0x10;
        const STRINGS = 0x20;
        const INFO_LINK = 0x40;
        const LINK_ORDER = 0x80;
        const GROUP = 0x200;
        const TLS = 0x400;
        const COMPRESSED = 0x800;
        const _ = !0;
    }
}

/// One entry of the section header table
///
/// The on-disk table index is the stable identity used by `link`/`info`
/// cross references, so callers should keep the returned `Vec` in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader
{
    /// Name resolved through the section header string table
    pub name: String,
    /// Section type
    pub section_type: SectionType,
    /// Attribute flags
    pub flags: SectionFlags,
    /// Virtual address of the section in memory, 0 if not allocated
    pub address: u64,
    /// Offset of the section's content in the file
    pub offset: u64,
    /// Size of the content in bytes (in memory for `Nobits`)
    pub size: u64,
    /// Index of an associated section; meaning depends on the type
    pub link: u32,
    /// Extra type-dependent information
    pub info: u32,
    /// Required alignment of the section
    pub align: u64,
    /// Entry size for sections holding fixed-size records, else 0
    pub entry_size: u64,
}

/// Raw header fields before name resolution
struct RawShdr
{
    name_offset: u32,
    section_type: u32,
    flags: u64,
    address: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    align: u64,
    entry_size: u64,
}

fn read_raw_shdr(cursor: &mut Cursor<'_>, class: Class) -> Result<RawShdr>
{
    match class {
        Class::Elf32 => Ok(RawShdr {
            name_offset: cursor.read_u32()?,
            section_type: cursor.read_u32()?,
            flags: u64::from(cursor.read_u32()?),
            address: u64::from(cursor.read_u32()?),
            offset: u64::from(cursor.read_u32()?),
            size: u64::from(cursor.read_u32()?),
            link: cursor.read_u32()?,
            info: cursor.read_u32()?,
            align: u64::from(cursor.read_u32()?),
            entry_size: u64::from(cursor.read_u32()?),
        }),
        Class::Elf64 => Ok(RawShdr {
            name_offset: cursor.read_u32()?,
            section_type: cursor.read_u32()?,
            flags: cursor.read_u64()?,
            address: cursor.read_u64()?,
            offset: cursor.read_u64()?,
            size: cursor.read_u64()?,
            link: cursor.read_u32()?,
            info: cursor.read_u32()?,
            align: cursor.read_u64()?,
            entry_size: cursor.read_u64()?,
        }),
    }
}

/// Minimum `sh_entsize`-style width of one header per class
const fn shdr_min_size(class: Class) -> usize
{
    match class {
        Class::Elf32 => 40,
        Class::Elf64 => 64,
    }
}

/// Parse the section header table, resolving names via `e_shstrndx`
///
/// The returned order matches the on-disk table. Files with `e_shnum == 0`
/// but a nonzero `e_shoff` use extended numbering: the real count lives in
/// section 0's `sh_size` (and the string-table index in its `sh_link` when
/// `e_shstrndx` is `SHN_XINDEX`).
///
/// # Errors
///
/// [`DecodeError::TruncatedTable`] when `e_shoff + count * e_shentsize`
/// exceeds the buffer, or when `e_shentsize` is smaller than the class's
/// fixed header layout.
pub fn parse_section_headers(bytes: &[u8], identity: &ElfIdentity) -> Result<Vec<SectionHeader>>
{
    let ehdr = Ehdr::parse(bytes, identity)?;
    if ehdr.shoff == 0 {
        return Ok(Vec::new());
    }

    let shoff = usize::try_from(ehdr.shoff)
        .map_err(|_| DecodeError::TruncatedTable { offset: usize::MAX })?;
    let entsize = usize::from(ehdr.shentsize);
    if entsize < shdr_min_size(identity.class) {
        return Err(DecodeError::TruncatedTable { offset: shoff });
    }

    // Extended numbering: the real count is in section 0's sh_size.
    let mut count = usize::from(ehdr.shnum);
    let mut strtab_index = usize::from(ehdr.shstrndx);
    if count == 0 {
        let mut cursor = Cursor::new(bytes, identity.endianness);
        cursor
            .seek(shoff)
            .map_err(|_| DecodeError::TruncatedTable { offset: shoff })?;
        let shdr0 = read_raw_shdr(&mut cursor, identity.class)
            .map_err(|_| DecodeError::TruncatedTable { offset: shoff })?;
        count = usize::try_from(shdr0.size)
            .map_err(|_| DecodeError::TruncatedTable { offset: shoff })?;
        if ehdr.shstrndx == SHN_XINDEX {
            strtab_index = shdr0.link as usize;
        }
    }

    let table_size = count
        .checked_mul(entsize)
        .ok_or(DecodeError::TruncatedTable { offset: shoff })?;
    let table_end = shoff
        .checked_add(table_size)
        .ok_or(DecodeError::TruncatedTable { offset: shoff })?;
    if table_end > bytes.len() {
        return Err(DecodeError::TruncatedTable { offset: shoff });
    }

    let mut raws = Vec::with_capacity(count);
    for i in 0..count {
        let mut cursor = Cursor::new(bytes, identity.endianness);
        cursor.seek(shoff + i * entsize)?;
        raws.push(read_raw_shdr(&mut cursor, identity.class)?);
    }

    // Locate the name string table, if any. A missing or damaged table
    // degrades names to empty strings rather than failing the whole parse.
    let strtab: Option<&[u8]> = raws.get(strtab_index).and_then(|raw| {
        if strtab_index == 0 {
            return None;
        }
        let start = usize::try_from(raw.offset).ok()?;
        let end = start.checked_add(usize::try_from(raw.size).ok()?)?;
        bytes.get(start..end)
    });

    let headers = raws
        .iter()
        .map(|raw| SectionHeader {
            name: resolve_name(strtab, raw.name_offset),
            section_type: SectionType::from_raw(raw.section_type),
            flags: SectionFlags::from_bits_retain(raw.flags),
            address: raw.address,
            offset: raw.offset,
            size: raw.size,
            link: raw.link,
            info: raw.info,
            align: raw.align,
            entry_size: raw.entry_size,
        })
        .collect();

    Ok(headers)
}

fn resolve_name(strtab: Option<&[u8]>, name_offset: u32) -> String
{
    let Some(strtab) = strtab else {
        return String::new();
    };
    let start = name_offset as usize;
    let Some(rest) = strtab.get(start..) else {
        debug!(name_offset, "section name offset past string table");
        return String::new();
    };
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// Return the exact on-disk extent of a section's content
///
/// Sections of type [`SectionType::Nobits`] occupy no file space and yield
/// an empty slice by convention.
///
/// # Errors
///
/// [`DecodeError::OutOfBounds`] when `offset + size` exceeds the buffer.
pub fn section_bytes<'a>(bytes: &'a [u8], header: &SectionHeader) -> Result<&'a [u8]>
{
    if header.section_type == SectionType::Nobits {
        return Ok(&[]);
    }
    let start = usize::try_from(header.offset)
        .map_err(|_| DecodeError::OutOfBounds { offset: bytes.len() })?;
    let size = usize::try_from(header.size)
        .map_err(|_| DecodeError::OutOfBounds { offset: bytes.len() })?;
    let end = start
        .checked_add(size)
        .ok_or(DecodeError::OutOfBounds { offset: bytes.len() })?;
    bytes
        .get(start..end)
        .ok_or(DecodeError::OutOfBounds { offset: bytes.len() })
}

/// Find the first section with the given name
pub fn find_section<'a>(sections: &'a [SectionHeader], name: &str) -> Option<&'a SectionHeader>
{
    sections.iter().find(|section| section.name == name)
}
