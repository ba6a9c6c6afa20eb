//! `.debug_aranges` decoding.
//!
//! The section is a sequence of independent units, one per contributing
//! compilation unit, each mapping address ranges back to that unit's
//! offset in `.debug_info`. Producers are free to cover only part of a
//! unit's code (or skip the unit entirely), so an empty or missing table
//! is ordinary data, not damage: callers wanting full coverage must scan
//! the line table or `.debug_info` themselves. This decoder never invents
//! ranges it did not read.

use crate::cursor::Cursor;
use crate::elf::ElfIdentity;
use crate::error::{DecodeError, Result};

/// Initial-length values at and above this are DWARF64 escapes/reserved
const DWARF64_RESERVED: u32 = 0xffff_fff0;

/// One `(address, length)` tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange
{
    /// First address covered
    pub address: u64,
    /// Extent in bytes
    pub length: u64,
}

impl AddressRange
{
    /// True when `addr` falls inside this range
    pub fn contains(&self, addr: u64) -> bool
    {
        addr >= self.address && addr - self.address < self.length
    }
}

/// One per-compilation-unit aranges table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArangesUnit
{
    /// Unit extent in bytes, excluding the length field itself
    pub unit_length: u32,
    /// DWARF aranges version (2 for every mainstream producer)
    pub version: u16,
    /// Offset of the owning compilation unit in `.debug_info`
    pub debug_info_offset: u32,
    /// Width of the addresses in this unit's tuples
    pub address_size: u8,
    /// Segment selector width; this decoder only handles 0
    pub segment_size: u8,
    /// Tuples in on-disk order, terminator excluded
    pub ranges: Vec<AddressRange>,
}

impl ArangesUnit
{
    /// True when any of this unit's ranges covers `addr`
    pub fn contains(&self, addr: u64) -> bool
    {
        self.ranges.iter().any(|range| range.contains(addr))
    }
}

/// Map an address to the `.debug_info` offset of the unit covering it
///
/// Returns `None` for addresses no range covers; for a partial table
/// that does not mean the address is outside the program.
pub fn cu_offset_at_addr(units: &[ArangesUnit], addr: u64) -> Option<u32>
{
    units
        .iter()
        .find(|unit| unit.contains(addr))
        .map(|unit| unit.debug_info_offset)
}

/// Decode every unit in a `.debug_aranges` section
///
/// An empty section yields an empty vector; so does a buffer for a file
/// that simply has no aranges contribution. Tuple reads are aligned to
/// twice the unit's `address_size`, measured from the start of the
/// section, and each unit is bounded by its declared length.
///
/// # Errors
///
/// - [`DecodeError::InvalidHeader`] for a reserved DWARF64 initial
///   length, a nonzero `segment_size`, or an `address_size` that is not
///   4 or 8
/// - [`DecodeError::TruncatedTable`] when a declared unit length exceeds
///   the section
pub fn decode_aranges(bytes: &[u8], identity: &ElfIdentity) -> Result<Vec<ArangesUnit>>
{
    let mut cursor = Cursor::new(bytes, identity.endianness);
    let mut units = Vec::new();

    while !cursor.is_empty() {
        let unit_offset = cursor.pos();
        let unit_length = cursor.read_u32()?;
        if unit_length >= DWARF64_RESERVED {
            return Err(DecodeError::InvalidHeader {
                offset: unit_offset,
                reason: "DWARF64 initial length",
            });
        }
        let unit_end = cursor
            .pos()
            .checked_add(unit_length as usize)
            .filter(|&end| end <= bytes.len())
            .ok_or(DecodeError::TruncatedTable { offset: unit_offset })?;

        let version = cursor.read_u16()?;
        let debug_info_offset = cursor.read_u32()?;
        let address_size = cursor.read_u8()?;
        let segment_size = cursor.read_u8()?;

        if segment_size != 0 {
            return Err(DecodeError::InvalidHeader {
                offset: unit_offset,
                reason: "segmented aranges are not supported",
            });
        }
        if address_size != 4 && address_size != 8 {
            return Err(DecodeError::InvalidHeader {
                offset: unit_offset,
                reason: "address size is not 4 or 8",
            });
        }

        // DWARF mandates the first tuple sit at a multiple of twice the
        // address size, counted from the start of the section.
        cursor.align_to(2 * usize::from(address_size))?;

        let mut ranges = Vec::new();
        loop {
            if cursor.pos() + 2 * usize::from(address_size) > unit_end {
                return Err(DecodeError::TruncatedTable { offset: unit_offset });
            }
            let address = cursor.read_uint(usize::from(address_size))?;
            let length = cursor.read_uint(usize::from(address_size))?;
            if address == 0 && length == 0 {
                break;
            }
            ranges.push(AddressRange { address, length });
        }

        // Producers occasionally pad a unit; step over whatever is left
        // of its declared extent.
        cursor.seek(unit_end)?;

        units.push(ArangesUnit {
            unit_length,
            version,
            debug_info_offset,
            address_size,
            segment_size,
            ranges,
        });
    }

    Ok(units)
}
