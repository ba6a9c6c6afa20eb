//! Tests for `.debug_aranges` decoding.

use elfscope_core::cursor::Endianness;
use elfscope_core::dwarf::{cu_offset_at_addr, decode_aranges, AddressRange};
use elfscope_core::elf::{Class, ElfIdentity, Machine};
use elfscope_core::error::DecodeError;

fn identity(class: Class, endianness: Endianness) -> ElfIdentity
{
    ElfIdentity {
        class,
        endianness,
        machine: Machine::X86_64,
        entry_point: 0,
    }
}

/// Append one aranges unit to `section`, padding the tuple area to a
/// multiple of `2 * address_size` from the section start the way real
/// producers do, and back-patching the unit length.
fn push_unit(
    section: &mut Vec<u8>,
    debug_info_offset: u32,
    address_size: u8,
    ranges: &[(u64, u64)],
)
{
    let length_at = section.len();
    section.extend_from_slice(&0u32.to_le_bytes()); // patched below
    section.extend_from_slice(&2u16.to_le_bytes()); // version
    section.extend_from_slice(&debug_info_offset.to_le_bytes());
    section.push(address_size);
    section.push(0); // segment_size

    let tuple_align = 2 * usize::from(address_size);
    while section.len() % tuple_align != 0 {
        section.push(0);
    }

    let mut write_addr = |section: &mut Vec<u8>, value: u64| match address_size {
        4 => section.extend_from_slice(&(value as u32).to_le_bytes()),
        8 => section.extend_from_slice(&value.to_le_bytes()),
        _ => unreachable!(),
    };
    for &(address, length) in ranges {
        write_addr(section, address);
        write_addr(section, length);
    }
    write_addr(section, 0);
    write_addr(section, 0);

    let unit_length = (section.len() - length_at - 4) as u32;
    section[length_at..length_at + 4].copy_from_slice(&unit_length.to_le_bytes());
}

#[test]
fn test_empty_section_yields_no_units()
{
    let identity = identity(Class::Elf64, Endianness::Little);
    assert!(decode_aranges(&[], &identity).unwrap().is_empty());
}

#[test]
fn test_single_unit_with_aligned_tuples()
{
    let mut section = Vec::new();
    push_unit(&mut section, 0x40, 8, &[(0x1000, 0x200), (0x2000, 0x80)]);

    // Header is 12 bytes; the first tuple must start at 16.
    assert_eq!(&section[12..16], &[0, 0, 0, 0]);

    let identity = identity(Class::Elf64, Endianness::Little);
    let units = decode_aranges(&section, &identity).unwrap();
    assert_eq!(units.len(), 1);

    let unit = &units[0];
    assert_eq!(unit.version, 2);
    assert_eq!(unit.debug_info_offset, 0x40);
    assert_eq!(unit.address_size, 8);
    assert_eq!(unit.segment_size, 0);
    // The (0, 0) terminator never shows up as a range.
    assert_eq!(
        unit.ranges,
        vec![
            AddressRange {
                address: 0x1000,
                length: 0x200
            },
            AddressRange {
                address: 0x2000,
                length: 0x80
            },
        ]
    );
}

#[test]
fn test_address_lookup_across_units()
{
    let mut section = Vec::new();
    push_unit(&mut section, 0x0, 8, &[(0x1000, 0x100)]);
    push_unit(&mut section, 0x9c, 8, &[(0x2000, 0x100), (0x4000, 0x10)]);

    let identity = identity(Class::Elf64, Endianness::Little);
    let units = decode_aranges(&section, &identity).unwrap();
    assert_eq!(units.len(), 2);

    assert_eq!(cu_offset_at_addr(&units, 0x1000), Some(0x0));
    assert_eq!(cu_offset_at_addr(&units, 0x10ff), Some(0x0));
    assert_eq!(cu_offset_at_addr(&units, 0x2080), Some(0x9c));
    assert_eq!(cu_offset_at_addr(&units, 0x400f), Some(0x9c));

    // One past the end of a range is outside it.
    assert_eq!(cu_offset_at_addr(&units, 0x1100), None);
    // A miss only means the table does not cover the address; a partial
    // table is well-formed data.
    assert_eq!(cu_offset_at_addr(&units, 0x8000), None);
}

#[test]
fn test_partial_table_is_a_subset_of_the_complete_one()
{
    // Two tables for the same unit: one covering all of its code, one
    // covering only a slice of it, as producers are allowed to emit.
    let mut complete = Vec::new();
    push_unit(&mut complete, 0x40, 8, &[(0x1000, 0x100), (0x1200, 0x80)]);
    let mut partial = Vec::new();
    push_unit(&mut partial, 0x40, 8, &[(0x1200, 0x80)]);

    let identity = identity(Class::Elf64, Endianness::Little);
    let complete = decode_aranges(&complete, &identity).unwrap();
    let partial = decode_aranges(&partial, &identity).unwrap();

    assert!(complete[0].ranges.len() >= partial[0].ranges.len());
    // Everything the partial table covers, the complete one covers too;
    // the converse does not hold.
    for range in &partial[0].ranges {
        assert!(complete[0].contains(range.address));
        assert!(complete[0].contains(range.address + range.length - 1));
    }
    assert!(complete[0].contains(0x1000));
    assert!(!partial[0].contains(0x1000));
    assert_eq!(cu_offset_at_addr(&partial, 0x1000), None);
    assert_eq!(cu_offset_at_addr(&complete, 0x1000), Some(0x40));
}

#[test]
fn test_four_byte_addresses()
{
    let mut section = Vec::new();
    push_unit(&mut section, 0x10, 4, &[(0x8048000, 0x400)]);

    let identity = identity(Class::Elf32, Endianness::Little);
    let units = decode_aranges(&section, &identity).unwrap();
    assert_eq!(units[0].address_size, 4);
    assert_eq!(
        units[0].ranges,
        vec![AddressRange {
            address: 0x8048000,
            length: 0x400
        }]
    );
}

#[test]
fn test_big_endian_unit()
{
    // Same header fields as push_unit, written big-endian by hand: one
    // (0x1000, 0x40) tuple plus the terminator.
    let mut section = Vec::new();
    section.extend_from_slice(&44u32.to_be_bytes());
    section.extend_from_slice(&2u16.to_be_bytes());
    section.extend_from_slice(&0x20u32.to_be_bytes());
    section.push(8);
    section.push(0);
    section.extend_from_slice(&[0; 4]);
    section.extend_from_slice(&0x1000u64.to_be_bytes());
    section.extend_from_slice(&0x40u64.to_be_bytes());
    section.extend_from_slice(&[0; 16]);

    let identity = identity(Class::Elf64, Endianness::Big);
    let units = decode_aranges(&section, &identity).unwrap();
    assert_eq!(units[0].debug_info_offset, 0x20);
    assert_eq!(
        units[0].ranges,
        vec![AddressRange {
            address: 0x1000,
            length: 0x40
        }]
    );
}

#[test]
fn test_reserved_initial_length()
{
    let mut section = Vec::new();
    section.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
    section.extend_from_slice(&[0; 16]);

    let identity = identity(Class::Elf64, Endianness::Little);
    assert!(matches!(
        decode_aranges(&section, &identity),
        Err(DecodeError::InvalidHeader { offset: 0, .. })
    ));
}

#[test]
fn test_nonzero_segment_size()
{
    let mut section = Vec::new();
    push_unit(&mut section, 0, 8, &[]);
    section[11] = 4; // segment_size byte

    let identity = identity(Class::Elf64, Endianness::Little);
    assert!(matches!(
        decode_aranges(&section, &identity),
        Err(DecodeError::InvalidHeader { .. })
    ));
}

#[test]
fn test_unit_length_past_section_end()
{
    let mut section = Vec::new();
    push_unit(&mut section, 0, 8, &[(0x1000, 0x10)]);
    let truncated = &section[..section.len() - 8];

    let identity = identity(Class::Elf64, Endianness::Little);
    assert!(matches!(
        decode_aranges(truncated, &identity),
        Err(DecodeError::TruncatedTable { .. })
    ));
}

#[test]
fn test_missing_terminator()
{
    let mut section = Vec::new();
    push_unit(&mut section, 0, 8, &[(0x1000, 0x10)]);
    // Drop the terminator but keep the declared length honest.
    let new_len = section.len() - 16;
    section.truncate(new_len);
    let unit_length = (new_len - 4) as u32;
    section[0..4].copy_from_slice(&unit_length.to_le_bytes());

    let identity = identity(Class::Elf64, Endianness::Little);
    assert!(matches!(
        decode_aranges(&section, &identity),
        Err(DecodeError::TruncatedTable { .. })
    ));
}
