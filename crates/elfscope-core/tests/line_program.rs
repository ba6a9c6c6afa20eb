//! Tests for `.debug_line` line-number program decoding, including the
//! worked examples from the DWARF v3 specification (figures 59 and 60).

use elfscope_core::cursor::Endianness;
use elfscope_core::dwarf::{decode_line_program, decode_line_programs, LineRow};
use elfscope_core::elf::{Class, ElfIdentity, Machine};
use elfscope_core::error::DecodeError;

fn identity32() -> ElfIdentity
{
    ElfIdentity {
        class: Class::Elf32,
        endianness: Endianness::Little,
        machine: Machine::X86_64,
        entry_point: 0,
    }
}

/// Wrap a program in a DWARF v3 unit with the header the spec's worked
/// examples assume: minimum_instruction_length 1, default_is_stmt,
/// line_base 1, line_range 15, opcode_base 10; two include directories
/// and two file entries.
fn v3_unit(program: &[u8]) -> Vec<u8>
{
    let mut header = Vec::new();
    header.push(1); // minimum_instruction_length
    header.push(1); // default_is_stmt
    header.push(1); // line_base
    header.push(15); // line_range
    header.push(10); // opcode_base
    header.extend_from_slice(&[0, 1, 4, 8, 12, 1, 1, 1, 0]); // standard_opcode_lengths
    header.extend_from_slice(b"ab\0p\0\0"); // include directories
    header.extend_from_slice(b"ar\0\x0c\x0d\x0f"); // file 1
    header.extend_from_slice(b"EPQ\0\x86\x12\x07\x08"); // file 2
    header.push(0);

    let header_length = header.len() as u32;
    let unit_length = (2 + 4 + header.len() + program.len()) as u32;

    let mut unit = Vec::new();
    unit.extend_from_slice(&unit_length.to_le_bytes());
    unit.extend_from_slice(&3u16.to_le_bytes()); // version
    unit.extend_from_slice(&header_length.to_le_bytes());
    unit.extend_from_slice(&header);
    unit.extend_from_slice(program);
    unit
}

fn row(address: u64, line: u32, end_sequence: bool) -> LineRow
{
    LineRow {
        address,
        file_index: 1,
        line,
        column: 0,
        is_statement: true,
        end_sequence,
    }
}

/// Figure 59 of DWARF v3: the special-opcode encoding of a short
/// sequence.
#[test]
fn test_dwarf_v3_figure_59()
{
    let program = [
        0x02, 0xb9, 0x04, // advance_pc 0x239
        0x0b, // special: line += 2
        0x38, // special: addr += 3, line += 2
        0x82, // special: addr += 8, line += 1
        0x73, // special: addr += 7, line += 1
        0x02, 0x02, // advance_pc 2
        0x00, 0x01, 0x01, // end_sequence
    ];
    let unit = v3_unit(&program);
    let decoded = decode_line_program(&unit, &identity32()).unwrap();

    assert_eq!(decoded.header.version, 3);
    assert_eq!(decoded.header.opcode_base, 10);
    assert_eq!(decoded.header.line_base, 1);
    assert_eq!(decoded.header.line_range, 15);
    assert_eq!(decoded.header.include_directories, vec!["ab", "p"]);
    assert_eq!(decoded.header.file_names.len(), 2);
    assert_eq!(decoded.header.file_names[0].name, "ar");
    assert_eq!(decoded.header.file_names[1].name, "EPQ");
    assert_eq!(decoded.header.file_names[1].dir_index, 0x906); // two-byte LEB

    assert_eq!(
        decoded.rows,
        vec![
            row(0x239, 3, false),
            row(0x23c, 5, false),
            row(0x244, 6, false),
            row(0x24b, 7, false),
            row(0x24d, 7, true),
        ]
    );
}

/// Figure 60 of DWARF v3: the same sequence via fixed_advance_pc.
#[test]
fn test_dwarf_v3_figure_60()
{
    let program = [
        0x09, 0x39, 0x02, // fixed_advance_pc 0x239
        0x0b, // special: line += 2
        0x09, 0x03, 0x00, // fixed_advance_pc 3
        0x0b, // special: line += 2
        0x09, 0x08, 0x00, // fixed_advance_pc 8
        0x0a, // special: line += 1
        0x09, 0x07, 0x00, // fixed_advance_pc 7
        0x0a, // special: line += 1
        0x09, 0x02, 0x00, // fixed_advance_pc 2
        0x00, 0x01, 0x01, // end_sequence
    ];
    let unit = v3_unit(&program);
    let decoded = decode_line_program(&unit, &identity32()).unwrap();

    assert_eq!(
        decoded.rows,
        vec![
            row(0x239, 3, false),
            row(0x23c, 5, false),
            row(0x244, 6, false),
            row(0x24b, 7, false),
            row(0x24d, 7, true),
        ]
    );
}

#[test]
fn test_both_encodings_agree()
{
    let special = v3_unit(&[
        0x02, 0xb9, 0x04, 0x0b, 0x38, 0x82, 0x73, 0x02, 0x02, 0x00, 0x01, 0x01,
    ]);
    let fixed = v3_unit(&[
        0x09, 0x39, 0x02, 0x0b, 0x09, 0x03, 0x00, 0x0b, 0x09, 0x08, 0x00, 0x0a, 0x09, 0x07,
        0x00, 0x0a, 0x09, 0x02, 0x00, 0x00, 0x01, 0x01,
    ]);
    let identity = identity32();
    let a = decode_line_program(&special, &identity).unwrap();
    let b = decode_line_program(&fixed, &identity).unwrap();
    assert_eq!(a.rows, b.rows);

    // Decoding is a pure function of the bytes.
    assert_eq!(a, decode_line_program(&special, &identity).unwrap());
}

#[test]
fn test_section_with_two_units()
{
    let mut section = v3_unit(&[0x0b, 0x00, 0x01, 0x01]);
    section.extend_from_slice(&v3_unit(&[0x0a, 0x0a, 0x00, 0x01, 0x01]));

    let programs = decode_line_programs(&section, &identity32()).unwrap();
    assert_eq!(programs.len(), 2);
    assert_eq!(programs[0].rows.len(), 2);
    assert_eq!(programs[1].rows.len(), 3);
    // Registers reset between units.
    assert_eq!(programs[1].rows[0], row(0, 2, false));
}

#[test]
fn test_set_address_and_register_opcodes()
{
    let program = [
        0x00, 0x05, 0x02, 0x00, 0x10, 0x00, 0x00, // set_address 0x1000
        0x04, 0x02, // set_file 2
        0x05, 0x07, // set_column 7
        0x06, // negate_stmt
        0x0a, // special: line += 1
        0x00, 0x01, 0x01, // end_sequence
    ];
    let unit = v3_unit(&program);
    let decoded = decode_line_program(&unit, &identity32()).unwrap();

    assert_eq!(
        decoded.rows[0],
        LineRow {
            address: 0x1000,
            file_index: 2,
            line: 2,
            column: 7,
            is_statement: false,
            end_sequence: false,
        }
    );
    // end_sequence resets the registers before emitting its row.
    assert!(decoded.rows[1].end_sequence);
}

#[test]
fn test_const_add_pc_matches_special_255()
{
    // const_add_pc advances by what special opcode 255 would:
    // (255 - 10) / 15 = 16 bytes with this header.
    let program = [
        0x08, // const_add_pc
        0x0a, // special: line += 1
        0x00, 0x01, 0x01,
    ];
    let unit = v3_unit(&program);
    let decoded = decode_line_program(&unit, &identity32()).unwrap();
    assert_eq!(decoded.rows[0].address, 16);
}

#[test]
fn test_negative_line_advance_clamps_at_zero()
{
    let program = [
        0x03, 0x7b, // advance_line -5, from the initial line 1
        0x01, // copy
        0x00, 0x01, 0x01,
    ];
    let unit = v3_unit(&program);
    let decoded = decode_line_program(&unit, &identity32()).unwrap();
    assert_eq!(decoded.rows[0].line, 0);
}

#[test]
fn test_unknown_extended_opcode_is_skipped()
{
    // A vendor extended opcode (0x80) with two operand bytes, wedged
    // between real instructions. Its declared length steps over it.
    let program = [
        0x02, 0x10, // advance_pc 16
        0x00, 0x03, 0x80, 0xaa, 0xbb, // extended, length 3, unknown
        0x0a, // special: line += 1
        0x00, 0x01, 0x01,
    ];
    let unit = v3_unit(&program);
    let decoded = decode_line_program(&unit, &identity32()).unwrap();
    assert_eq!(decoded.rows, vec![row(0x10, 2, false), row(0x10, 2, true)]);
}

#[test]
fn test_unknown_standard_opcode_skips_declared_operands()
{
    // opcode_base 14 makes opcode 13 a standard opcode this decoder has
    // no semantics for; the header declares one LEB operand for it.
    let mut header = Vec::new();
    header.push(1); // minimum_instruction_length
    header.push(1); // default_is_stmt
    header.push(1); // line_base
    header.push(15); // line_range
    header.push(14); // opcode_base
    header.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1]);
    header.push(0); // no include directories
    header.extend_from_slice(b"a.c\0\x00\x00\x00");
    header.push(0);

    let program = [
        0x0d, 0xe5, 0x8e, 0x26, // unknown opcode 13 + its LEB operand
        0x0e, // special: line += 1
        0x00, 0x01, 0x01,
    ];

    let header_length = header.len() as u32;
    let unit_length = (2 + 4 + header.len() + program.len()) as u32;
    let mut unit = Vec::new();
    unit.extend_from_slice(&unit_length.to_le_bytes());
    unit.extend_from_slice(&3u16.to_le_bytes());
    unit.extend_from_slice(&header_length.to_le_bytes());
    unit.extend_from_slice(&header);
    unit.extend_from_slice(&program);

    let decoded = decode_line_program(&unit, &identity32()).unwrap();
    assert_eq!(decoded.header.standard_opcode_lengths.len(), 13);
    assert_eq!(decoded.rows, vec![row(0, 2, false), row(0, 2, true)]);
}

/// The header shape gcc and clang actually emit: line_base -5,
/// line_range 14, opcode_base 13 with the standard operand counts.
#[test]
fn test_special_opcodes_with_negative_line_base()
{
    let mut header = Vec::new();
    header.push(1); // minimum_instruction_length
    header.push(1); // default_is_stmt
    header.push(0xfb); // line_base = -5
    header.push(14); // line_range
    header.push(13); // opcode_base
    header.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);
    header.push(0); // no include directories
    header.extend_from_slice(b"a.c\0\x00\x00\x00");
    header.push(0);

    let program = [
        0x14, // special 20: adjusted 7, addr += 0, line += 2
        0x25, // special 37: adjusted 24, addr += 1, line += 5
        0x0d, // special 13: adjusted 0, addr += 0, line -= 5
        0x08, // const_add_pc: addr += (255 - 13) / 14 = 17
        0x13, // special 19: adjusted 6, addr += 0, line += 1
        0x00, 0x01, 0x01, // end_sequence
    ];

    let header_length = header.len() as u32;
    let unit_length = (2 + 4 + header.len() + program.len()) as u32;
    let mut unit = Vec::new();
    unit.extend_from_slice(&unit_length.to_le_bytes());
    unit.extend_from_slice(&3u16.to_le_bytes());
    unit.extend_from_slice(&header_length.to_le_bytes());
    unit.extend_from_slice(&header);
    unit.extend_from_slice(&program);

    let decoded = decode_line_program(&unit, &identity32()).unwrap();
    assert_eq!(decoded.header.line_base, -5);
    assert_eq!(decoded.header.line_range, 14);
    assert_eq!(
        decoded.rows,
        vec![
            row(0, 3, false),
            row(1, 8, false),
            row(1, 3, false),
            row(18, 4, false),
            row(18, 4, true),
        ]
    );
}

#[test]
fn test_unsupported_version()
{
    let mut unit = v3_unit(&[0x00, 0x01, 0x01]);
    unit[4..6].copy_from_slice(&5u16.to_le_bytes());
    assert!(matches!(
        decode_line_program(&unit, &identity32()),
        Err(DecodeError::InvalidHeader { .. })
    ));
}

#[test]
fn test_degenerate_header_parameters()
{
    let identity = identity32();

    // line_range of zero would divide by zero in the special-opcode math.
    let mut unit = v3_unit(&[0x00, 0x01, 0x01]);
    unit[13] = 0;
    assert!(matches!(
        decode_line_program(&unit, &identity),
        Err(DecodeError::InvalidHeader { .. })
    ));

    // opcode_base of zero would make every opcode special.
    let mut unit = v3_unit(&[0x00, 0x01, 0x01]);
    unit[14] = 0;
    assert!(matches!(
        decode_line_program(&unit, &identity),
        Err(DecodeError::InvalidHeader { .. })
    ));
}

#[test]
fn test_reserved_initial_length()
{
    let mut unit = v3_unit(&[0x00, 0x01, 0x01]);
    unit[0..4].copy_from_slice(&0xffff_fff0u32.to_le_bytes());
    assert!(matches!(
        decode_line_program(&unit, &identity32()),
        Err(DecodeError::InvalidHeader { offset: 0, .. })
    ));
}

#[test]
fn test_unit_length_past_section_end()
{
    let unit = v3_unit(&[0x00, 0x01, 0x01]);
    let truncated = &unit[..unit.len() - 2];
    assert!(matches!(
        decode_line_program(truncated, &identity32()),
        Err(DecodeError::TruncatedProgram { offset: 0 })
    ));
}
