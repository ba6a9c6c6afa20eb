//! `.debug_line` decoding: the DWARF line-number program interpreter.
//!
//! A line-number program is byte code for a tiny virtual machine whose
//! registers describe one row of the line table; executing the program
//! emits the table row by row. Three opcode classes exist:
//!
//! - **special** opcodes (`>= opcode_base`) encode a combined address and
//!   line advance in a single byte,
//! - **standard** opcodes (`1..opcode_base`) have fixed semantics and a
//!   declared operand count,
//! - **extended** opcodes (a leading 0) are length-prefixed.
//!
//! The load-bearing design choice is forward compatibility: an opcode this
//! interpreter does not recognize is *skipped* using the header's operand
//! counts (standard) or the declared instruction length (extended), never
//! failing. Compilers routinely emit vendor opcodes, and a decoder that
//! chokes on them is useless against real binaries.

use smallvec::SmallVec;
use tracing::trace;

use crate::cursor::Cursor;
use crate::elf::ElfIdentity;
use crate::error::{DecodeError, Result};

/// Initial-length values at and above this are DWARF64 escapes/reserved
const DWARF64_RESERVED: u32 = 0xffff_fff0;

// Standard opcodes (DWARF v2-v4).
const DW_LNS_COPY: u8 = 1;
const DW_LNS_ADVANCE_PC: u8 = 2;
const DW_LNS_ADVANCE_LINE: u8 = 3;
const DW_LNS_SET_FILE: u8 = 4;
const DW_LNS_SET_COLUMN: u8 = 5;
const DW_LNS_NEGATE_STMT: u8 = 6;
const DW_LNS_SET_BASIC_BLOCK: u8 = 7;
const DW_LNS_CONST_ADD_PC: u8 = 8;
const DW_LNS_FIXED_ADVANCE_PC: u8 = 9;
const DW_LNS_SET_PROLOGUE_END: u8 = 10;
const DW_LNS_SET_EPILOGUE_BEGIN: u8 = 11;
const DW_LNS_SET_ISA: u8 = 12;

// Extended opcodes.
const DW_LNE_END_SEQUENCE: u8 = 1;
const DW_LNE_SET_ADDRESS: u8 = 2;
const DW_LNE_DEFINE_FILE: u8 = 3;
const DW_LNE_SET_DISCRIMINATOR: u8 = 4;

/// One source file referenced by a line-number program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry
{
    /// Path as recorded, possibly relative to an include directory
    pub name: String,
    /// 1-based index into the include directories (0 = compilation dir)
    pub dir_index: u64,
    /// Modification time, or 0 when the producer did not record one
    pub mtime: u64,
    /// File length in bytes, or 0 when not recorded
    pub length: u64,
}

/// Decoded line-number program header (DWARF v2-v4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineProgramHeader
{
    /// Unit extent in bytes, excluding the length field itself
    pub unit_length: u32,
    /// DWARF line-table version
    pub version: u16,
    /// Bytes from the end of this field to the first program opcode
    pub header_length: u32,
    /// Size of the smallest target instruction
    pub minimum_instruction_length: u8,
    /// VLIW operation advance divisor; 1 outside DWARF v4 VLIW targets
    pub maximum_operations_per_instruction: u8,
    /// Initial value of the `is_statement` register
    pub default_is_stmt: bool,
    /// Smallest line advance a special opcode can encode
    pub line_base: i8,
    /// Number of distinct line advances special opcodes encode
    pub line_range: u8,
    /// First special opcode value
    pub opcode_base: u8,
    /// Operand counts for standard opcodes `1..opcode_base`
    pub standard_opcode_lengths: SmallVec<[u8; 12]>,
    /// Include directories, in declaration order
    pub include_directories: Vec<String>,
    /// File table; `file` registers are 1-based indices into it
    pub file_names: Vec<FileEntry>,
}

/// One row of the decoded line table
///
/// Within a sequence, rows appear in non-decreasing `address` order; a
/// row with `end_sequence` set closes the sequence and carries no source
/// position of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRow
{
    /// Program counter for this row
    pub address: u64,
    /// 1-based index into the header's file table
    pub file_index: u32,
    /// 1-based source line, 0 for compiler-generated code
    pub line: u32,
    /// 1-based source column, 0 when unknown
    pub column: u32,
    /// Row is a recommended breakpoint location
    pub is_statement: bool,
    /// Row closes the current sequence
    pub end_sequence: bool,
}

/// One complete unit of `.debug_line`: header plus emitted rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineProgram
{
    /// The unit's decoded header
    pub header: LineProgramHeader,
    /// Rows in emission order
    pub rows: Vec<LineRow>,
}

/// The registers of the line-number machine
///
/// Reset to the header-defined defaults at the start of every sequence.
#[derive(Debug, Clone, Copy)]
struct LineState
{
    address: u64,
    file: u32,
    line: u32,
    column: u32,
    is_statement: bool,
    basic_block: bool,
    prologue_end: bool,
    epilogue_begin: bool,
    isa: u64,
    discriminator: u64,
}

impl LineState
{
    fn new(default_is_stmt: bool) -> Self
    {
        LineState {
            address: 0,
            file: 1,
            line: 1,
            column: 0,
            is_statement: default_is_stmt,
            basic_block: false,
            prologue_end: false,
            epilogue_begin: false,
            isa: 0,
            discriminator: 0,
        }
    }

    fn row(&self, end_sequence: bool) -> LineRow
    {
        LineRow {
            address: self.address,
            file_index: self.file,
            line: self.line,
            column: self.column,
            is_statement: self.is_statement,
            end_sequence,
        }
    }

    /// Flags a row emission clears, per the DWARF spec
    fn clear_row_flags(&mut self)
    {
        self.basic_block = false;
        self.prologue_end = false;
        self.epilogue_begin = false;
        self.discriminator = 0;
    }
}

/// Decode every unit in a `.debug_line` section
pub fn decode_line_programs(bytes: &[u8], identity: &ElfIdentity) -> Result<Vec<LineProgram>>
{
    let mut cursor = Cursor::new(bytes, identity.endianness);
    let mut programs = Vec::new();
    while !cursor.is_empty() {
        programs.push(decode_unit(&mut cursor, identity)?);
    }
    Ok(programs)
}

/// Decode a single unit starting at the beginning of `bytes`
///
/// Usable standalone against any complying line-number program given only
/// the container's class and endianness.
pub fn decode_line_program(bytes: &[u8], identity: &ElfIdentity) -> Result<LineProgram>
{
    let mut cursor = Cursor::new(bytes, identity.endianness);
    decode_unit(&mut cursor, identity)
}

fn decode_unit(cursor: &mut Cursor<'_>, identity: &ElfIdentity) -> Result<LineProgram>
{
    let unit_offset = cursor.pos();
    let unit_length = cursor.read_u32()?;
    if unit_length >= DWARF64_RESERVED {
        return Err(DecodeError::InvalidHeader {
            offset: unit_offset,
            reason: "DWARF64 initial length",
        });
    }

    // Everything else in the unit, header and program alike, lives inside
    // this bounded sub-cursor; it cannot read past the declared length.
    let mut unit = cursor
        .subslice(unit_length as usize)
        .map_err(|_| DecodeError::TruncatedProgram { offset: unit_offset })?;

    let header = decode_header(&mut unit, unit_offset)?;
    let rows = run_program(&mut unit, identity, &header)?;

    Ok(LineProgram { header, rows })
}

fn decode_header(unit: &mut Cursor<'_>, unit_offset: usize) -> Result<LineProgramHeader>
{
    let unit_length = unit.remaining() as u32;

    let version = unit.read_u16()?;
    if !(2..=4).contains(&version) {
        return Err(DecodeError::InvalidHeader {
            offset: unit_offset,
            reason: "unsupported line-table version",
        });
    }

    let header_length = unit.read_u32()?;
    let program_start = unit
        .pos()
        .checked_add(header_length as usize)
        .ok_or(DecodeError::InvalidHeader {
            offset: unit_offset,
            reason: "header length overflows the unit",
        })?;

    let minimum_instruction_length = unit.read_u8()?;
    let maximum_operations_per_instruction = if version >= 4 { unit.read_u8()? } else { 1 };
    let default_is_stmt = unit.read_u8()? != 0;
    let line_base = unit.read_i8()?;
    let line_range = unit.read_u8()?;
    let opcode_base = unit.read_u8()?;

    if opcode_base == 0 {
        return Err(DecodeError::InvalidHeader {
            offset: unit_offset,
            reason: "opcode_base is zero",
        });
    }
    if line_range == 0 {
        return Err(DecodeError::InvalidHeader {
            offset: unit_offset,
            reason: "line_range is zero",
        });
    }
    if minimum_instruction_length == 0 || maximum_operations_per_instruction == 0 {
        return Err(DecodeError::InvalidHeader {
            offset: unit_offset,
            reason: "zero instruction length parameter",
        });
    }

    let mut standard_opcode_lengths = SmallVec::new();
    for _ in 1..opcode_base {
        let length = unit.read_u8().map_err(|_| DecodeError::InvalidHeader {
            offset: unit_offset,
            reason: "standard opcode length table is short",
        })?;
        standard_opcode_lengths.push(length);
    }

    let mut include_directories = Vec::new();
    loop {
        let dir = unit.read_cstr()?;
        if dir.is_empty() {
            break;
        }
        include_directories.push(String::from_utf8_lossy(dir).into_owned());
    }

    let mut file_names = Vec::new();
    loop {
        let name = unit.read_cstr()?;
        if name.is_empty() {
            break;
        }
        let name = String::from_utf8_lossy(name).into_owned();
        let dir_index = unit.read_uleb128()?;
        let mtime = unit.read_uleb128()?;
        let length = unit.read_uleb128()?;
        file_names.push(FileEntry {
            name,
            dir_index,
            mtime,
            length,
        });
    }

    // The program starts where header_length says, not where the file
    // table happens to end; vendor header extensions live in the gap.
    unit.seek(program_start)
        .map_err(|_| DecodeError::InvalidHeader {
            offset: unit_offset,
            reason: "header length exceeds the unit",
        })?;

    Ok(LineProgramHeader {
        unit_length,
        version,
        header_length,
        minimum_instruction_length,
        maximum_operations_per_instruction,
        default_is_stmt,
        line_base,
        line_range,
        opcode_base,
        standard_opcode_lengths,
        include_directories,
        file_names,
    })
}

fn run_program(
    unit: &mut Cursor<'_>,
    identity: &ElfIdentity,
    header: &LineProgramHeader,
) -> Result<Vec<LineRow>>
{
    let mut state = LineState::new(header.default_is_stmt);
    let mut rows = Vec::new();

    while !unit.is_empty() {
        let opcode_offset = unit.pos();
        let opcode = unit.read_u8()?;

        if opcode >= header.opcode_base {
            // Special opcode: combined address/line advance in one byte.
            let adjusted = u64::from(opcode - header.opcode_base);
            let address_advance =
                adjusted / u64::from(header.line_range) * u64::from(header.minimum_instruction_length);
            let line_advance = i64::from(header.line_base)
                + (adjusted % u64::from(header.line_range)) as i64;
            state.address = state.address.wrapping_add(address_advance);
            state.line = add_line(state.line, line_advance);
            rows.push(state.row(false));
            state.clear_row_flags();
        } else if opcode == 0 {
            execute_extended(unit, identity, header, &mut state, &mut rows, opcode_offset)?;
        } else {
            execute_standard(unit, header, &mut state, &mut rows, opcode, opcode_offset)?;
        }
    }

    Ok(rows)
}

fn execute_standard(
    unit: &mut Cursor<'_>,
    header: &LineProgramHeader,
    state: &mut LineState,
    rows: &mut Vec<LineRow>,
    opcode: u8,
    opcode_offset: usize,
) -> Result<()>
{
    let truncated = |_| DecodeError::TruncatedProgram { offset: opcode_offset };

    match opcode {
        DW_LNS_COPY => {
            rows.push(state.row(false));
            state.clear_row_flags();
        }
        DW_LNS_ADVANCE_PC => {
            let advance = unit.read_uleb128().map_err(truncated)?;
            state.address = state
                .address
                .wrapping_add(advance.wrapping_mul(u64::from(header.minimum_instruction_length)));
        }
        DW_LNS_ADVANCE_LINE => {
            let advance = unit.read_sleb128().map_err(truncated)?;
            state.line = add_line(state.line, advance);
        }
        DW_LNS_SET_FILE => {
            state.file = unit.read_uleb128().map_err(truncated)? as u32;
        }
        DW_LNS_SET_COLUMN => {
            state.column = unit.read_uleb128().map_err(truncated)? as u32;
        }
        DW_LNS_NEGATE_STMT => {
            state.is_statement = !state.is_statement;
        }
        DW_LNS_SET_BASIC_BLOCK => {
            state.basic_block = true;
        }
        DW_LNS_CONST_ADD_PC => {
            // Advances the address by the amount special opcode 255 would.
            let adjusted = u64::from(255 - header.opcode_base);
            state.address = state.address.wrapping_add(
                adjusted / u64::from(header.line_range)
                    * u64::from(header.minimum_instruction_length),
            );
        }
        DW_LNS_FIXED_ADVANCE_PC => {
            // The one standard opcode with a non-LEB operand.
            let advance = unit.read_u16().map_err(truncated)?;
            state.address = state.address.wrapping_add(u64::from(advance));
        }
        DW_LNS_SET_PROLOGUE_END => {
            state.prologue_end = true;
        }
        DW_LNS_SET_EPILOGUE_BEGIN => {
            state.epilogue_begin = true;
        }
        DW_LNS_SET_ISA => {
            state.isa = unit.read_uleb128().map_err(truncated)?;
        }
        unknown => {
            // A standard opcode from a newer spec revision (or a vendor):
            // consume and discard the operand count the header declares
            // for it. Mandatory forward-compatibility skip.
            let operands = header
                .standard_opcode_lengths
                .get(usize::from(unknown) - 1)
                .copied()
                .unwrap_or(0);
            trace!(opcode = unknown, operands, "skipping unrecognized standard opcode");
            for _ in 0..operands {
                unit.read_uleb128().map_err(truncated)?;
            }
        }
    }
    Ok(())
}

fn execute_extended(
    unit: &mut Cursor<'_>,
    identity: &ElfIdentity,
    header: &LineProgramHeader,
    state: &mut LineState,
    rows: &mut Vec<LineRow>,
    opcode_offset: usize,
) -> Result<()>
{
    let truncated = |_| DecodeError::TruncatedProgram { offset: opcode_offset };

    let length = unit.read_uleb128().map_err(truncated)? as usize;
    if length == 0 {
        // A zero-length extended opcode carries no sub-opcode at all;
        // nothing to do.
        return Ok(());
    }
    let mut operands = unit.subslice(length).map_err(truncated)?;
    let sub_opcode = operands.read_u8().map_err(truncated)?;

    match sub_opcode {
        DW_LNE_END_SEQUENCE => {
            rows.push(state.row(true));
            *state = LineState::new(header.default_is_stmt);
        }
        DW_LNE_SET_ADDRESS => {
            state.address = operands
                .read_uint(identity.address_size())
                .map_err(truncated)?;
        }
        DW_LNE_DEFINE_FILE => {
            // DWARF v2-v4 inline file definition. Decoded for its side
            // effect on the file register numbering, not retained in the
            // header's table.
            let _name = operands.read_cstr().map_err(truncated)?;
            let _dir = operands.read_uleb128().map_err(truncated)?;
            let _mtime = operands.read_uleb128().map_err(truncated)?;
            let _length = operands.read_uleb128().map_err(truncated)?;
        }
        DW_LNE_SET_DISCRIMINATOR => {
            state.discriminator = operands.read_uleb128().map_err(truncated)?;
        }
        unknown => {
            // Skipped wholesale via the declared instruction length.
            trace!(opcode = unknown, length, "skipping unrecognized extended opcode");
        }
    }
    Ok(())
}

fn add_line(line: u32, advance: i64) -> u32
{
    let next = i64::from(line) + advance;
    u32::try_from(next).unwrap_or(0)
}
