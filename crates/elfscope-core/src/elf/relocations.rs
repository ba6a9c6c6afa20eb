//! Relocation section decoding.
//!
//! This module decodes `Rel`/`Rela` records structurally: offset, symbol
//! index, machine-specific type value, addend. It never interprets the
//! type semantically or resolves symbols; the presentation layer does that
//! with the name tables carried by [`RelocRegistry`].
//!
//! The registry exists because the `r_info` field is *not* laid out the
//! same everywhere: the MIPS64 ABI splits it into a 32-bit symbol index
//! followed by four single-byte fields, where everything else packs symbol
//! and type into one native-endian word. Decoding a machine therefore
//! requires an entry layout to be registered for it.

use super::{Class, ElfIdentity, Machine};
use crate::cursor::Cursor;
use crate::error::{DecodeError, Result};

/// One decoded relocation record
///
/// Belongs to exactly one relocation section; the section's `link`/`info`
/// fields identify the symbol table and target section by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationEntry
{
    /// Location to patch, relative to the target section or segment base
    pub offset: u64,
    /// Index into the symbol table named by the section's `link`
    pub symbol_index: u32,
    /// Machine-specific relocation type, passed through opaquely
    pub reloc_type: u32,
    /// Explicit addend; 0 when the section is the `Rel` form
    pub addend: i64,
}

/// How `r_info` is carved into symbol index and type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfoLayout
{
    /// `sym = info >> 8, type = info & 0xff` (32-bit) or
    /// `sym = info >> 32, type = info & 0xffffffff` (64-bit)
    Standard,
    /// MIPS64: `r_sym: u32`, then `r_ssym/r_type3/r_type2/r_type` bytes.
    /// The primary type is `r_type`; the secondary types only matter to a
    /// linker composing relocations and are not modeled here.
    Mips64,
}

/// Per-machine relocation knowledge: entry layout plus type-name table
#[derive(Debug, Clone)]
pub struct RelocTypeTable
{
    machine: Machine,
    layout: InfoLayout,
    /// Sorted by type code
    names: &'static [(u32, &'static str)],
}

impl RelocTypeTable
{
    /// Table for a machine using the standard `r_info` packing
    ///
    /// `names` must be sorted ascending by type code.
    pub fn standard(machine: Machine, names: &'static [(u32, &'static str)]) -> Self
    {
        RelocTypeTable {
            machine,
            layout: InfoLayout::Standard,
            names,
        }
    }

    /// Table for a machine using the MIPS64 `r_info` field split
    ///
    /// `names` must be sorted ascending by type code.
    pub fn mips64(machine: Machine, names: &'static [(u32, &'static str)]) -> Self
    {
        RelocTypeTable {
            machine,
            layout: InfoLayout::Mips64,
            names,
        }
    }

    /// Look up the conventional name of a type code
    pub fn type_name(&self, code: u32) -> Option<&'static str>
    {
        self.names
            .binary_search_by_key(&code, |&(value, _)| value)
            .ok()
            .map(|index| self.names[index].1)
    }

    /// True when the code is in this machine's known type set
    pub fn is_known(&self, code: u32) -> bool
    {
        self.type_name(code).is_some()
    }

    /// Machine this table describes
    pub fn machine(&self) -> Machine
    {
        self.machine
    }
}

/// Capability-keyed map from machine to relocation knowledge
///
/// Injected at the decode boundary so new machines are added by
/// registering a table, never by touching the decode loop.
#[derive(Debug, Clone, Default)]
pub struct RelocRegistry
{
    tables: Vec<RelocTypeTable>,
}

impl RelocRegistry
{
    /// An empty registry; every decode fails with `UnknownMachine`
    pub fn new() -> Self
    {
        RelocRegistry { tables: Vec::new() }
    }

    /// Registry pre-loaded with aarch64, mips64 and x86_64
    pub fn with_defaults() -> Self
    {
        let mut registry = RelocRegistry::new();
        registry.register(RelocTypeTable::standard(Machine::Aarch64, AARCH64_RELOC_NAMES));
        registry.register(RelocTypeTable::mips64(Machine::Mips, MIPS_RELOC_NAMES));
        registry.register(RelocTypeTable::standard(Machine::X86_64, X86_64_RELOC_NAMES));
        registry
    }

    /// Add or replace the table for a machine
    pub fn register(&mut self, table: RelocTypeTable)
    {
        self.tables.retain(|entry| entry.machine != table.machine);
        self.tables.push(table);
    }

    /// Table for a machine, if one is registered
    pub fn lookup(&self, machine: Machine) -> Option<&RelocTypeTable>
    {
        self.tables.iter().find(|table| table.machine == machine)
    }
}

/// Fixed record width for a class/addend-form combination
const fn entry_size(class: Class, has_addend: bool) -> usize
{
    match (class, has_addend) {
        (Class::Elf32, false) => 8,
        (Class::Elf32, true) => 12,
        (Class::Elf64, false) => 16,
        (Class::Elf64, true) => 24,
    }
}

/// Decode every relocation record in a section
///
/// `has_addend` selects the `Rela` record layout (explicit addend); for
/// `Rel` sections the addend field of every returned entry is 0. The
/// record count is exactly `bytes.len() / entry_size`.
///
/// # Errors
///
/// - [`DecodeError::UnknownMachine`] if no entry layout is registered for
///   `identity.machine`; unrecognized type *values* within a known
///   machine pass through and are never an error
/// - [`DecodeError::TruncatedTable`] if the section size is not a whole
///   multiple of the record size
pub fn decode_relocations(
    bytes: &[u8],
    identity: &ElfIdentity,
    has_addend: bool,
    registry: &RelocRegistry,
) -> Result<Vec<RelocationEntry>>
{
    let table = registry
        .lookup(identity.machine)
        .ok_or(DecodeError::UnknownMachine(identity.machine.as_raw()))?;

    let record = entry_size(identity.class, has_addend);
    if bytes.len() % record != 0 {
        return Err(DecodeError::TruncatedTable {
            offset: bytes.len() - bytes.len() % record,
        });
    }

    let mut cursor = Cursor::new(bytes, identity.endianness);
    let mut entries = Vec::with_capacity(bytes.len() / record);
    while !cursor.is_empty() {
        entries.push(read_entry(&mut cursor, identity.class, table.layout, has_addend)?);
    }
    Ok(entries)
}

fn read_entry(
    cursor: &mut Cursor<'_>,
    class: Class,
    layout: InfoLayout,
    has_addend: bool,
) -> Result<RelocationEntry>
{
    match class {
        Class::Elf32 => {
            let offset = u64::from(cursor.read_u32()?);
            let info = cursor.read_u32()?;
            let addend = if has_addend {
                i64::from(cursor.read_i32()?)
            } else {
                0
            };
            Ok(RelocationEntry {
                offset,
                symbol_index: info >> 8,
                reloc_type: info & 0xff,
                addend,
            })
        }
        Class::Elf64 => {
            let offset = cursor.read_u64()?;
            let (symbol_index, reloc_type) = match layout {
                InfoLayout::Standard => {
                    let info = cursor.read_u64()?;
                    ((info >> 32) as u32, (info & 0xffff_ffff) as u32)
                }
                InfoLayout::Mips64 => {
                    let sym = cursor.read_u32()?;
                    let _ssym = cursor.read_u8()?;
                    let _type3 = cursor.read_u8()?;
                    let _type2 = cursor.read_u8()?;
                    let primary = cursor.read_u8()?;
                    (sym, u32::from(primary))
                }
            };
            let addend = if has_addend { cursor.read_i64()? } else { 0 };
            Ok(RelocationEntry {
                offset,
                symbol_index,
                reloc_type,
                addend,
            })
        }
    }
}

/// aarch64 relocation types (static data relocations and the common
/// code-generation set; SysV ABI for the Arm 64-bit architecture)
static AARCH64_RELOC_NAMES: &[(u32, &str)] = &[
    (0, "R_AARCH64_NONE"),
    (256, "R_AARCH64_NONE"),
    (257, "R_AARCH64_ABS64"),
    (258, "R_AARCH64_ABS32"),
    (259, "R_AARCH64_ABS16"),
    (260, "R_AARCH64_PREL64"),
    (261, "R_AARCH64_PREL32"),
    (262, "R_AARCH64_PREL16"),
    (263, "R_AARCH64_MOVW_UABS_G0"),
    (264, "R_AARCH64_MOVW_UABS_G0_NC"),
    (265, "R_AARCH64_MOVW_UABS_G1"),
    (266, "R_AARCH64_MOVW_UABS_G1_NC"),
    (267, "R_AARCH64_MOVW_UABS_G2"),
    (268, "R_AARCH64_MOVW_UABS_G2_NC"),
    (269, "R_AARCH64_MOVW_UABS_G3"),
    (270, "R_AARCH64_MOVW_SABS_G0"),
    (271, "R_AARCH64_MOVW_SABS_G1"),
    (272, "R_AARCH64_MOVW_SABS_G2"),
    (273, "R_AARCH64_LD_PREL_LO19"),
    (274, "R_AARCH64_ADR_PREL_LO21"),
    (275, "R_AARCH64_ADR_PREL_PG_HI21"),
    (276, "R_AARCH64_ADR_PREL_PG_HI21_NC"),
    (277, "R_AARCH64_ADD_ABS_LO12_NC"),
    (278, "R_AARCH64_LDST8_ABS_LO12_NC"),
    (279, "R_AARCH64_TSTBR14"),
    (280, "R_AARCH64_CONDBR19"),
    (282, "R_AARCH64_JUMP26"),
    (283, "R_AARCH64_CALL26"),
    (284, "R_AARCH64_LDST16_ABS_LO12_NC"),
    (285, "R_AARCH64_LDST32_ABS_LO12_NC"),
    (286, "R_AARCH64_LDST64_ABS_LO12_NC"),
    (299, "R_AARCH64_LDST128_ABS_LO12_NC"),
    (309, "R_AARCH64_GOT_LD_PREL19"),
    (311, "R_AARCH64_ADR_GOT_PAGE"),
    (312, "R_AARCH64_LD64_GOT_LO12_NC"),
    (1025, "R_AARCH64_GLOB_DAT"),
    (1026, "R_AARCH64_JUMP_SLOT"),
    (1027, "R_AARCH64_RELATIVE"),
    (1028, "R_AARCH64_TLS_DTPREL64"),
    (1029, "R_AARCH64_TLS_DTPMOD64"),
    (1030, "R_AARCH64_TLS_TPREL64"),
    (1031, "R_AARCH64_TLSDESC"),
    (1032, "R_AARCH64_IRELATIVE"),
];

/// MIPS relocation types (o32 plus the n64 additions)
static MIPS_RELOC_NAMES: &[(u32, &str)] = &[
    (0, "R_MIPS_NONE"),
    (1, "R_MIPS_16"),
    (2, "R_MIPS_32"),
    (3, "R_MIPS_REL32"),
    (4, "R_MIPS_26"),
    (5, "R_MIPS_HI16"),
    (6, "R_MIPS_LO16"),
    (7, "R_MIPS_GPREL16"),
    (8, "R_MIPS_LITERAL"),
    (9, "R_MIPS_GOT16"),
    (10, "R_MIPS_PC16"),
    (11, "R_MIPS_CALL16"),
    (12, "R_MIPS_GPREL32"),
    (16, "R_MIPS_SHIFT5"),
    (17, "R_MIPS_SHIFT6"),
    (18, "R_MIPS_64"),
    (19, "R_MIPS_GOT_DISP"),
    (20, "R_MIPS_GOT_PAGE"),
    (21, "R_MIPS_GOT_OFST"),
    (22, "R_MIPS_GOT_HI16"),
    (23, "R_MIPS_GOT_LO16"),
    (24, "R_MIPS_SUB"),
    (25, "R_MIPS_INSERT_A"),
    (26, "R_MIPS_INSERT_B"),
    (27, "R_MIPS_DELETE"),
    (28, "R_MIPS_HIGHER"),
    (29, "R_MIPS_HIGHEST"),
    (30, "R_MIPS_CALL_HI16"),
    (31, "R_MIPS_CALL_LO16"),
    (32, "R_MIPS_SCN_DISP"),
    (33, "R_MIPS_REL16"),
    (34, "R_MIPS_ADD_IMMEDIATE"),
    (35, "R_MIPS_PJUMP"),
    (36, "R_MIPS_RELGOT"),
    (37, "R_MIPS_JALR"),
    (38, "R_MIPS_TLS_DTPMOD32"),
    (39, "R_MIPS_TLS_DTPREL32"),
    (40, "R_MIPS_TLS_DTPMOD64"),
    (41, "R_MIPS_TLS_DTPREL64"),
    (42, "R_MIPS_TLS_GD"),
    (43, "R_MIPS_TLS_LDM"),
    (44, "R_MIPS_TLS_DTPREL_HI16"),
    (45, "R_MIPS_TLS_DTPREL_LO16"),
    (46, "R_MIPS_TLS_GOTTPREL"),
    (47, "R_MIPS_TLS_TPREL32"),
    (48, "R_MIPS_TLS_TPREL64"),
    (49, "R_MIPS_TLS_TPREL_HI16"),
    (50, "R_MIPS_TLS_TPREL_LO16"),
];

/// x86_64 relocation types (SysV ABI)
static X86_64_RELOC_NAMES: &[(u32, &str)] = &[
    (0, "R_X86_64_NONE"),
    (1, "R_X86_64_64"),
    (2, "R_X86_64_PC32"),
    (3, "R_X86_64_GOT32"),
    (4, "R_X86_64_PLT32"),
    (5, "R_X86_64_COPY"),
    (6, "R_X86_64_GLOB_DAT"),
    (7, "R_X86_64_JUMP_SLOT"),
    (8, "R_X86_64_RELATIVE"),
    (9, "R_X86_64_GOTPCREL"),
    (10, "R_X86_64_32"),
    (11, "R_X86_64_32S"),
    (12, "R_X86_64_16"),
    (13, "R_X86_64_PC16"),
    (14, "R_X86_64_8"),
    (15, "R_X86_64_PC8"),
    (16, "R_X86_64_DTPMOD64"),
    (17, "R_X86_64_DTPOFF64"),
    (18, "R_X86_64_TPOFF64"),
    (19, "R_X86_64_TLSGD"),
    (20, "R_X86_64_TLSLD"),
    (21, "R_X86_64_DTPOFF32"),
    (22, "R_X86_64_GOTTPOFF"),
    (23, "R_X86_64_TPOFF32"),
    (24, "R_X86_64_PC64"),
    (25, "R_X86_64_GOTOFF64"),
    (26, "R_X86_64_GOTPC32"),
    (32, "R_X86_64_SIZE32"),
    (33, "R_X86_64_SIZE64"),
    (37, "R_X86_64_IRELATIVE"),
    (41, "R_X86_64_GOTPCRELX"),
    (42, "R_X86_64_REX_GOTPCRELX"),
];
