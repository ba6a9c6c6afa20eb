//! # DWARF Debug-Section Decoding
//!
//! Decoders for the debug sections a `readelf`/`dwarfdump`-style consumer
//! needs: `.debug_aranges` address-range tables and `.debug_line`
//! line-number programs.
//!
//! Both decoders work from a raw section slice plus an [`ElfIdentity`]
//! (class and endianness), so they are usable standalone against any
//! complying debug section: the ELF container reader is a convenience
//! for locating the slices, not a prerequisite.
//!
//! [`ElfIdentity`]: crate::elf::ElfIdentity

pub mod aranges;
pub mod line;

pub use aranges::{cu_offset_at_addr, decode_aranges, AddressRange, ArangesUnit};
pub use line::{
    decode_line_program, decode_line_programs, FileEntry, LineProgram, LineProgramHeader, LineRow,
};
