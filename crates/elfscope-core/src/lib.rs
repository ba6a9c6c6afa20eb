//! # elfscope-core
//!
//! Low-level ELF container and DWARF debug-section decoding for Elfscope.
//!
//! This crate turns raw ELF bytes into structured, queryable entities:
//! - ELF identification, section header table, program header table
//! - Relocation sections, with per-machine entry layouts and type-name
//!   tables (aarch64, mips64, x86_64 out of the box)
//! - Note sections and segments, including the 8-byte segment padding rule
//! - DWARF `.debug_aranges` address-range tables
//! - DWARF `.debug_line` line-number programs
//!
//! ## Design
//!
//! Every decoder is a pure, synchronous, re-entrant function over a
//! borrowed byte buffer. No decoder writes anywhere, blocks, or keeps
//! state between calls, so decoding different sections of the same buffer
//! from different threads needs no coordination. Errors are returned to
//! the caller, never printed; one malformed section must not stop a
//! caller from decoding its siblings.
//!
//! ## Example
//!
//! ```rust,no_run
//! use elfscope_core::elf::{self, ElfIdentity};
//!
//! # fn main() -> elfscope_core::error::Result<()> {
//! # let bytes: Vec<u8> = Vec::new();
//! let identity = ElfIdentity::parse(&bytes)?;
//! let sections = elf::parse_section_headers(&bytes, &identity)?;
//! for section in &sections {
//!     println!("{} ({} bytes)", section.name, section.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod dwarf;
pub mod elf;
pub mod error;

pub use cursor::{Cursor, Endianness};
// Re-export commonly used types
pub use elf::{ElfIdentity, Machine};
pub use error::{DecodeError, Result};
