//! # Error Types
//!
//! General error handling for the decoders.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

/// Main error type for decode operations
///
/// This enum represents all the ways a decode operation can fail. Each
/// variant corresponds to a structurally impossible byte layout; layouts
/// that are merely unusual but permitted by the ELF/DWARF specifications
/// (absent tables, partial range coverage, unrecognized opcodes or
/// relocation types, trailing alignment filler) are *not* errors and are
/// surfaced through the ordinary result types instead.
///
/// ## Error Categories
///
/// 1. **Container errors**: InvalidMagic, UnsupportedClass, TruncatedTable
/// 2. **Cursor errors**: OutOfBounds, MalformedVarint
/// 3. **Relocation errors**: UnknownMachine
/// 4. **Note errors**: TruncatedNote
/// 5. **DWARF errors**: InvalidHeader, TruncatedProgram
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError
{
    /// The buffer does not start with the `\x7fELF` magic bytes
    ///
    /// This happens when:
    /// - The file is not an ELF file at all
    /// - The buffer was sliced at the wrong offset
    /// - The file is shorter than the 4-byte magic
    #[error("Not an ELF file: bad magic")]
    InvalidMagic,

    /// The `EI_CLASS` identification byte is neither `ELFCLASS32` nor `ELFCLASS64`
    ///
    /// The value found is carried so callers can report it.
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),

    /// A read would access bytes beyond the end of the supplied buffer
    ///
    /// The cursor position is left where it was before the failing read so
    /// the offset in this error always points at the first byte that could
    /// not be satisfied.
    #[error("Read out of bounds at offset {offset:#x}")]
    OutOfBounds
    {
        /// Offset of the first byte the read needed but could not get
        offset: usize,
    },

    /// A fixed-entry-size table extends past the end of the buffer
    ///
    /// Raised when `offset + count * entry_size` exceeds the buffer, and
    /// also when a table's size is not a whole multiple of its declared
    /// entry size (the table cannot contain complete entries).
    #[error("Truncated table at offset {offset:#x}")]
    TruncatedTable
    {
        /// File offset of the table that failed validation
        offset: usize,
    },

    /// A ULEB128/SLEB128 value ran off the end of the buffer or exceeded 64 bits
    #[error("Malformed LEB128 value at offset {offset:#x}")]
    MalformedVarint
    {
        /// Offset of the first byte of the varint
        offset: usize,
    },

    /// No relocation entry layout is registered for this machine
    ///
    /// The raw `e_machine` value is carried. Note that an unrecognized
    /// relocation *type* within a known machine is never an error; the type
    /// value is passed through opaquely.
    #[error("No relocation layout registered for machine {0:#x}")]
    UnknownMachine(u16),

    /// A note entry's declared `namesz`/`descsz` overruns the note region
    #[error("Truncated note entry at offset {offset:#x}")]
    TruncatedNote
    {
        /// Offset of the note entry's 12-byte header
        offset: usize,
    },

    /// A header carries parameters no conforming producer emits
    ///
    /// Examples: a line-number header with `opcode_base == 0` or
    /// `line_range == 0`, a reserved DWARF64 initial length, an aranges
    /// unit with nonzero `segment_size`, an `EI_DATA` byte naming no byte
    /// order.
    #[error("Invalid header at offset {offset:#x}: {reason}")]
    InvalidHeader
    {
        /// Offset of the unit header
        offset: usize,
        /// Short description of the offending parameter
        reason: &'static str,
    },

    /// A line-number opcode's operands overrun the unit's declared length
    #[error("Truncated line-number program at offset {offset:#x}")]
    TruncatedProgram
    {
        /// Offset of the opcode whose operands could not be read
        offset: usize,
    },
}

/// Convenience type alias for `Result<T, DecodeError>`
///
/// ```rust
/// use elfscope_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, DecodeError>;
