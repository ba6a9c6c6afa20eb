//! ELF note decoding.
//!
//! Notes are `(namesz, descsz, type, name, desc)` records packed into
//! `.note.*` sections and `PT_NOTE` segments. The only subtle part is the
//! padding: both variable-length fields are padded up to the declared
//! alignment, normally 4 bytes, but a note *segment* whose program header
//! declares `align == 8` pads up to 8-byte boundaries instead. An
//! off-by-one here mis-parses every subsequent note in the region, which
//! is why the walk below is driven entirely by aligned cursor positions.

use tracing::warn;

use super::{ElfIdentity, ProgramHeader};
use crate::cursor::Cursor;
use crate::error::{DecodeError, Result};

/// Size of the fixed `(namesz, descsz, type)` header
const NOTE_HEADER_SIZE: usize = 12;

/// Decode parameters for a note region
#[derive(Debug, Clone, Copy)]
pub struct NoteOptions
{
    /// Field padding unit; 4 unless the enclosing segment declares 8
    pub alignment: usize,
    /// Trailing bytes after the last complete entry tolerated silently.
    /// Anything longer (but still shorter than a header) is reported in
    /// [`DecodedNotes::trailing`]. ELF convention suggests `alignment - 1`
    /// but nothing in the format pins it down, hence a knob.
    pub trailing_slack: usize,
}

impl NoteOptions
{
    /// Conventional section padding: 4-byte fields, slack of 3
    pub fn section() -> Self
    {
        Self::with_alignment(4)
    }

    /// Padding derived from an enclosing segment's declared alignment
    ///
    /// Only an explicit `align == 8` switches to 8-byte padding; any other
    /// value (including 0 and 1) keeps the default 4.
    pub fn for_segment(header: &ProgramHeader) -> Self
    {
        if header.align == 8 {
            Self::with_alignment(8)
        } else {
            Self::with_alignment(4)
        }
    }

    /// Explicit alignment with the conventional `alignment - 1` slack
    pub fn with_alignment(alignment: usize) -> Self
    {
        NoteOptions {
            alignment,
            trailing_slack: alignment.saturating_sub(1),
        }
    }

    /// Override the trailing-byte tolerance
    pub fn trailing_slack(mut self, slack: usize) -> Self
    {
        self.trailing_slack = slack;
        self
    }
}

impl Default for NoteOptions
{
    fn default() -> Self
    {
        Self::section()
    }
}

/// One decoded note record
///
/// The descriptor is copied out of the source buffer, so the entry does
/// not borrow from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEntry
{
    /// Owner name, without padding or the trailing NUL
    pub name: String,
    /// Declared `namesz`, counting the NUL that [`NoteEntry::name`] strips
    pub name_size: u32,
    /// Descriptor bytes, exactly `descsz` long
    pub descriptor: Vec<u8>,
    /// Type value; meaning is owner-specific
    pub note_type: u32,
    /// Offset of this entry's header within the decoded region
    pub offset: u64,
}

/// Trailing bytes left after the last complete entry
///
/// Reported, not raised: short trailers are alignment filler emitted by
/// linkers and must not fail the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingBytes
{
    /// Offset of the first leftover byte
    pub offset: u64,
    /// Leftover length, always less than a note header
    pub length: usize,
}

/// Result of decoding one note region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedNotes
{
    /// Entries in on-disk order
    pub entries: Vec<NoteEntry>,
    /// Leftover bytes beyond the configured slack, if any
    pub trailing: Option<TrailingBytes>,
}

/// Walk every note record in a section or segment extent
///
/// `bytes` must be the exact region (use [`super::section_bytes`] or
/// [`super::segment_bytes`]); `options` carries the alignment derived from
/// the enclosing container.
///
/// # Errors
///
/// [`DecodeError::TruncatedNote`] when a declared `namesz`/`descsz` would
/// read past the end of the region. Trailing filler is never an error.
pub fn decode_notes(
    bytes: &[u8],
    identity: &ElfIdentity,
    options: &NoteOptions,
) -> Result<DecodedNotes>
{
    let mut cursor = Cursor::new(bytes, identity.endianness);
    let mut entries = Vec::new();
    let mut trailing = None;

    while !cursor.is_empty() {
        let remaining = cursor.remaining();
        if remaining < NOTE_HEADER_SIZE {
            // Filler after the last entry. Silent within the configured
            // slack, reported beyond it.
            if remaining > options.trailing_slack {
                let offset = cursor.pos() as u64;
                warn!(offset, length = remaining, "trailing bytes after last note entry");
                trailing = Some(TrailingBytes {
                    offset,
                    length: remaining,
                });
            }
            break;
        }

        let entry_offset = cursor.pos();
        let name_size = cursor.read_u32()?;
        let namesz = name_size as usize;
        let descsz = cursor.read_u32()? as usize;
        let note_type = cursor.read_u32()?;

        let name_bytes = cursor
            .read_bytes(namesz)
            .map_err(|_| DecodeError::TruncatedNote { offset: entry_offset })?;
        let name_end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_bytes.len());
        let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();
        align_within(&mut cursor, bytes.len(), options.alignment);

        let descriptor = cursor
            .read_bytes(descsz)
            .map_err(|_| DecodeError::TruncatedNote { offset: entry_offset })?
            .to_vec();
        align_within(&mut cursor, bytes.len(), options.alignment);

        entries.push(NoteEntry {
            name,
            name_size,
            descriptor,
            note_type,
            offset: entry_offset as u64,
        });
    }

    Ok(DecodedNotes { entries, trailing })
}

// Padding may legitimately run off the end of the region (a final entry
// whose pad bytes the producer omitted), so alignment clamps to the end
// instead of failing.
fn align_within(cursor: &mut Cursor<'_>, len: usize, alignment: usize)
{
    if cursor.align_to(alignment).is_err() {
        // Position stays valid; park the cursor at the end.
        let _ = cursor.seek(len);
    }
}
