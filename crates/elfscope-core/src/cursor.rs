//! Endian- and width-aware byte cursor.
//!
//! Every decoder in this crate is built on [`Cursor`]: a borrowed byte slice
//! plus a position. Reads either return the requested primitive and advance
//! the position, or fail *without* advancing, so the position in a
//! [`DecodeError::OutOfBounds`] always points at the byte that could not be
//! read.

use crate::error::{DecodeError, Result};

/// Byte order for multi-byte integer reads
///
/// Chosen once at cursor construction (normally from the ELF identification
/// bytes) and applied to every subsequent multi-byte read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness
{
    /// Least-significant byte first (`ELFDATA2LSB`)
    Little,
    /// Most-significant byte first (`ELFDATA2MSB`)
    Big,
}

/// Bounds-checked reader over a borrowed byte slice
///
/// The cursor never reads past the end of its slice under any input. All
/// fixed-width integer reads honor the construction-time [`Endianness`];
/// LEB128 reads are endian-independent by definition.
#[derive(Debug, Clone)]
pub struct Cursor<'a>
{
    data: &'a [u8],
    pos: usize,
    endian: Endianness,
}

impl<'a> Cursor<'a>
{
    /// Wrap a byte slice, starting at position 0
    pub fn new(data: &'a [u8], endian: Endianness) -> Self
    {
        Cursor { data, pos: 0, endian }
    }

    /// Current position, in bytes from the start of the slice
    pub fn pos(&self) -> usize
    {
        self.pos
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize
    {
        self.data.len() - self.pos
    }

    /// True when every byte has been consumed
    pub fn is_empty(&self) -> bool
    {
        self.pos == self.data.len()
    }

    /// Byte order this cursor was constructed with
    pub fn endianness(&self) -> Endianness
    {
        self.endian
    }

    /// Move to an absolute position
    ///
    /// Positions up to and including the slice length are valid (a cursor
    /// may sit exactly at the end).
    pub fn seek(&mut self, pos: usize) -> Result<()>
    {
        if pos > self.data.len() {
            return Err(DecodeError::OutOfBounds { offset: pos });
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance past `count` bytes without inspecting them
    pub fn skip(&mut self, count: usize) -> Result<()>
    {
        let end = self
            .pos
            .checked_add(count)
            .ok_or(DecodeError::OutOfBounds { offset: self.pos })?;
        self.seek(end)
    }

    /// Round the position up to the next multiple of `alignment`
    ///
    /// Alignment is measured from the start of the slice, which matches how
    /// ELF note fields and DWARF aranges tuples declare their padding. An
    /// alignment of 0 or 1 is a no-op.
    pub fn align_to(&mut self, alignment: usize) -> Result<()>
    {
        if alignment <= 1 {
            return Ok(());
        }
        let aligned = self
            .pos
            .checked_add(alignment - 1)
            .ok_or(DecodeError::OutOfBounds { offset: self.pos })?
            / alignment
            * alignment;
        self.seek(aligned)
    }

    /// Borrow the next `count` bytes and advance past them
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]>
    {
        let end = self
            .pos
            .checked_add(count)
            .ok_or(DecodeError::OutOfBounds { offset: self.pos })?;
        if end > self.data.len() {
            return Err(DecodeError::OutOfBounds { offset: self.data.len() });
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Split off a bounded sub-cursor over the next `count` bytes
    ///
    /// The parent cursor advances past the region. Used for DWARF units,
    /// whose declared `unit_length` must bound every read inside them.
    pub fn subslice(&mut self, count: usize) -> Result<Cursor<'a>>
    {
        let bytes = self.read_bytes(count)?;
        Ok(Cursor::new(bytes, self.endian))
    }

    /// Read bytes up to (but not including) the next NUL, consuming the NUL
    ///
    /// Fails with `OutOfBounds` if the slice ends before a NUL is found.
    pub fn read_cstr(&mut self) -> Result<&'a [u8]>
    {
        let start = self.pos;
        let rest = &self.data[start..];
        match rest.iter().position(|&b| b == 0) {
            Some(nul) => {
                self.pos = start + nul + 1;
                Ok(&rest[..nul])
            }
            None => Err(DecodeError::OutOfBounds { offset: self.data.len() }),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8>
    {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn read_i8(&mut self) -> Result<i8>
    {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16>
    {
        let bytes: [u8; 2] = self.read_bytes(2)?.try_into().unwrap();
        Ok(match self.endian {
            Endianness::Little => u16::from_le_bytes(bytes),
            Endianness::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32>
    {
        let bytes: [u8; 4] = self.read_bytes(4)?.try_into().unwrap();
        Ok(match self.endian {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64>
    {
        let bytes: [u8; 8] = self.read_bytes(8)?.try_into().unwrap();
        Ok(match self.endian {
            Endianness::Little => u64::from_le_bytes(bytes),
            Endianness::Big => u64::from_be_bytes(bytes),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32>
    {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64>
    {
        Ok(self.read_u64()? as i64)
    }

    /// Read an unsigned integer of 1, 2, 4 or 8 bytes, widened to `u64`
    ///
    /// The width is typically a unit header's `address_size`.
    pub fn read_uint(&mut self, width: usize) -> Result<u64>
    {
        match width {
            1 => Ok(u64::from(self.read_u8()?)),
            2 => Ok(u64::from(self.read_u16()?)),
            4 => Ok(u64::from(self.read_u32()?)),
            8 => self.read_u64(),
            _ => Err(DecodeError::OutOfBounds { offset: self.pos }),
        }
    }

    /// Read an unsigned LEB128 value
    ///
    /// Fails with [`DecodeError::MalformedVarint`] if the buffer ends
    /// mid-sequence or the value would exceed 64 bits. The position is not
    /// advanced on failure.
    pub fn read_uleb128(&mut self) -> Result<u64>
    {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        for (i, &byte) in self.data[start..].iter().enumerate() {
            let low = u64::from(byte & 0x7f);
            // The tenth byte may only contribute a single bit.
            if shift == 63 && low > 1 || shift > 63 {
                return Err(DecodeError::MalformedVarint { offset: start });
            }
            value |= low << shift;
            if byte & 0x80 == 0 {
                self.pos = start + i + 1;
                return Ok(value);
            }
            shift += 7;
        }
        Err(DecodeError::MalformedVarint { offset: start })
    }

    /// Read a signed LEB128 value
    ///
    /// Same failure behavior as [`Cursor::read_uleb128`].
    pub fn read_sleb128(&mut self) -> Result<i64>
    {
        let start = self.pos;
        let mut value: i64 = 0;
        let mut shift: u32 = 0;
        for (i, &byte) in self.data[start..].iter().enumerate() {
            let low = byte & 0x7f;
            // The tenth byte carries value bit 63 plus its sign extension,
            // so only an all-zeros or all-ones payload still fits.
            if shift == 63 && low != 0 && low != 0x7f || shift > 63 {
                return Err(DecodeError::MalformedVarint { offset: start });
            }
            value |= i64::from(low) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                // Sign-extend from the encoded width.
                if shift < 64 && byte & 0x40 != 0 {
                    value |= -1i64 << shift;
                }
                self.pos = start + i + 1;
                return Ok(value);
            }
        }
        Err(DecodeError::MalformedVarint { offset: start })
    }
}
