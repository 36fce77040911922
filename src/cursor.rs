// src/cursor.rs
// Forward-only little-endian reader over an in-memory GDF buffer

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{GdfError, Result};

/// Sequential reader with offset tracking. Every read checks the remaining
/// length first so a truncated file reports where it ran out.
#[derive(Clone, Debug)]
pub struct GdfCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> GdfCursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        GdfCursor {
            inner: Cursor::new(buffer),
        }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }

    /// Total length of the underlying buffer
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn rewind(&mut self) {
        self.inner.set_position(0);
    }

    fn ensure(&self, wanted: usize) -> Result<()> {
        let available = self.remaining();
        if wanted > available {
            return Err(GdfError::UnexpectedEof {
                offset: self.position(),
                wanted,
                available,
            });
        }
        Ok(())
    }

    /// Borrow the next `count` bytes and advance past them
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.ensure(count)?;
        let start = self.position();
        let buffer: &'a [u8] = *self.inner.get_ref();
        self.inner.set_position((start + count) as u64);
        Ok(&buffer[start..start + count])
    }

    /// Discard alignment padding
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.inner.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.inner.read_u16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.ensure(4)?;
        Ok(self.inner.read_f32::<LittleEndian>()?)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.ensure(8)?;
        Ok(self.inner.read_f64::<LittleEndian>()?)
    }
}
