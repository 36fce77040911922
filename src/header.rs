// src/header.rs
// GDF file header decoding

use log::debug;

use crate::cursor::GdfCursor;
use crate::error::{GdfError, Result};

/// The only format revision this reader understands
pub const GDF_VERSION: u16 = 0x0200;

/// magic(4) + version(2) + pad(2) + creation time(4) + description length(4)
pub const HEADER_FIXED_SIZE: usize = 16;

/// Representation of the GDF file header as decoded.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct GdfHeader {
    pub magic: [u8; 4],
    pub version: u16,
    /// Creation time in seconds since the Unix epoch
    pub creation_time: u32,
    pub description: String,
}

impl GdfHeader {
    /// Rewind the cursor and decode the header. The version is checked
    /// before anything after it is read.
    pub fn read_header(cursor: &mut GdfCursor<'_>) -> Result<Self> {
        cursor.rewind();

        let mut header = GdfHeader::default();
        header.magic.copy_from_slice(cursor.read_bytes(4)?);

        header.version = cursor.read_u16()?;
        if header.version != GDF_VERSION {
            return Err(GdfError::UnsupportedVersion {
                found: header.version,
                expected: GDF_VERSION,
            });
        }
        cursor.skip(2)?;

        header.creation_time = cursor.read_u32()?;
        let description_length = cursor.read_u32()? as usize;
        let description = cursor.read_bytes(description_length)?;
        header.description = std::str::from_utf8(description)
            .map_err(|e| GdfError::encoding("header description", e))?
            .to_string();

        debug!(
            "header: magic={:?} version=0x{:04x} created={} description_len={}",
            String::from_utf8_lossy(&header.magic),
            header.version,
            header.creation_time,
            description_length
        );

        Ok(header)
    }
}
