// src/error.rs
// Error type shared by every stage of the GDF reader

use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GdfError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported GDF version: 0x{found:04x} (expected 0x{expected:04x})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("Structural integrity error at offset {offset}: {message}")]
    StructuralIntegrity { offset: usize, message: String },

    #[error("Unexpected end of buffer at offset {offset}: wanted {wanted} bytes, {available} available")]
    UnexpectedEof {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    #[error("Invalid UTF-8 in {field}: {source}")]
    Encoding {
        field: String,
        #[source]
        source: Utf8Error,
    },

    #[error("Image shape mismatch: {rows}x{columns} needs {expected} values, got {found}")]
    ShapeMismatch {
        rows: usize,
        columns: usize,
        expected: usize,
        found: usize,
    },
}

impl GdfError {
    pub fn structural<S: Into<String>>(offset: usize, message: S) -> Self {
        Self::StructuralIntegrity {
            offset,
            message: message.into(),
        }
    }

    pub fn encoding<S: Into<String>>(field: S, source: Utf8Error) -> Self {
        Self::Encoding {
            field: field.into(),
            source,
        }
    }

    /// True for errors after which the byte stream cannot be interpreted any further.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GdfError::StructuralIntegrity { .. } | GdfError::UnexpectedEof { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GdfError>;
