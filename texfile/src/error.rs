//! Error types for texture parsing and decoding

use thiserror::Error;

/// Result type for texture operations
pub type Result<T> = std::result::Result<T, TextureError>;

/// Errors that can occur while parsing or decoding a texture file
#[derive(Error, Debug)]
pub enum TextureError {
    /// I/O errors from the underlying byte source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Magic number / extension sniff failed. Expected for unrecognized
    /// files, not a defect.
    #[error("Unsupported file format")]
    UnsupportedFormat,

    /// A structurally required header field failed a validity check
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A computed read would exceed the available buffer or file length
    #[error("Truncated input: need {expected} bytes, have {actual}")]
    TruncatedInput { expected: usize, actual: usize },

    /// Width or height is zero or exceeds the maximum bound
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Source palette declares more entries than fit in the index width
    #[error("Palette too large: {entries} entries, limit {max}")]
    PaletteTooLarge { entries: usize, max: usize },

    /// A decode would write past an allocated destination
    #[error("Buffer overflow during decode")]
    BufferOverflow,
}

impl TextureError {
    /// Create a new invalid header error
    pub fn invalid_header<S: Into<String>>(msg: S) -> Self {
        Self::InvalidHeader(msg.into())
    }

    /// Create a new truncated input error
    pub fn truncated(expected: usize, actual: usize) -> Self {
        Self::TruncatedInput { expected, actual }
    }

    /// Create a new invalid dimensions error
    pub fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    /// Create a new palette too large error
    pub fn palette_too_large(entries: usize, max: usize) -> Self {
        Self::PaletteTooLarge { entries, max }
    }

    /// Check whether this error means "not this format" rather than
    /// "this format, but broken". The factory uses this to fall through
    /// to the next magic-table entry.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, TextureError::UnsupportedFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TextureError::invalid_header("bad chunk size");
        assert!(matches!(err, TextureError::InvalidHeader(_)));
        assert_eq!(err.to_string(), "Invalid header: bad chunk size");
    }

    #[test]
    fn test_truncated_input_error() {
        let err = TextureError::truncated(100, 50);
        assert!(matches!(err, TextureError::TruncatedInput { .. }));
        assert_eq!(err.to_string(), "Truncated input: need 100 bytes, have 50");
    }

    #[test]
    fn test_invalid_dimensions_error() {
        let err = TextureError::invalid_dimensions(0, 128);
        assert_eq!(err.to_string(), "Invalid image dimensions: 0x128");
    }

    #[test]
    fn test_unsupported_check() {
        assert!(TextureError::UnsupportedFormat.is_unsupported());
        assert!(!TextureError::BufferOverflow.is_unsupported());
    }
}
