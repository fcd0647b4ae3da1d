// Error taxonomy shared by every signature/delta/patch operation.
//
// Three terminal classes: I/O on a byte source or sink, malformed
// signature/delta bytes, and invalid configuration. Nothing is retried
// inside the crate.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Result codes (librsync `rs_result` values)
// ---------------------------------------------------------------------------

pub const RS_IO_ERROR: i32 = 100;
pub const RS_INPUT_ENDED: i32 = 103;
pub const RS_BAD_MAGIC: i32 = 105;
pub const RS_CORRUPT: i32 = 107;
pub const RS_INTERNAL_ERROR: i32 = 108;
pub const RS_PARAM_ERROR: i32 = 109;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Malformed or truncated signature/delta input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("input ended inside {0}")]
    Truncated(&'static str),
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),
    #[error("value out of range: {0}")]
    OutOfRange(String),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Open/read/write failure on a byte source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed signature or delta stream.
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    /// Invalid or mismatched configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// The caller raised the operation's cancel flag.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Numeric result code for callers that speak librsync's `rs_result`.
    pub fn code(&self) -> i32 {
        match self {
            Self::Io(_) => RS_IO_ERROR,
            Self::Format(FormatError::BadMagic(_)) => RS_BAD_MAGIC,
            Self::Format(FormatError::Truncated(_)) => RS_INPUT_ENDED,
            Self::Format(_) => RS_CORRUPT,
            Self::Config(_) => RS_PARAM_ERROR,
            Self::Cancelled => RS_INTERNAL_ERROR,
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_librsync() {
        assert_eq!(Error::from(io::Error::other("x")).code(), RS_IO_ERROR);
        assert_eq!(Error::from(FormatError::BadMagic(1)).code(), RS_BAD_MAGIC);
        assert_eq!(
            Error::from(FormatError::Truncated("header")).code(),
            RS_INPUT_ENDED
        );
        assert_eq!(Error::from(FormatError::UnknownCommand(0x99)).code(), RS_CORRUPT);
        assert_eq!(Error::config("bad").code(), RS_PARAM_ERROR);
    }

    #[test]
    fn display_includes_detail() {
        let e = Error::from(FormatError::BadMagic(0x1234_5678));
        assert_eq!(e.to_string(), "format error: bad magic number 0x12345678");
        assert!(e.is_format());
        assert!(!e.is_io());
    }
}
