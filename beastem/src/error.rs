//! Crate-wide error type for configuration-time failures (CLI parsing, file
//! loading). The steady-state tick loop never raises one of these: guest-
//! triggered and host-device failures are reduced to logged warnings or state
//! resets there (see the bus tick loop).

use std::fmt;

#[derive(Debug)]
pub enum BeastError {
    /// Underlying I/O error (file not found, permission denied, etc.)
    Io(std::io::Error),

    /// A binary image did not fit in the destination region.
    BinaryTooLarge {
        file: String,
        destination: String,
        space: usize,
        actual: usize,
    },

    /// A listing file failed the §6 validation rules (NUL byte, overlong line,
    /// or a line that doesn't match the expected `lineno addr bytes... text` shape).
    ListingParse {
        file: String,
        line: usize,
        reason: String,
    },

    /// A video-coprocessor asset file (register/palette/VRAM image) was malformed.
    VideoAsset { file: String, reason: String },

    /// CLI argument was missing, malformed, or out of range.
    Cli(String),
}

impl fmt::Display for BeastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BinaryTooLarge {
                file,
                destination,
                space,
                actual,
            } => write!(
                f,
                "binary file '{file}' is too big for {destination}: {actual} bytes, {space} available"
            ),
            Self::ListingParse { file, line, reason } => {
                write!(f, "{file}:{line}: {reason}")
            }
            Self::VideoAsset { file, reason } => write!(f, "video asset '{file}': {reason}"),
            Self::Cli(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for BeastError {}

impl From<std::io::Error> for BeastError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
