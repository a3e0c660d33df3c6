//! Centralized error types for mailpager.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailpager library.
#[derive(Error, Debug)]
pub enum PagerError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The backing stream failed while reading the line at `offset`.
    ///
    /// End of stream is not an error; the scanner reports it as `Ok(None)`.
    #[error("Read error at offset {offset}: {source}")]
    StreamRead {
        offset: u64,
        source: std::io::Error,
    },

    /// A search or highlight regex did not compile.
    #[error("Invalid pattern '{pattern}': {source}")]
    PatternCompile {
        pattern: String,
        source: regex::Error,
    },

    /// A configured color name could not be understood.
    #[error("Unknown color: {0}")]
    InvalidColor(String),

    /// Growing the line table failed. Fatal for the session.
    #[error("Out of memory growing the line table to {requested} rows")]
    AllocationExhausted { requested: usize },

    /// The message decoder could not produce any displayable text.
    #[error("Could not decode message: {0}")]
    MessageParse(String),
}

/// Convenience alias for `Result<T, PagerError>`.
pub type Result<T> = std::result::Result<T, PagerError>;

impl PagerError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `PatternCompile` variant for `pattern`.
    pub fn pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::PatternCompile {
            pattern: pattern.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare; prefer `PagerError::io` or `StreamRead`).
impl From<std::io::Error> for PagerError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}
