//! Error types for hnswkit.
//!
//! Every fallible operation returns [`Result`], whose error side is the
//! [`HnswkitError`] enum. Each variant maps onto a [`StatusCode`] so callers that
//! speak in status values (the CLI, foreign bindings) get a stable code.
//!
//! # Examples
//!
//! ```
//! use hnswkit::error::{HnswkitError, Result, StatusCode};
//!
//! fn lookup(word: &str) -> Result<u32> {
//!     Err(HnswkitError::no_word(word))
//! }
//!
//! let err = lookup("water").unwrap_err();
//! assert_eq!(err.status(), StatusCode::NoWord);
//! ```

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for hnswkit operations.
#[derive(Error, Debug)]
pub enum HnswkitError {
    /// Invalid or missing argument, or an unsupported enum value.
    #[error("Invalid parameter: {0}")]
    Param(String),

    /// Input file missing or unreadable.
    #[error("Path error: {0}")]
    Path(String),

    /// The index has reached its configured capacity.
    #[error("Model size exceeded: {0}")]
    ModelSize(String),

    /// A word lookup found no node with that external index.
    #[error("Word not found: {0}")]
    NoWord(String),

    /// Operation invoked while the session is in the wrong mode.
    #[error("Mode error: {0}")]
    Mode(String),

    /// A persisted model failed validation (magic, checksum, truncation).
    #[error("Corrupt model: {0}")]
    Corrupt(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with HnswkitError.
pub type Result<T> = std::result::Result<T, HnswkitError>;

/// Status codes reported across the operation surface.
///
/// `Warning` never comes out of an error: it is the status of a training run
/// that finished without reaching its precision target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    Warning,
    Param,
    Path,
    ModelSize,
    NoWord,
    Mode,
    Internal,
}

impl StatusCode {
    /// Numeric code, zero for success.
    pub fn code(&self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Warning => 1,
            StatusCode::Param => -1,
            StatusCode::Path => -2,
            StatusCode::ModelSize => -3,
            StatusCode::NoWord => -4,
            StatusCode::Mode => -5,
            StatusCode::Internal => -99,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::Warning => "WARNING",
            StatusCode::Param => "PARAM",
            StatusCode::Path => "PATH",
            StatusCode::ModelSize => "MODEL_SIZE",
            StatusCode::NoWord => "NO_WORD",
            StatusCode::Mode => "MODE",
            StatusCode::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

impl HnswkitError {
    /// Create a new parameter error.
    pub fn param<S: Into<String>>(msg: S) -> Self {
        HnswkitError::Param(msg.into())
    }

    /// Create a new path error.
    pub fn path<S: Into<String>>(msg: S) -> Self {
        HnswkitError::Path(msg.into())
    }

    /// Create a new capacity error.
    pub fn model_size<S: Into<String>>(msg: S) -> Self {
        HnswkitError::ModelSize(msg.into())
    }

    /// Create a new missing-word error.
    pub fn no_word<S: Into<String>>(word: S) -> Self {
        HnswkitError::NoWord(word.into())
    }

    /// Create a new mode error.
    pub fn mode<S: Into<String>>(msg: S) -> Self {
        HnswkitError::Mode(msg.into())
    }

    /// Create a new corrupt-model error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        HnswkitError::Corrupt(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        HnswkitError::Other(msg.into())
    }

    /// The status code this error is reported as.
    pub fn status(&self) -> StatusCode {
        match self {
            HnswkitError::Param(_) | HnswkitError::Json(_) => StatusCode::Param,
            HnswkitError::Path(_) => StatusCode::Path,
            HnswkitError::ModelSize(_) => StatusCode::ModelSize,
            HnswkitError::NoWord(_) => StatusCode::NoWord,
            HnswkitError::Mode(_) => StatusCode::Mode,
            HnswkitError::Io(e) if e.kind() == io::ErrorKind::NotFound => StatusCode::Path,
            HnswkitError::Corrupt(_)
            | HnswkitError::Io(_)
            | HnswkitError::Anyhow(_)
            | HnswkitError::Other(_) => StatusCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = HnswkitError::param("dimension must be > 0");
        assert_eq!(error.to_string(), "Invalid parameter: dimension must be > 0");

        let error = HnswkitError::no_word("water");
        assert_eq!(error.to_string(), "Word not found: water");

        let error = HnswkitError::model_size("index is full");
        assert_eq!(error.status(), StatusCode::ModelSize);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = HnswkitError::from(io_error);

        match &error {
            HnswkitError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
        assert_eq!(error.status(), StatusCode::Path);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::Ok.code(), 0);
        assert!(StatusCode::Warning.code() > 0);
        assert_eq!(StatusCode::ModelSize.to_string(), "MODEL_SIZE");
        assert_eq!(HnswkitError::mode("train").status(), StatusCode::Mode);
    }
}
