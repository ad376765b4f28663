//! Error types for tabulon table recovery.
//!
//! A detector that finds no table returns `Ok(None)` or an empty list; the
//! variants here are reserved for caller misuse and I/O failures.

use thiserror::Error;

/// Primary error type for table recovery operations.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("bordered detection requires a pixel buffer for page {page}")]
    MissingPixels { page: usize },

    #[error("no spans supplied to the {detector} detector")]
    NoSpans { detector: &'static str },

    #[error("pixel buffer is {got} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("page dimensions must be non-zero, got {width}x{height}")]
    EmptyPage { width: u32, height: u32 },

    #[error("invalid parameter {name}: {msg}")]
    InvalidParams { name: &'static str, msg: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type alias for TableError.
pub type Result<T> = std::result::Result<T, TableError>;
