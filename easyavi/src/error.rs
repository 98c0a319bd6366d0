//! Error types for AVI writing and reading

use std::io;
use thiserror::Error;

/// Result type for AVI operations
pub type Result<T> = std::result::Result<T, AviError>;

/// Errors that can occur during AVI operations
#[derive(Error, Debug)]
pub enum AviError {
    /// Frame size does not match the size declared at open
    #[error("Invalid dimensions: expected {expected_width}x{expected_height}, got {width}x{height}")]
    InvalidDimensions {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// Invalid parameter provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error during open/read/seek/write
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Operation not allowed in the current writer state
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Invalid RIFF header
    #[error("Invalid RIFF header")]
    InvalidRiff,

    /// Invalid AVI signature
    #[error("Invalid AVI signature")]
    InvalidAvi,

    /// Invalid chunk structure
    #[error("Invalid chunk '{}': {}", String::from_utf8_lossy(.id), .message)]
    InvalidChunk { id: [u8; 4], message: String },

    /// Missing required chunk
    #[error("Missing required chunk: {0}")]
    MissingChunk(&'static str),

    /// Insufficient data for operation
    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Malformed run-length data
    #[error("Invalid RLE data at offset {offset}: {message}")]
    InvalidRle { offset: usize, message: String },
}
