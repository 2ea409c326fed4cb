//! Error and warning types for KS2 decoding
//!
//! Fatal conditions abort the decode and no partial document is returned.
//! Recoverable conditions are collected as [`DecodeWarning`]s on the
//! resulting document and logged through `tracing`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::record::Tag;

/// Fatal decode errors
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Fixed ASCII header missing lines or carrying non-numeric fields
    #[error("Malformed fixed header: {0}")]
    MalformedHeader(String),

    /// Input stream cannot seek
    #[error("Unsupported stream: {0}")]
    UnsupportedStream(String),

    /// Element-type code outside the known table on a typed record
    #[error("Unknown element type code {code} in record {tag}")]
    UnknownElementType { tag: Tag, code: i32 },

    /// Record declares more payload than the stream holds
    #[error(
        "Truncated record {tag} at delta {delta}: declared {declared} bytes, {available} available"
    )]
    TruncatedRecord {
        tag: Tag,
        delta: u64,
        declared: u64,
        available: u64,
    },

    /// Length field smaller than its own fixed adjustment
    #[error("Invalid length field {value} in record {tag} at delta {delta}")]
    InvalidLength { tag: Tag, delta: u64, value: u64 },

    /// Per-channel record too short for `channel_count` entries
    #[error("Record {tag} holds {actual} bytes, {expected} needed for all channels")]
    FieldTooShort { tag: Tag, expected: u64, actual: u64 },

    /// Sample matrix of the declared shape cannot be addressed or allocated
    #[error("Record {tag}: sample matrix of {samples} x {channels} cannot be allocated")]
    MatrixTooLarge {
        tag: Tag,
        samples: u64,
        channels: usize,
    },

    /// Only the first acquisition block can be decoded
    #[error("Block {0} not supported (only block 1 is decoded)")]
    UnsupportedBlock(u32),

    /// I/O error while reading
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Create a malformed header error
    pub fn malformed_header(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }
}

/// Result type alias using DecodeError
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Non-fatal conditions found while decoding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// Bulk payload size disagrees with the recorded per-channel sample count
    SampleCountMismatch { declared: f64, recorded: u64 },
    /// Record under a parent tag the dispatch table does not know
    UnrecognizedRecord { parent: u8, child: u8, delta: u64 },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::SampleCountMismatch { declared, recorded } => write!(
                f,
                "sample count mismatch: payload holds {declared:.3} samples, header records {recorded}"
            ),
            DecodeWarning::UnrecognizedRecord {
                parent,
                child,
                delta,
            } => write!(f, "unrecognized record ({parent}, {child}) at delta {delta}"),
        }
    }
}
