//! Represent matrix blocks and serialize them in common on-disk formats.
//!
//! A [MatrixBlock] is the unit of data moved between memory and storage. It is either dense
//! (row-major `f64` values) or sparse (one ordered map of columns per row) and tracks its own
//! non-zero count so that callers can reason about sparsity without scanning the values.
//!
//! Blocks leave memory in one of two ways:
//!
//! - The [native] encoding mirrors the in-memory layout exactly and is protected by a CRC32
//!   checksum. It is used for short-lived eviction files.
//! - A [Format] (text cell, matrix market, binary cell, binary block) is used for data that other
//!   programs are expected to read. Persisted matrices carry a [Metadata] sidecar describing their
//!   dimensions, blocking and format.
//!
//! # Example
//!
//! ```rust
//! use tessera_matrix::{format, Characteristics, Format, MatrixBlock};
//!
//! let mut block = MatrixBlock::new(2, 3, false);
//! block.set(0, 1, 4.0);
//! block.set(1, 2, -1.5);
//!
//! let shape = Characteristics::new(2, 3, 1000, 1000);
//! let encoded = format::encode(&block, Format::TextCell, &shape).unwrap();
//! let decoded = format::decode(encoded, Format::TextCell, &shape, 1.0).unwrap();
//! assert_eq!(block, decoded);
//! ```

mod block;
mod characteristics;
pub mod format;
mod metadata;
pub mod native;

pub use block::{MatrixBlock, SPARSITY_TURN_POINT};
pub use characteristics::{Characteristics, DEFAULT_BLOCK_SIZE};
pub use format::Format;
pub use metadata::{Metadata, ValueType};
use thiserror::Error;

/// Errors that can occur when building, encoding, or decoding a [MatrixBlock].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid dimensions: expected {expected_rows}x{expected_cols}, found {rows}x{cols}")]
    InvalidDimensions {
        expected_rows: u64,
        expected_cols: u64,
        rows: u64,
        cols: u64,
    },
    #[error("cell ({row}, {col}) outside of {rows}x{cols} matrix")]
    OutOfBounds {
        row: u64,
        col: u64,
        rows: u64,
        cols: u64,
    },
    #[error("invalid block size: {0}x{1}")]
    InvalidBlockSize(u32, u32),
    #[error("malformed data: {0}")]
    Malformed(String),
    #[error("checksum mismatch: stored={stored}, computed={computed}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("unknown format: {0}")]
    UnknownFormat(String),
    #[error("invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}
