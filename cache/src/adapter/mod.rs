//! Move [MatrixBlock]s between memory and storage.
//!
//! A [Backend] reads and writes whole blocks at a path. Two backends exist:
//!
//! - [Local] stores blocks in the native in-memory layout (optionally zstd-compressed). It is only
//!   ever used for eviction files, which are never read by anything but the pool that wrote them.
//! - [Distributed] stores blocks in a [Format] that other programs can read, and additionally knows
//!   how to copy data and maintain `.mtd` sidecars.
//!
//! Which backend receives eviction files is decided once, when the pool is built, by
//! [crate::EvictionConfig::backend]. The choice is captured by [Spill].

use tessera_blob::Storage;
use tessera_matrix::{Characteristics, Format, MatrixBlock};
use thiserror::Error;

mod distributed;
pub use distributed::Distributed;
mod local;
pub use local::Local;

/// Errors that can occur when moving a block through a [Backend].
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] tessera_blob::Error),
    #[error("matrix error: {0}")]
    Matrix(#[from] tessera_matrix::Error),
    #[error("compression error: {0}")]
    Compression(std::io::Error),
}

/// Kind of storage backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Kind {
    #[default]
    Local,
    Distributed,
}

/// Read, write, and remove whole blocks.
pub trait Backend: Send + Sync {
    /// Returns true if a block is stored at `path`.
    fn exists(&self, path: &str) -> Result<bool, Error>;

    /// Read the block stored at `path`.
    ///
    /// `shape` provides the expected dimensions (and blocking) and `sparsity` the expected
    /// fraction of non-zero cells, used to pick the in-memory representation.
    fn read(
        &self,
        path: &str,
        format: Format,
        shape: &Characteristics,
        sparsity: f64,
    ) -> Result<MatrixBlock, Error>;

    /// Write `block` to `path`, replacing anything stored there.
    fn write(
        &self,
        block: &MatrixBlock,
        path: &str,
        format: Format,
        shape: &Characteristics,
    ) -> Result<(), Error>;

    /// Remove the block stored at `path`.
    fn remove(&self, path: &str) -> Result<(), Error>;
}

/// The [Backend] selected for eviction files.
pub enum Spill<S: Storage> {
    Local(Local<S>),
    Distributed(Distributed<S>),
}

impl<S: Storage> Spill<S> {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Local(_) => Kind::Local,
            Self::Distributed(_) => Kind::Distributed,
        }
    }

    fn backend(&self) -> &dyn Backend {
        match self {
            Self::Local(local) => local,
            Self::Distributed(distributed) => distributed,
        }
    }
}

impl<S: Storage> Backend for Spill<S> {
    fn exists(&self, path: &str) -> Result<bool, Error> {
        self.backend().exists(path)
    }

    fn read(
        &self,
        path: &str,
        format: Format,
        shape: &Characteristics,
        sparsity: f64,
    ) -> Result<MatrixBlock, Error> {
        self.backend().read(path, format, shape, sparsity)
    }

    fn write(
        &self,
        block: &MatrixBlock,
        path: &str,
        format: Format,
        shape: &Characteristics,
    ) -> Result<(), Error> {
        self.backend().write(block, path, format, shape)
    }

    fn remove(&self, path: &str) -> Result<(), Error> {
        self.backend().remove(path)
    }
}
