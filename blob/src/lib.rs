//! Read and write whole objects in a local or remote store.
//!
//! [Storage] addresses objects by a `/`-separated relative path (for example `out/m.bin` or
//! `out/m.bin/3`). Objects are always read and written in full: a write replaces whatever was
//! previously stored at the path.
//!
//! # Implementations
//!
//! - [memory::Storage] keeps every object in process memory. It is the store used by tests and by
//!   deployments that only need scratch space.
//! - [fs::Storage] maps paths onto a directory tree rooted at a configured directory.
//! - [metered::Storage] wraps any other [Storage] and counts reads, writes, removes, and copies in
//!   a [prometheus_client::registry::Registry].
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use tessera_blob::{memory, Storage};
//!
//! let storage = memory::Storage::default();
//! storage.write("out/m.bin", Bytes::from_static(b"hello")).unwrap();
//! assert!(storage.exists("out/m.bin").unwrap());
//! assert_eq!(storage.read("out/m.bin").unwrap(), Bytes::from_static(b"hello"));
//! storage.copy("out/m.bin", "out/n.bin").unwrap();
//! assert_eq!(storage.scan("out/").unwrap(), vec!["out/m.bin", "out/n.bin"]);
//! ```

use bytes::Bytes;
use thiserror::Error;

pub mod fs;
pub mod memory;
pub mod metered;

/// Errors that can occur when interacting with [Storage].
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid path, must be a non-empty relative path without '.' or '..' components: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interface to a store of whole objects addressed by path.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Returns true if an object is stored at `path`.
    fn exists(&self, path: &str) -> Result<bool, Error>;

    /// Read the object stored at `path`.
    fn read(&self, path: &str) -> Result<Bytes, Error>;

    /// Store `data` at `path`, replacing any existing object.
    fn write(&self, path: &str, data: Bytes) -> Result<(), Error>;

    /// Remove the object stored at `path`.
    ///
    /// Returns [Error::NotFound] if there is no such object.
    fn remove(&self, path: &str) -> Result<(), Error>;

    /// Copy the object stored at `from` to `to`, replacing any existing object at `to`.
    fn copy(&self, from: &str, to: &str) -> Result<(), Error>;

    /// Return the paths of all objects starting with `prefix`, in lexicographic order.
    fn scan(&self, prefix: &str) -> Result<Vec<String>, Error>;
}

/// Check that `path` is a non-empty relative path made of normal components.
pub fn validate_path(path: &str) -> Result<(), Error> {
    let valid = !path.is_empty()
        && !path.starts_with('/')
        && path
            .split('/')
            .all(|component| !component.is_empty() && component != "." && component != "..");
    if !valid {
        return Err(Error::InvalidPath(path.into()));
    }
    Ok(())
}
