//! Keep large matrices available in memory while spilling them to local or distributed storage.
//!
//! A [MatrixObject] is a handle to one matrix. Callers never touch storage directly: they
//! [MatrixObject::acquire_read] (or [MatrixObject::acquire_modify]) the payload, use it, and
//! [MatrixObject::release] it. Behind that contract each object runs a fail-fast state machine
//! ([Status]) and, once a large payload is released, evicts it:
//!
//! 1. If the payload changed since it was last persisted (or was just loaded from its source), it
//!    is written to an eviction file whose location is derived from a process-wide unique
//!    identifier ([id::next]).
//! 2. The payload is handed to the soft cache, a size-bounded LRU shared by every object in a
//!    [Pool]. Entries may disappear at any time.
//! 3. The object drops its own reference.
//!
//! When the payload is needed again, it is restored from the soft cache if still present,
//! otherwise from the eviction file, otherwise from the object's source location.
//!
//! [MatrixObject::export_data] synchronizes an object with the distributed store (writing data and
//! a `.mtd` sidecar, copying an existing file, or doing nothing when the source is current), and
//! [MatrixObject::read_partition] serves read-only sub-blocks of matrices that were pre-split into
//! [PartitionFormat]s.
//!
//! # Concurrency
//!
//! Every object is guarded by its own mutex. No operation ever waits for another holder to
//! finish: an illegal transition (for example, acquiring a payload for modification while it is
//! being read) immediately returns [Error::Status]. The only blocking performed while holding an
//! object's mutex is storage I/O.
//!
//! # Example
//!
//! ```rust
//! use prometheus_client::registry::Registry;
//! use tessera_blob::memory::Storage;
//! use tessera_cache::{Config, MatrixObject, Pool, Status};
//! use tessera_matrix::{Characteristics, Format, MatrixBlock, Metadata};
//!
//! let mut registry = Registry::default();
//! let cfg = Config {
//!     caching_threshold: 10,
//!     ..Default::default()
//! };
//! let pool = Pool::new(Storage::default(), Storage::default(), cfg, &mut registry);
//!
//! // Compute an intermediate result
//! let metadata = Metadata::new(Characteristics::new(4, 4, 1000, 1000), Format::BinaryBlock);
//! let object = MatrixObject::new(pool.clone(), "x", None, Some(metadata));
//! let mut block = MatrixBlock::new(4, 4, false);
//! block.set(1, 2, 3.0);
//! object.acquire_modify_with(block).unwrap();
//! object.release().unwrap();
//! assert_eq!(object.status(), Status::Evicted);
//!
//! // Read it back (restored from the soft cache)
//! let block = object.acquire_read().unwrap();
//! assert_eq!(block.get(1, 2), 3.0);
//! object.release().unwrap();
//!
//! // Persist it
//! object.export_data("out/x", None).unwrap();
//! ```

use thiserror::Error;

pub mod adapter;
pub use adapter::Kind;
mod config;
pub use config::{Config, EvictionConfig};
pub mod id;
mod object;
pub use object::MatrixObject;
mod partition;
pub use partition::{IndexRange, PartitionFormat};
mod pool;
pub use pool::Pool;
mod soft;
mod status;
pub use status::Status;

/// Errors that can occur when interacting with a [MatrixObject].
#[derive(Debug, Error)]
pub enum Error {
    #[error("{name}: cannot {operation} while {status}")]
    Status {
        name: String,
        operation: &'static str,
        status: Status,
    },
    #[error("{name}: failed to {operation} {path}: {source}")]
    Io {
        name: String,
        operation: &'static str,
        path: String,
        #[source]
        source: adapter::Error,
    },
    #[error("{0}: cannot assign an empty matrix")]
    Assignment(String),
    #[error("{name}: {reason}")]
    Configuration { name: String, reason: String },
    #[error("{0}: not partitioned")]
    NotPartitioned(String),
    #[error("{name}: invalid partition index {range:?}")]
    InvalidIndex { name: String, range: IndexRange },
}
