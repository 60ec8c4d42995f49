//! A matrix whose payload moves between memory, the soft cache, and storage.

use crate::{
    adapter::{self, Backend},
    id,
    partition::{self, IndexRange, PartitionFormat},
    pool::Pool,
    soft::Key,
    status::Lock,
    Error, Status,
};
use std::{
    fmt,
    sync::{Arc, Mutex},
};
use tessera_blob::Storage;
use tessera_matrix::{Characteristics, Format, MatrixBlock, Metadata};
use tracing::{debug, warn};

/// Format of eviction files written to the distributed backend.
const SPILL_FORMAT: Format = Format::BinaryBlock;

struct Partition {
    format: PartitionFormat,
    /// Path of the block last read (held in the soft cache).
    cached: Option<String>,
}

#[derive(Default)]
struct State {
    lock: Lock,
    data: Option<Arc<MatrixBlock>>,
    dirty: bool,
    requires_local_write: bool,
    cleanup: bool,

    metadata: Option<Metadata>,
    source: Option<String>,
    source_exists: bool,

    id: Option<u64>,
    spill_path: Option<String>,
    /// Shape of the payload in the eviction file, if that file is current.
    spilled: Option<Characteristics>,

    partition: Option<Partition>,
}

impl State {
    fn id(&mut self) -> u64 {
        *self.id.get_or_insert_with(id::next)
    }

    fn spill_path<S: Storage>(&mut self, pool: &Pool<S>) -> String {
        if let Some(path) = &self.spill_path {
            return path.clone();
        }
        let path = pool.spill_path(self.id());
        self.spill_path = Some(path.clone());
        path
    }
}

/// A matrix managed by a [Pool].
///
/// The payload is only ever accessed between an acquire and a release:
///
/// - [MatrixObject::acquire_read] returns a shared handle. Any number of readers may hold the
///   payload at once.
/// - [MatrixObject::acquire_modify] hands the payload to a single writer, who returns it with
///   [MatrixObject::release_modify].
/// - [MatrixObject::acquire_modify_with] replaces the payload without loading the old one. The
///   writer ends its hold with [MatrixObject::release].
///
/// Acquires that conflict with an existing hold fail immediately with [Error::Status].
pub struct MatrixObject<S: Storage> {
    pool: Arc<Pool<S>>,
    name: String,
    state: Mutex<State>,
}

/// Where a restored payload came from.
#[derive(Debug)]
enum Origin {
    Soft,
    Spill,
    Source,
}

impl<S: Storage> MatrixObject<S> {
    /// Create an empty object.
    ///
    /// `source` is the location of an existing persisted copy (if any). `metadata` describes the
    /// matrix and is required to load from `source` or to export.
    pub fn new(
        pool: Arc<Pool<S>>,
        name: impl Into<String>,
        source: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Self {
        let state = State {
            cleanup: true,
            metadata,
            source: source.map(String::from),
            ..Default::default()
        };
        Self {
            pool,
            name: name.into(),
            state: Mutex::new(state),
        }
    }

    /// Create an object backed by the persisted matrix at `path`, described by its sidecar.
    pub fn open(pool: Arc<Pool<S>>, name: impl Into<String>, path: &str) -> Result<Self, Error> {
        let name = name.into();
        let metadata = pool
            .distributed()
            .read_metadata(path)
            .map_err(|source| Error::Io {
                name: name.clone(),
                operation: "read metadata",
                path: Metadata::sidecar(path),
                source,
            })?;
        debug!(name = %name, path, characteristics = %metadata.characteristics, "opened");
        let object = Self::new(pool, name, Some(path), Some(metadata));
        object.state.lock().unwrap().source_exists = true;
        Ok(object)
    }

    fn status_error(&self, operation: &'static str, status: Status) -> Error {
        Error::Status {
            name: self.name.clone(),
            operation,
            status,
        }
    }

    fn io_error<'a>(
        &'a self,
        operation: &'static str,
        path: &'a str,
    ) -> impl FnOnce(adapter::Error) -> Error + 'a {
        move |source| Error::Io {
            name: self.name.clone(),
            operation,
            path: path.into(),
            source,
        }
    }

    fn configuration(&self, reason: impl Into<String>) -> Error {
        Error::Configuration {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Acquire a shared hold on the payload, loading it if it is not resident.
    pub fn acquire_read(&self) -> Result<Arc<MatrixBlock>, Error> {
        let mut guard = self.state.lock().unwrap();
        self.read_locked(&mut guard, "acquire read")
    }

    /// Acquire an exclusive hold on the payload, loading it if it is not resident.
    ///
    /// The payload is handed to the caller and must be returned with
    /// [MatrixObject::release_modify].
    pub fn acquire_modify(&self) -> Result<MatrixBlock, Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if !state.lock.can_modify() {
            return Err(self.status_error("acquire modify", state.lock.status()));
        }
        let data = match state.data.take() {
            Some(data) => data,
            None => self.restore(state)?,
        };
        state
            .lock
            .acquire_modify()
            .map_err(|status| self.status_error("acquire modify", status))?;
        state.dirty = true;
        state.requires_local_write = false;
        state.spilled = None;
        debug!(name = %self.name, "acquired modify");
        Ok(Arc::unwrap_or_clone(data))
    }

    /// Acquire an exclusive hold, replacing the payload with `block`.
    ///
    /// The previous payload is discarded without being loaded (its soft cache entry and eviction
    /// file are removed).
    pub fn acquire_modify_with(&self, block: MatrixBlock) -> Result<(), Error> {
        if block.is_empty() {
            return Err(Error::Assignment(self.name.clone()));
        }
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if !state.lock.can_modify() {
            return Err(self.status_error("acquire modify", state.lock.status()));
        }
        self.discard(state);
        state
            .lock
            .acquire_modify()
            .map_err(|status| self.status_error("acquire modify", status))?;
        state.data = Some(Arc::new(block));
        state.dirty = true;
        debug!(name = %self.name, "assigned payload");
        Ok(())
    }

    /// Release a hold acquired with [MatrixObject::acquire_read] or
    /// [MatrixObject::acquire_modify_with].
    ///
    /// Once no hold remains, a payload with more cells than [crate::Config::caching_threshold] is
    /// evicted. Otherwise it stays resident.
    pub fn release(&self) -> Result<(), Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match state.lock.status() {
            Status::Read => {}
            Status::Modify => self.refresh_metadata(state)?,
            status => return Err(self.status_error("release", status)),
        }
        self.unlock(state, "release")
    }

    /// Return the payload handed out by [MatrixObject::acquire_modify] and release the hold.
    pub fn release_modify(&self, block: MatrixBlock) -> Result<(), Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let status = state.lock.status();
        if status != Status::Modify {
            return Err(self.status_error("release modify", status));
        }
        state.data = Some(Arc::new(block));
        self.refresh_metadata(state)?;
        self.unlock(state, "release modify")
    }

    /// Drop the payload, its soft cache entry, and its eviction file.
    ///
    /// Does nothing if cleanup is disabled. Fails if the payload is held.
    pub fn clear_data(&self) -> Result<(), Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if !state.cleanup {
            return Ok(());
        }
        if state.lock.is_locked() {
            return Err(self.status_error("clear", state.lock.status()));
        }
        self.discard(state);
        state.lock.set_empty();
        state.dirty = false;
        debug!(name = %self.name, "cleared");
        Ok(())
    }

    /// Write the matrix to `path` (in `format`, or the format of its metadata).
    ///
    /// Data is only serialized when it differs from (or must be converted from) the persisted
    /// source. An up-to-date source in the requested format is copied, and exporting an
    /// up-to-date source onto itself does nothing.
    pub fn export_data(&self, path: &str, format: Option<Format>) -> Result<(), Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let status = state.lock.status();
        if status == Status::Modify {
            return Err(self.status_error("export", status));
        }
        let Some(metadata) = state.metadata else {
            return Err(self.configuration("no metadata to export"));
        };
        let format = format.unwrap_or(metadata.format);
        let relocate = state.source.as_deref() != Some(path);

        if state.dirty || (relocate && format != metadata.format) {
            let data = self.read_locked(state, "export")?;
            let written = self.write_export(&data, path, metadata, format);
            drop(data);
            if let (Ok(exported), false) = (&written, relocate) {
                state.dirty = false;
                state.metadata = Some(*exported);
            }
            let released = self.unlock(state, "export");
            written?;
            released?;
        } else if relocate {
            let Some(source) = state.source.clone() else {
                return Err(self.configuration("no source to copy"));
            };
            let distributed = self.pool.distributed();
            let sidecar = Metadata::sidecar(path);
            distributed
                .remove_if_exists(path)
                .map_err(self.io_error("remove", path))?;
            distributed
                .remove_if_exists(&sidecar)
                .map_err(self.io_error("remove", &sidecar))?;
            distributed
                .write_metadata(path, &metadata)
                .map_err(self.io_error("write metadata", &sidecar))?;
            distributed
                .copy(&source, path)
                .map_err(self.io_error("copy", &source))?;
            self.pool.metrics.copies.inc();
            debug!(name = %self.name, %source, path, "copied");
        } else {
            self.pool.metrics.skipped_exports.inc();
            debug!(name = %self.name, path, "source current, skipping export");
        }

        if !relocate {
            state.source_exists = true;
        }
        Ok(())
    }

    /// Export the matrix to its source location.
    pub fn export(&self) -> Result<(), Error> {
        let source = self.source().ok_or_else(|| self.configuration("no source"))?;
        self.export_data(&source, None)
    }

    /// Serialize `data` and its sidecar at `path`, returning the persisted metadata.
    fn write_export(
        &self,
        data: &MatrixBlock,
        path: &str,
        metadata: Metadata,
        format: Format,
    ) -> Result<Metadata, Error> {
        let mc = metadata.characteristics;
        let block_size = self.pool.config().block_size;
        let (rows_per_block, cols_per_block) = if format == Format::BinaryBlock
            && (mc.rows_per_block != block_size || mc.cols_per_block != block_size)
        {
            (block_size, block_size)
        } else {
            (mc.rows_per_block, mc.cols_per_block)
        };
        let shape = Characteristics::of(data, rows_per_block, cols_per_block);
        let exported = Metadata {
            characteristics: shape,
            format,
            ..metadata
        };
        let distributed = self.pool.distributed();
        distributed
            .write_metadata(path, &exported)
            .map_err(self.io_error("write metadata", &Metadata::sidecar(path)))?;
        distributed
            .write(data, path, format, &shape)
            .map_err(self.io_error("export", path))?;
        self.pool.metrics.exports.inc();
        debug!(name = %self.name, path, %format, %shape, "exported");
        Ok(exported)
    }

    /// Take a shared hold, restoring the payload if needed.
    fn read_locked(
        &self,
        state: &mut State,
        operation: &'static str,
    ) -> Result<Arc<MatrixBlock>, Error> {
        if !state.lock.can_read() {
            return Err(self.status_error(operation, state.lock.status()));
        }
        let data = match &state.data {
            Some(data) => data.clone(),
            None => {
                let data = self.restore(state)?;
                state.data = Some(data.clone());
                data
            }
        };
        state
            .lock
            .acquire_read()
            .map_err(|status| self.status_error(operation, status))?;
        Ok(data)
    }

    /// Release one hold and evict the payload if no hold remains.
    fn unlock(&self, state: &mut State, operation: &'static str) -> Result<(), Error> {
        let released = state
            .lock
            .release()
            .map_err(|status| self.status_error(operation, status))?;
        if released {
            self.evict(state)?;
        }
        Ok(())
    }

    /// Make the metadata describe the payload held by the writer.
    fn refresh_metadata(&self, state: &mut State) -> Result<(), Error> {
        let Some(data) = &state.data else {
            return Err(self.configuration("no payload to release"));
        };
        let Some(metadata) = state.metadata.as_mut() else {
            return Err(self.configuration("no metadata to refresh"));
        };
        metadata.characteristics.refresh(data);
        state.dirty = true;
        Ok(())
    }

    fn evict(&self, state: &mut State) -> Result<(), Error> {
        let Some(data) = state.data.clone() else {
            return Ok(());
        };
        let cfg = self.pool.config();
        if data.cells() <= cfg.caching_threshold {
            return Ok(());
        }
        let id = state.id();
        if state.requires_local_write || (state.dirty && state.spilled.is_none()) {
            let path = state.spill_path(&*self.pool);
            let shape = Characteristics::of(&data, cfg.block_size, cfg.block_size);
            self.pool
                .spill()
                .write(&data, &path, SPILL_FORMAT, &shape)
                .map_err(self.io_error("spill", &path))?;
            self.pool.metrics.spills.inc();
            state.spilled = Some(shape);
            state.requires_local_write = false;
            debug!(name = %self.name, id, %path, "spilled");
        }
        self.pool.soft_insert(Key::Payload(id), data);
        state.data = None;
        state.lock.set_evicted();
        self.pool.metrics.evictions.inc();
        Ok(())
    }

    /// Materialize the payload from the soft cache, the eviction file, or the source.
    fn restore(&self, state: &mut State) -> Result<Arc<MatrixBlock>, Error> {
        let (data, origin) = self.restore_from(state)?;
        debug!(
            name = %self.name,
            ?origin,
            rows = data.rows(),
            cols = data.cols(),
            "restored"
        );
        Ok(data)
    }

    fn restore_from(&self, state: &mut State) -> Result<(Arc<MatrixBlock>, Origin), Error> {
        if let Some(id) = state.id {
            if let Some(data) = self.pool.soft_take(&Key::Payload(id)) {
                self.pool.metrics.soft_hits.inc();
                return Ok((data, Origin::Soft));
            }
            if state.lock.status() == Status::Evicted {
                self.pool.metrics.soft_misses.inc();
            }
        }

        if let Some(shape) = state.spilled {
            let path = state.spill_path(&*self.pool);
            let data = self
                .pool
                .spill()
                .read(&path, SPILL_FORMAT, &shape, shape.sparsity())
                .map_err(self.io_error("restore", &path))?;
            self.pool.metrics.restores.inc();
            return Ok((Arc::new(data), Origin::Spill));
        }

        let Some(source) = state.source.clone() else {
            return Err(self.configuration("no source to restore from"));
        };
        let Some(metadata) = state.metadata.as_mut() else {
            return Err(self.configuration("no metadata to read source"));
        };
        let mc = metadata.characteristics;
        let data = self
            .pool
            .distributed()
            .read(&source, metadata.format, &mc, mc.sparsity())
            .map_err(self.io_error("load", &source))?;
        metadata.characteristics.refresh(&data);
        state.dirty = false;
        state.requires_local_write = true;
        state.source_exists = true;
        self.pool.metrics.loads.inc();
        Ok((Arc::new(data), Origin::Source))
    }

    /// Forget the payload wherever it lives. Eviction file removal is best-effort.
    fn discard(&self, state: &mut State) {
        state.data = None;
        state.spilled = None;
        state.requires_local_write = false;
        if let Some(id) = state.id {
            self.pool.soft_remove(&Key::Payload(id));
        }
        let Some(path) = state.spill_path.as_deref() else {
            return;
        };
        let spill = self.pool.spill();
        match spill.exists(path) {
            Ok(false) => {}
            Ok(true) => {
                if let Err(err) = spill.remove(path) {
                    warn!(name = %self.name, path, ?err, "failed to remove eviction file");
                }
            }
            Err(err) => warn!(name = %self.name, path, ?err, "failed to probe eviction file"),
        }
    }

    /// Mark the object as pre-split into `format` partitions at its source location.
    pub fn set_partitioned(&self, format: PartitionFormat) {
        let mut state = self.state.lock().unwrap();
        if let Some(id) = state.id {
            self.pool.soft_remove(&Key::Partition(id));
        }
        state.partition = Some(Partition {
            format,
            cached: None,
        });
    }

    pub fn is_partitioned(&self) -> bool {
        self.state.lock().unwrap().partition.is_some()
    }

    pub fn partition_format(&self) -> Option<PartitionFormat> {
        self.state
            .lock()
            .unwrap()
            .partition
            .as_ref()
            .map(|p| p.format)
    }

    /// Read the row (or column) starting `range` from the pre-split partitions of the source.
    ///
    /// Partition `k` is stored at `<source>/<k>`. A missing partition is read as zeros. For
    /// block-wise formats the containing block is kept in the soft cache, so consecutive reads
    /// within one block only read storage once.
    pub fn read_partition(&self, range: IndexRange) -> Result<MatrixBlock, Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let Some(format) = state.partition.as_ref().map(|p| p.format) else {
            return Err(Error::NotPartitioned(self.name.clone()));
        };
        let Some(metadata) = state.metadata else {
            return Err(self.configuration("no metadata to read partition"));
        };
        let Some(source) = state.source.clone() else {
            return Err(self.configuration("no source to read partition"));
        };
        let mc = metadata.characteristics;
        let block = match format {
            PartitionFormat::RowBlockWise => mc.rows_per_block as u64,
            PartitionFormat::ColumnBlockWise => mc.cols_per_block as u64,
            PartitionFormat::RowWise | PartitionFormat::ColumnWise => 1,
        };
        if block == 0 {
            return Err(self.configuration("partition block size is zero"));
        }
        let invalid = if format.is_rowwise() {
            range.row_start == 0 || range.row_start > mc.rows
        } else {
            range.col_start == 0 || range.col_start > mc.cols
        };
        if invalid {
            return Err(Error::InvalidIndex {
                name: self.name.clone(),
                range,
            });
        }

        let key = partition::key(format, &range, block);
        let path = format!("{source}/{key}");
        if !format.is_blockwise() {
            return self.read_partition_file(&path, &metadata, format, key, block);
        }

        // Reuse the cached block if it holds the requested index
        let id = state.id();
        let cached = match state.partition.as_ref().and_then(|p| p.cached.as_deref()) {
            Some(cached) if cached == path => self.pool.soft_get(&Key::Partition(id)),
            _ => None,
        };
        let data = match cached {
            Some(data) => {
                self.pool.metrics.partition_hits.inc();
                data
            }
            None => {
                let data = self.read_partition_file(&path, &metadata, format, key, block)?;
                let data = Arc::new(data);
                self.pool.soft_insert(Key::Partition(id), data.clone());
                if let Some(partition) = state.partition.as_mut() {
                    partition.cached = Some(path);
                }
                data
            }
        };
        let at = partition::offset(format, &range, block);
        Ok(if format.is_rowwise() {
            data.slice_row(at)
        } else {
            data.slice_column(at)
        })
    }

    fn read_partition_file(
        &self,
        path: &str,
        metadata: &Metadata,
        format: PartitionFormat,
        key: u64,
        block: u64,
    ) -> Result<MatrixBlock, Error> {
        let mc = metadata.characteristics;
        let (rows, cols) = partition::shape(format, key, mc.rows, mc.cols, block);
        let distributed = self.pool.distributed();
        let exists = distributed
            .exists(path)
            .map_err(self.io_error("probe", path))?;
        if !exists {
            warn!(name = %self.name, path, "partition missing, reading as empty");
            let sparse = cols > 1;
            return Ok(MatrixBlock::new(rows as usize, cols as usize, sparse));
        }
        let shape = Characteristics::new(rows, cols, mc.rows_per_block, mc.cols_per_block);
        let data = distributed
            .read(path, metadata.format, &shape, mc.sparsity())
            .map_err(self.io_error("read partition", path))?;
        self.pool.metrics.partition_reads.inc();
        debug!(name = %self.name, path, rows, cols, "read partition");
        Ok(data)
    }

    /// Drop the cached partition block, whose location or shape no longer matches the metadata.
    fn forget_partition(&self, state: &mut State) {
        let Some(partition) = state.partition.as_mut() else {
            return;
        };
        if partition.cached.take().is_some() {
            if let Some(id) = state.id {
                self.pool.soft_remove(&Key::Partition(id));
            }
        }
    }

    /// Enable or disable [MatrixObject::clear_data].
    pub fn enable_cleanup(&self, enabled: bool) {
        self.state.lock().unwrap().cleanup = enabled;
    }

    pub fn is_cleanup_enabled(&self) -> bool {
        self.state.lock().unwrap().cleanup
    }

    pub fn status(&self) -> Status {
        self.state.lock().unwrap().lock.status()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().unwrap().dirty
    }

    pub fn metadata(&self) -> Option<Metadata> {
        self.state.lock().unwrap().metadata
    }

    /// Replace the metadata describing the matrix.
    pub fn set_metadata(&self, metadata: Metadata) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        self.forget_partition(state);
        state.metadata = Some(metadata);
    }

    pub fn characteristics(&self) -> Option<Characteristics> {
        self.metadata().map(|m| m.characteristics)
    }

    /// Replace the characteristics recorded in the metadata.
    pub fn update_characteristics(&self, characteristics: Characteristics) -> Result<(), Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let Some(metadata) = state.metadata.as_mut() else {
            return Err(self.configuration("no metadata to update"));
        };
        metadata.characteristics = characteristics;
        self.forget_partition(state);
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.characteristics().map_or(0, |mc| mc.rows)
    }

    pub fn cols(&self) -> u64 {
        self.characteristics().map_or(0, |mc| mc.cols)
    }

    pub fn non_zeros(&self) -> Option<u64> {
        self.characteristics().and_then(|mc| mc.non_zeros)
    }

    pub fn source(&self) -> Option<String> {
        self.state.lock().unwrap().source.clone()
    }

    /// Returns true if the source is known to hold a persisted copy.
    pub fn source_exists(&self) -> bool {
        self.state.lock().unwrap().source_exists
    }

    /// Point the object at a new source location.
    ///
    /// If the object holds data, the new location does not reflect it yet and the object becomes
    /// dirty. Pointing the object at its current source changes nothing.
    pub fn set_source(&self, path: &str) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if state.source.as_deref() == Some(path) {
            return;
        }
        self.forget_partition(state);
        if state.lock.status() != Status::Empty {
            state.dirty = true;
        }
        state.source = Some(path.into());
        state.source_exists = false;
    }

    /// Identifier used to name the eviction file (allocated on first eviction).
    pub fn unique_id(&self) -> Option<u64> {
        self.state.lock().unwrap().id
    }

    /// Location of the eviction file (once it has been derived).
    pub fn spill_path(&self) -> Option<String> {
        self.state.lock().unwrap().spill_path.clone()
    }

    pub fn debug_name(&self) -> &str {
        &self.name
    }
}

impl<S: Storage> fmt::Display for MatrixObject<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        write!(f, "Matrix: {}, ", state.source.as_deref().unwrap_or("(none)"))?;
        match &state.metadata {
            Some(metadata) => write!(
                f,
                "{}, {}, ",
                metadata.characteristics, metadata.format
            )?,
            None => write!(f, "unknown, unknown, ")?,
        }
        f.write_str(if state.dirty { "dirty" } else { "not-dirty" })
    }
}

impl<S: Storage> Drop for MatrixObject<S> {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(id) = state.id {
            self.pool.soft_remove(&Key::Payload(id));
            self.pool.soft_remove(&Key::Partition(id));
        }
    }
}
