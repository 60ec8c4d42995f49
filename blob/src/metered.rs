use crate::Error;
use bytes::Bytes;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;
use std::sync::Arc;

pub struct Metrics {
    pub storage_reads: Counter,
    pub storage_read_bytes: Counter,
    pub storage_writes: Counter,
    pub storage_write_bytes: Counter,
    pub storage_removes: Counter,
    pub storage_copies: Counter,
}

impl Metrics {
    /// Initialize the `Metrics` struct and register the metrics in the provided registry.
    fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            storage_reads: Counter::default(),
            storage_read_bytes: Counter::default(),
            storage_writes: Counter::default(),
            storage_write_bytes: Counter::default(),
            storage_removes: Counter::default(),
            storage_copies: Counter::default(),
        };

        registry.register(
            "storage_reads",
            "Total number of objects read",
            metrics.storage_reads.clone(),
        );
        registry.register(
            "storage_read_bytes",
            "Total amount of data read",
            metrics.storage_read_bytes.clone(),
        );
        registry.register(
            "storage_writes",
            "Total number of objects written",
            metrics.storage_writes.clone(),
        );
        registry.register(
            "storage_write_bytes",
            "Total amount of data written",
            metrics.storage_write_bytes.clone(),
        );
        registry.register(
            "storage_removes",
            "Total number of objects removed",
            metrics.storage_removes.clone(),
        );
        registry.register(
            "storage_copies",
            "Total number of objects copied",
            metrics.storage_copies.clone(),
        );

        metrics
    }
}

/// A wrapper around a [crate::Storage] implementation that tracks metrics.
#[derive(Clone)]
pub struct Storage<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

impl<S> Storage<S> {
    pub fn new(inner: S, registry: &mut Registry) -> Self {
        Self {
            inner,
            metrics: Metrics::new(registry).into(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: crate::Storage> crate::Storage for Storage<S> {
    fn exists(&self, path: &str) -> Result<bool, Error> {
        self.inner.exists(path)
    }

    fn read(&self, path: &str) -> Result<Bytes, Error> {
        let data = self.inner.read(path)?;
        self.metrics.storage_reads.inc();
        self.metrics.storage_read_bytes.inc_by(data.len() as u64);
        Ok(data)
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), Error> {
        let len = data.len() as u64;
        self.inner.write(path, data)?;
        self.metrics.storage_writes.inc();
        self.metrics.storage_write_bytes.inc_by(len);
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), Error> {
        self.inner.remove(path)?;
        self.metrics.storage_removes.inc();
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), Error> {
        self.inner.copy(from, to)?;
        self.metrics.storage_copies.inc();
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>, Error> {
        self.inner.scan(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::Storage as MemoryStorage, tests::run_storage_tests, Storage as _};
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_metered_storage() {
        let mut registry = Registry::default();
        let storage = Storage::new(MemoryStorage::default(), &mut registry);
        run_storage_tests(storage);
    }

    #[test]
    fn test_metered_storage_metrics() {
        let mut registry = Registry::default();
        let storage = Storage::new(MemoryStorage::default(), &mut registry);

        // Write an object
        storage
            .write("m.bin", Bytes::from_static(b"hello world"))
            .unwrap();
        assert_eq!(storage.metrics().storage_writes.get(), 1);
        assert_eq!(storage.metrics().storage_write_bytes.get(), 11);

        // Read it back
        storage.read("m.bin").unwrap();
        assert_eq!(storage.metrics().storage_reads.get(), 1);
        assert_eq!(storage.metrics().storage_read_bytes.get(), 11);

        // Failed operations are not counted
        assert!(storage.read("missing").is_err());
        assert!(storage.remove("missing").is_err());
        assert_eq!(storage.metrics().storage_reads.get(), 1);
        assert_eq!(storage.metrics().storage_removes.get(), 0);

        // Copy and remove
        storage.copy("m.bin", "n.bin").unwrap();
        storage.remove("m.bin").unwrap();
        assert!(storage.inner().exists("n.bin").unwrap());

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("storage_copies_total 1"));
        assert!(buffer.contains("storage_removes_total 1"));
        assert!(buffer.contains("storage_write_bytes_total 11"));
    }
}
