use super::{Backend, Error};
use bytes::Bytes;
use tessera_blob::Storage;
use tessera_matrix::{format, Characteristics, Format, MatrixBlock, Metadata};
use tracing::trace;

/// Stores blocks in a shareable [Format] next to a `.mtd` sidecar.
#[derive(Clone)]
pub struct Distributed<S: Storage> {
    storage: S,
}

impl<S: Storage> Distributed<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Copy the raw bytes stored at `from` to `to`.
    pub fn copy(&self, from: &str, to: &str) -> Result<(), Error> {
        Ok(self.storage.copy(from, to)?)
    }

    /// Remove `path` if it exists. Returns true if something was removed.
    pub fn remove_if_exists(&self, path: &str) -> Result<bool, Error> {
        if !self.storage.exists(path)? {
            return Ok(false);
        }
        self.storage.remove(path)?;
        Ok(true)
    }

    /// Write the sidecar describing the data stored at `path`.
    pub fn write_metadata(&self, path: &str, metadata: &Metadata) -> Result<(), Error> {
        let document = metadata.to_json()?;
        self.storage
            .write(&Metadata::sidecar(path), Bytes::from(document))?;
        Ok(())
    }

    /// Read the sidecar describing the data stored at `path`.
    pub fn read_metadata(&self, path: &str) -> Result<Metadata, Error> {
        let document = self.storage.read(&Metadata::sidecar(path))?;
        Ok(Metadata::from_json(&document)?)
    }
}

impl<S: Storage> Backend for Distributed<S> {
    fn exists(&self, path: &str) -> Result<bool, Error> {
        Ok(self.storage.exists(path)?)
    }

    fn read(
        &self,
        path: &str,
        format: Format,
        shape: &Characteristics,
        sparsity: f64,
    ) -> Result<MatrixBlock, Error> {
        let raw = self.storage.read(path)?;
        trace!(path, %format, bytes = raw.len(), "read");
        Ok(format::decode(raw, format, shape, sparsity)?)
    }

    fn write(
        &self,
        block: &MatrixBlock,
        path: &str,
        format: Format,
        shape: &Characteristics,
    ) -> Result<(), Error> {
        let encoded = format::encode(block, format, shape)?;
        trace!(path, %format, bytes = encoded.len(), "write");
        self.storage.write(path, encoded)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), Error> {
        Ok(self.storage.remove(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_blob::memory::Storage as MemoryStorage;
    use test_case::test_case;

    #[test_case(Format::TextCell)]
    #[test_case(Format::MatrixMarket)]
    #[test_case(Format::BinaryCell)]
    #[test_case(Format::BinaryBlock)]
    fn test_distributed_write_read(format: Format) {
        let distributed = Distributed::new(MemoryStorage::default());
        let mut block = MatrixBlock::new(12, 7, false);
        block.set(0, 0, 1.0);
        block.set(11, 6, 2.0);
        block.set(5, 3, -3.25);
        let shape = Characteristics::of(&block, 5, 5);
        distributed.write(&block, "out/m", format, &shape).unwrap();
        let restored = distributed
            .read("out/m", format, &shape, shape.sparsity())
            .unwrap();
        assert_eq!(restored, block);
        assert!(restored.is_sparse());
    }

    #[test]
    fn test_metadata_and_copy() {
        let storage = MemoryStorage::default();
        let distributed = Distributed::new(storage.clone());
        let metadata = Metadata::new(Characteristics::new(2, 2, 1, 1), Format::TextCell);
        distributed.write_metadata("out/m", &metadata).unwrap();
        assert!(storage.exists("out/m.mtd").unwrap());
        assert_eq!(distributed.read_metadata("out/m").unwrap(), metadata);

        storage.write("out/m", Bytes::from_static(b"1 1 1\n")).unwrap();
        distributed.copy("out/m", "out/n").unwrap();
        assert_eq!(storage.read("out/n").unwrap(), &b"1 1 1\n"[..]);

        assert!(distributed.remove_if_exists("out/n").unwrap());
        assert!(!distributed.remove_if_exists("out/n").unwrap());
    }
}
