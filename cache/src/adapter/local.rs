use super::{Backend, Error};
use bytes::{BufMut, Bytes, BytesMut};
use tessera_blob::Storage;
use tessera_matrix::{native, Characteristics, Format, MatrixBlock};

const RAW: u8 = 0;
const ZSTD: u8 = 1;

/// Stores blocks in their native layout, prefixed by a compression tag.
#[derive(Clone)]
pub struct Local<S: Storage> {
    storage: S,
    compression: Option<u8>,
}

impl<S: Storage> Local<S> {
    pub fn new(storage: S, compression: Option<u8>) -> Self {
        Self {
            storage,
            compression,
        }
    }
}

impl<S: Storage> Backend for Local<S> {
    fn exists(&self, path: &str) -> Result<bool, Error> {
        Ok(self.storage.exists(path)?)
    }

    fn read(
        &self,
        path: &str,
        _format: Format,
        shape: &Characteristics,
        _sparsity: f64,
    ) -> Result<MatrixBlock, Error> {
        let raw = self.storage.read(path)?;
        let Some((&tag, body)) = raw.split_first() else {
            return Err(tessera_matrix::Error::Malformed("empty eviction file".into()).into());
        };
        let block = match tag {
            RAW => native::decode(body)?,
            ZSTD => {
                let body = zstd::decode_all(body).map_err(Error::Compression)?;
                native::decode(&body)?
            }
            other => {
                return Err(
                    tessera_matrix::Error::Malformed(format!("unknown compression: {other}")).into(),
                )
            }
        };
        if block.rows() as u64 != shape.rows || block.cols() as u64 != shape.cols {
            return Err(tessera_matrix::Error::InvalidDimensions {
                expected_rows: shape.rows,
                expected_cols: shape.cols,
                rows: block.rows() as u64,
                cols: block.cols() as u64,
            }
            .into());
        }
        Ok(block)
    }

    fn write(
        &self,
        block: &MatrixBlock,
        path: &str,
        _format: Format,
        _shape: &Characteristics,
    ) -> Result<(), Error> {
        let encoded = native::encode(block);
        let data: Bytes = match self.compression {
            Some(level) => {
                let compressed =
                    zstd::encode_all(encoded.as_ref(), level as i32).map_err(Error::Compression)?;
                let mut buf = BytesMut::with_capacity(1 + compressed.len());
                buf.put_u8(ZSTD);
                buf.put_slice(&compressed);
                buf.freeze()
            }
            None => {
                let mut buf = BytesMut::with_capacity(1 + encoded.len());
                buf.put_u8(RAW);
                buf.put_slice(&encoded);
                buf.freeze()
            }
        };
        self.storage.write(path, data)?;
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

    fn sample() -> MatrixBlock {
        let mut block = MatrixBlock::new(40, 30, true);
        for i in 0..30 {
            block.set(i, i, i as f64 + 0.5);
        }
        block
    }

    #[test_case(None; "raw")]
    #[test_case(Some(3); "zstd")]
    fn test_local_write_read(compression: Option<u8>) {
        let storage = MemoryStorage::default();
        let local = Local::new(storage.clone(), compression);
        let block = sample();
        let shape = Characteristics::of(&block, 1000, 1000);
        local
            .write(&block, "cache/x.dat", Format::TextCell, &shape)
            .unwrap();
        assert!(local.exists("cache/x.dat").unwrap());
        let restored = local
            .read("cache/x.dat", Format::BinaryBlock, &shape, 0.1)
            .unwrap();
        assert_eq!(restored, block);
        assert!(restored.is_sparse());

        let raw = storage.read("cache/x.dat").unwrap();
        match compression {
            Some(_) => assert!(raw.len() < native::encode_size(&block)),
            None => assert_eq!(raw.len(), 1 + native::encode_size(&block)),
        }
    }

    #[test]
    fn test_local_rejects_unexpected_shape() {
        let local = Local::new(MemoryStorage::default(), None);
        let block = sample();
        let shape = Characteristics::of(&block, 1000, 1000);
        local.write(&block, "x", Format::TextCell, &shape).unwrap();
        let wrong = Characteristics::new(30, 40, 1000, 1000);
        assert!(matches!(
            local.read("x", Format::TextCell, &wrong, 1.0),
            Err(Error::Matrix(tessera_matrix::Error::InvalidDimensions { .. }))
        ));
    }

    #[test]
    fn test_local_rejects_corruption() {
        let storage = MemoryStorage::default();
        let local = Local::new(storage.clone(), None);
        let shape = Characteristics::new(1, 1, 1, 1);
        storage.write("empty", Bytes::new()).unwrap();
        assert!(matches!(
            local.read("empty", Format::TextCell, &shape, 1.0),
            Err(Error::Matrix(tessera_matrix::Error::Malformed(_)))
        ));
        storage.write("bad", Bytes::from_static(&[7, 0, 0])).unwrap();
        assert!(matches!(
            local.read("bad", Format::TextCell, &shape, 1.0),
            Err(Error::Matrix(tessera_matrix::Error::Malformed(_)))
        ));
        assert!(matches!(
            local.read("missing", Format::TextCell, &shape, 1.0),
            Err(Error::Storage(tessera_blob::Error::NotFound(_)))
        ));
    }
}
