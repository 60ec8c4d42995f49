use crate::{validate_path, Error};
use bytes::Bytes;
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{Arc, Mutex},
};

/// In-memory object store.
#[derive(Clone, Default)]
pub struct Storage {
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
}

impl Storage {
    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl crate::Storage for Storage {
    fn exists(&self, path: &str) -> Result<bool, Error> {
        validate_path(path)?;
        Ok(self.objects.lock().unwrap().contains_key(path))
    }

    fn read(&self, path: &str) -> Result<Bytes, Error> {
        validate_path(path)?;
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.into()))
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), Error> {
        validate_path(path)?;
        self.objects.lock().unwrap().insert(path.into(), data);
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), Error> {
        validate_path(path)?;
        self.objects
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(path.into()))
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), Error> {
        validate_path(from)?;
        validate_path(to)?;
        let mut objects = self.objects.lock().unwrap();
        let data = objects
            .get(from)
            .cloned()
            .ok_or_else(|| Error::NotFound(from.into()))?;
        objects.insert(to.into(), data);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }
}
