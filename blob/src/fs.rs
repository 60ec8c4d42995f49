use crate::{validate_path, Error};
use bytes::Bytes;
use std::{fs, io, path::PathBuf};
use tracing::debug;

/// Configuration for [Storage].
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory under which every object is stored.
    pub storage_directory: PathBuf,
}

impl Config {
    pub fn new(storage_directory: PathBuf) -> Self {
        Self { storage_directory }
    }
}

/// Object store backed by a directory tree.
///
/// The path `a/b/c` is stored in the file `<storage_directory>/a/b/c`. Parent directories are
/// created on demand.
#[derive(Clone)]
pub struct Storage {
    cfg: Config,
}

impl Storage {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
        validate_path(path)?;
        Ok(self.cfg.storage_directory.join(path))
    }

    fn prepare(&self, path: &str) -> Result<PathBuf, Error> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(full)
    }

    fn walk(&self, dir: PathBuf, relative: String, paths: &mut Vec<String>) -> Result<(), Error> {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                debug!(?dir, "skipping non utf-8 entry");
                continue;
            };
            let path = if relative.is_empty() {
                name
            } else {
                format!("{relative}/{name}")
            };
            if entry.file_type()?.is_dir() {
                self.walk(entry.path(), path, paths)?;
            } else {
                paths.push(path);
            }
        }
        Ok(())
    }
}

fn not_found(path: &str) -> impl FnOnce(io::Error) -> Error + '_ {
    move |err| match err.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.into()),
        _ => Error::Io(err),
    }
}

impl crate::Storage for Storage {
    fn exists(&self, path: &str) -> Result<bool, Error> {
        let full = self.resolve(path)?;
        Ok(full.is_file())
    }

    fn read(&self, path: &str) -> Result<Bytes, Error> {
        let full = self.resolve(path)?;
        let data = fs::read(full).map_err(not_found(path))?;
        Ok(data.into())
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), Error> {
        let full = self.prepare(path)?;
        fs::write(full, &data)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), Error> {
        let full = self.resolve(path)?;
        fs::remove_file(full).map_err(not_found(path))
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), Error> {
        let source = self.resolve(from)?;
        if !source.is_file() {
            return Err(Error::NotFound(from.into()));
        }
        let target = self.prepare(to)?;
        fs::copy(source, target).map_err(not_found(from))?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut paths = Vec::new();
        self.walk(self.cfg.storage_directory.clone(), String::new(), &mut paths)?;
        paths.retain(|path| path.starts_with(prefix));
        paths.sort();
        Ok(paths)
    }
}
