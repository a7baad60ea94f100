use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Result;

pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Receipt images kept on local disk under `<data_dir>/uploads`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[cfg(test)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` under a fresh unique name and return its path.
    pub fn save(&self, data: &[u8], extension: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let file_name = format!("{}.{extension}", uuid::Uuid::new_v4());
        let path = self.root.join(file_name);
        std::fs::write(&path, data)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "stored receipt image");
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    /// Remove a stored file. Returns false when it was already gone.
    pub fn delete(&self, path: &Path) -> Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("uploads"));
        let path = storage.save(b"jpeg bytes", "jpg").unwrap();
        assert!(path.starts_with(storage.root()));
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(storage.read(&path).unwrap(), b"jpeg bytes");
        assert!(storage.delete(&path).unwrap());
        assert!(!storage.delete(&path).unwrap());
    }

    #[test]
    fn test_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let a = storage.save(b"x", "png").unwrap();
        let b = storage.save(b"x", "png").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
