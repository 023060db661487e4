//! # Storage Backends
//!
//! The store never touches the file system directly. It talks to a [`Backend`],
//! a synchronous byte store addressed by path, so the read-modify-write cycle
//! can run against a real disk or an in-memory map.
//!
//! ## Implementations
//!
//! - `FsBackend`: durable file storage, whole-file atomic replacement
//! - `MemoryBackend`: thread-safe in-memory storage using RwLock<HashMap>

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use tempfile::NamedTempFile;

/// Common interface for the byte stores a [`Store`](crate::Store) persists into.
///
/// All backends should be safe to share across multiple threads (Send + Sync).
#[cfg_attr(test, mockall::automock)]
pub trait Backend: Send + Sync {
    /// Check whether anything is stored at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read the full contents stored at `path`.
    ///
    /// # Returns
    /// * `io::Result<Vec<u8>>` - The bytes, or `NotFound` if nothing is stored
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the full contents stored at `path`.
    ///
    /// Must not return `Ok` before the bytes are durably stored.
    fn write_all(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// The extension of `path` without the leading dot, or an empty string.
    fn extension_of(&self, path: &Path) -> String {
        path.extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// File-system backend.
///
/// Writes go to a temporary file next to the target which is flushed and then
/// renamed over it, so readers only ever observe the old or the new document.
#[derive(Debug, Clone)]
pub struct FsBackend {
    /// `fsync` the temporary file before the rename and its directory after
    sync: bool,
}

impl FsBackend {
    pub fn new() -> Self {
        Self { sync: true }
    }

    /// Create a backend that skips `fsync`. The rename is still atomic, but a
    /// power loss may drop the most recent write.
    pub fn without_sync() -> Self {
        Self { sync: false }
    }

    pub fn with_sync(sync: bool) -> Self {
        Self { sync }
    }
}

impl Default for FsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for FsBackend {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_all(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        // Write through symlinks and keep the mode of an existing file
        let (target, permissions) = if path.exists() {
            let target = fs::canonicalize(path)?;
            let permissions = fs::metadata(&target)?.permissions();
            (target, Some(permissions))
        } else {
            (path.to_path_buf(), None)
        };

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        if let Some(permissions) = permissions {
            tmp.as_file().set_permissions(permissions)?;
        }
        if self.sync {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(&target).map_err(|e| e.error)?;
        if self.sync {
            sync_dir(&dir)?;
        }
        debug!("Wrote {} bytes to {}", bytes.len(), target.display());
        Ok(())
    }
}

/// Flush the directory entry so the rename survives a power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// In-memory backend.
///
/// Cloning shares the underlying map, so a test can hand one clone to a store
/// and inspect the raw bytes through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes stored at `path`, if any.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.get(path).cloned()
    }
}

impl Backend for MemoryBackend {
    fn exists(&self, path: &Path) -> bool {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.contains_key(path)
    }

    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.contents(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }

    fn write_all(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_fs_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("db.json");
        let backend = FsBackend::new();

        assert!(!backend.exists(&path));
        assert_eq!(
            backend.read_all(&path).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        backend.write_all(&path, b"{}").unwrap();
        assert!(backend.exists(&path));
        assert_eq!(backend.read_all(&path).unwrap(), b"{}");

        // Overwrite replaces the whole file
        backend.write_all(&path, b"{\"a\":1}").unwrap();
        assert_eq!(backend.read_all(&path).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_fs_creates_missing_directories() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("deeper").join("db.json");

        FsBackend::without_sync().write_all(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_fs_leaves_no_temporary_files() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("db.json");
        let backend = FsBackend::new();

        for i in 0..5 {
            backend
                .write_all(&path, format!("{{\"n\":{}}}", i).as_bytes())
                .unwrap();
        }

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_preserves_mode_and_symlink() {
        use std::os::unix::fs::{symlink, PermissionsExt};

        let temp_dir = tempdir().unwrap();
        let backend = FsBackend::new();

        // Mode of an existing file survives the replacement
        let path = temp_dir.path().join("db.json");
        fs::write(&path, b"{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        backend.write_all(&path, b"{\"a\":1}").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);

        // Writes through a symlink land in its target and keep the link
        let real = temp_dir.path().join("real.json");
        let link = temp_dir.path().join("link.json");
        fs::write(&real, b"{}").unwrap();
        symlink(&real, &link).unwrap();
        backend.write_all(&link, b"{\"b\":2}").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&real).unwrap(), b"{\"b\":2}");
        assert_eq!(backend.read_all(&link).unwrap(), b"{\"b\":2}");
    }

    #[test]
    fn test_synced_write_flushes_directory() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("db.json");

        sync_dir(temp_dir.path()).unwrap();
        FsBackend::with_sync(true).write_all(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_extension_of() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.extension_of(Path::new("data/db.json")), "json");
        assert_eq!(backend.extension_of(Path::new("data/db.JSON")), "JSON");
        assert_eq!(backend.extension_of(Path::new("data/db.txt")), "txt");
        assert_eq!(backend.extension_of(Path::new("data/db")), "");
    }

    #[test]
    fn test_memory_clones_share_state() {
        let backend = MemoryBackend::new();
        let other = backend.clone();
        let path = Path::new("db.json");

        backend.write_all(path, b"[1]").unwrap();
        assert!(other.exists(path));
        assert_eq!(other.contents(path), Some(b"[1]".to_vec()));
    }

    #[test]
    fn test_memory_concurrent_writers() {
        let backend = MemoryBackend::new();

        let mut handles = vec![];
        for i in 0..5 {
            let backend = backend.clone();
            handles.push(thread::spawn(move || {
                for j in 0..10 {
                    let path = PathBuf::from(format!("file_{}_{}.json", i, j));
                    backend.write_all(&path, b"{}").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..5 {
            for j in 0..10 {
                assert!(backend.exists(Path::new(&format!("file_{}_{}.json", i, j))));
            }
        }
    }
}
