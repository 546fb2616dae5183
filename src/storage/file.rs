//! Directory-backed storage.

use crate::error::{Result, StateError};
use fs2::FileExt;
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use super::Storage;

/// Magic bytes for entry files.
const ENTRY_MAGIC: &[u8; 4] = b"SCE\0";

/// Current entry format version.
const ENTRY_VERSION: u8 = 1;

/// Magic, version and length before the payload, checksum after it.
const ENTRY_OVERHEAD: u64 = 4 + 1 + 8 + 4;

/// Storage keeping one file per key under a directory.
///
/// Entry files are named after the hex encoding of the key and framed as
/// magic, version, payload length, payload, CRC32 of the payload. The
/// directory is locked exclusively while the storage is open.
pub struct FileStorage {
    /// Base directory for entries.
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// LRU cache for recently read or written entries.
    cache: Mutex<LruCache<String, String>>,

    /// Serializes writers. Entries of one key share a temp file.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open (creating if needed) storage rooted at `path`.
    pub fn open(path: impl AsRef<Path>, cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = Self::acquire_lock(&path)?;

        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path,
            _lock_file: lock_file,
            cache: Mutex::new(LruCache::new(cache_size)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StateError::Locked)?;

        Ok(lock_file)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{}.entry", hex::encode(key)))
    }

    fn read_entry(path: &Path) -> Result<String> {
        let mut file = File::open(path)?;

        // Read and verify magic
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != ENTRY_MAGIC {
            return Err(StateError::InvalidFormat("Invalid entry magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != ENTRY_VERSION {
            return Err(StateError::InvalidFormat(format!(
                "Unsupported entry version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);

        // Never trust the header for the allocation size
        let available = file.metadata()?.len().saturating_sub(ENTRY_OVERHEAD);
        if len != available {
            return Err(StateError::InvalidFormat(format!(
                "Entry length {} does not match payload size {}",
                len, available
            )));
        }
        let len = usize::try_from(len)
            .map_err(|_| StateError::InvalidFormat(format!("Entry too large: {} bytes", len)))?;

        let mut content = vec![0u8; len];
        file.read_exact(&mut content)?;

        // Read and verify checksum
        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&content);

        if stored_checksum != computed_checksum {
            return Err(StateError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        String::from_utf8(content)
            .map_err(|e| StateError::InvalidFormat(format!("Entry is not UTF-8: {}", e)))
    }

    fn write_entry(path: &Path, value: &str) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let content = value.as_bytes();

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(ENTRY_MAGIC)?;
            file.write_all(&[ENTRY_VERSION])?;
            file.write_all(&(content.len() as u64).to_le_bytes())?;
            file.write_all(content)?;
            file.write_all(&crc32fast::hash(content).to_le_bytes())?;
            file.sync_all()?;
        }

        // Rename so readers never see a half-written entry
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        // Check cache first
        if let Some(cached) = self.cache.lock().get(key).cloned() {
            return Ok(Some(cached));
        }

        let entry_path = self.entry_path(key);
        if !entry_path.exists() {
            return Ok(None);
        }

        let value = Self::read_entry(&entry_path)?;
        self.cache.lock().put(key.to_string(), value.clone());
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _lock = self.write_lock.lock();
        Self::write_entry(&self.entry_path(key), value)?;
        self.cache.lock().put(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _lock = self.write_lock.lock();
        self.cache.lock().pop(key);

        let entry_path = self.entry_path(key);
        if entry_path.exists() {
            fs::remove_file(&entry_path)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish()
    }
}
