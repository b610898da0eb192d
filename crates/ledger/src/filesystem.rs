//! Filesystem-based ledger storage implementation.

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::entry::LedgerEntry;
use crate::store::{LedgerError, LedgerStore};

const LOCK_FILE: &str = ".ledger.lock";
const ENTRY_EXTENSION: &str = "json";

/// Filesystem implementation of LedgerStore trait.
///
/// Stores one JSON file per table in `dir`. An upsert holds an exclusive
/// advisory lock on `dir/.ledger.lock` while it reads, merges and rewrites
/// the table's file, so processes sharing the directory serialize their
/// writes. Files are replaced by rename; readers take no lock.
pub struct FilesystemLedgerStore {
    dir: PathBuf,
}

impl FilesystemLedgerStore {
    /// Create a new FilesystemLedgerStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the entry of `table_name`.
    pub fn entry_path(&self, table_name: &str) -> PathBuf {
        entry_path(&self.dir, table_name)
    }
}

fn entry_path(dir: &Path, table_name: &str) -> PathBuf {
    dir.join(format!("{}.{ENTRY_EXTENSION}", file_stem(table_name)))
}

/// Table name with every byte outside `[A-Za-z0-9_-]` percent-encoded.
fn file_stem(table_name: &str) -> String {
    let mut stem = String::with_capacity(table_name.len());
    for b in table_name.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            stem.push(char::from(b));
        } else {
            stem.push_str(&format!("%{b:02X}"));
        }
    }
    stem
}

fn read_entry(path: &Path) -> Result<Option<LedgerEntry>, LedgerError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_entry(dir: &Path, path: &Path, entry: &LedgerEntry) -> Result<(), LedgerError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(serde_json::to_string_pretty(entry)?.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| LedgerError::Io(e.error))?;
    Ok(())
}

/// Read-merge-write of one entry under the directory lock.
fn upsert_locked(dir: &Path, entry: LedgerEntry) -> Result<(), LedgerError> {
    std::fs::create_dir_all(dir)?;
    let lock = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(dir.join(LOCK_FILE))?;
    lock.lock_exclusive()?;

    let path = entry_path(dir, &entry.table_name);
    let merged = entry.merged_over(read_entry(&path)?.as_ref());
    write_entry(dir, &path, &merged)?;
    tracing::debug!(
        "Recorded {} for {} in {}",
        merged.status,
        merged.table_name,
        path.display()
    );
    // Dropping the handle releases the lock
    drop(lock);
    Ok(())
}

#[async_trait]
impl LedgerStore for FilesystemLedgerStore {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    async fn read(&self, table_name: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        read_entry(&self.entry_path(table_name))
    }

    async fn upsert(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let dir = self.dir.clone();
        let entry = entry.clone();
        tokio::task::spawn_blocking(move || upsert_locked(&dir, entry))
            .await
            .map_err(|e| LedgerError::Io(io::Error::other(e)))?
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let listing = match std::fs::read_dir(&self.dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for item in listing {
            let path = item?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(entry) = read_entry(&path)? {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        Ok(entries)
    }
}
