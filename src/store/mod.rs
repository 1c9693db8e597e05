//! Document Store
//!
//! JSON documents on disk under the service's data directory.
//!
//! Directory structure:
//! ```text
//! {data_dir}/{account}/
//!   ├── databases.json          # Schemas (databases and their fields)
//!   ├── visualizations.json     # Saved chart configurations
//!   └── entries/
//!       └── {database_id}.json  # Entries of one database
//! ```
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so readers never observe a half-written document. Writers to the
//! same document are serialized through a per-path lock.

mod page;

pub use page::{Page, PageRequest, Pagination};

use crate::error::{DabbleError, Result};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::debug;

pub struct DocumentStore {
    data_dir: PathBuf,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    id_counter: AtomicU64,
}

impl DocumentStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            locks: DashMap::new(),
            id_counter: AtomicU64::new(0),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn resolve(&self, relative: &Path) -> PathBuf {
        self.data_dir.join(relative)
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Read a document, or its default when it does not exist yet
    pub fn load<T>(&self, relative: &Path) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.resolve(relative);

        if !path.exists() {
            return Ok(T::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            DabbleError::Internal(format!("Failed to read {}: {}", relative.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            DabbleError::Internal(format!("Failed to parse {}: {}", relative.display(), e))
        })
    }

    /// Replace a document atomically
    pub fn save<T: Serialize>(&self, relative: &Path, document: &T) -> Result<()> {
        let path = self.resolve(relative);
        let parent = path.parent().unwrap_or(&self.data_dir);

        fs::create_dir_all(parent).map_err(|e| {
            DabbleError::Internal(format!("Failed to create {}: {}", parent.display(), e))
        })?;

        let content = serde_json::to_vec_pretty(document).map_err(|e| {
            DabbleError::Internal(format!("Failed to serialize {}: {}", relative.display(), e))
        })?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| {
            DabbleError::Internal(format!("Failed to write {}: {}", relative.display(), e.error))
        })?;

        debug!("Saved document {} ({} bytes)", relative.display(), content.len());
        Ok(())
    }

    /// Load, modify and save a document while holding its lock.
    ///
    /// The document is only written back when `f` succeeds.
    pub fn update<T, R, F>(&self, relative: &Path, f: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> Result<R>,
    {
        self.update_then(relative, f, |_| Ok(()))
    }

    /// Like [`update`](Self::update), then run `then` on the result after the
    /// document is saved, still holding its lock.
    ///
    /// Used to write dependent documents only once their parent is on disk.
    pub fn update_then<T, R, F, G>(&self, relative: &Path, f: F, then: G) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> Result<R>,
        G: FnOnce(&mut R) -> Result<()>,
    {
        let lock = self.lock_for(&self.resolve(relative));
        let _guard = lock
            .lock()
            .map_err(|_| DabbleError::Internal(format!("Lock poisoned for {}", relative.display())))?;

        let mut document: T = self.load(relative)?;
        let mut result = f(&mut document)?;
        self.save(relative, &document)?;
        then(&mut result)?;

        Ok(result)
    }

    /// Load a document and hold its lock while `f` runs, without writing back.
    ///
    /// Used when a dependent document must not change underneath `f`.
    pub fn read_locked<T, R, F>(&self, relative: &Path, f: F) -> Result<R>
    where
        T: DeserializeOwned + Default,
        F: FnOnce(&T) -> Result<R>,
    {
        let lock = self.lock_for(&self.resolve(relative));
        let _guard = lock
            .lock()
            .map_err(|_| DabbleError::Internal(format!("Lock poisoned for {}", relative.display())))?;

        let document: T = self.load(relative)?;
        f(&document)
    }

    /// Delete a document; a missing document is not an error
    pub fn remove(&self, relative: &Path) -> Result<()> {
        let path = self.resolve(relative);
        let lock = self.lock_for(&path);
        let _guard = lock
            .lock()
            .map_err(|_| DabbleError::Internal(format!("Lock poisoned for {}", relative.display())))?;

        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                DabbleError::Internal(format!("Failed to remove {}: {}", relative.display(), e))
            })?;
            debug!("Removed document {}", relative.display());
        }

        Ok(())
    }

    /// Generate a 24 hex character document id
    pub fn next_id(&self, scope: &str) -> String {
        let counter = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(scope.as_bytes());
        hasher.update(nanos.to_le_bytes());
        hasher.update(counter.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());

        let mut id = hex::encode(hasher.finalize());
        id.truncate(24);
        id
    }
}
