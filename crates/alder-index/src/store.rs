//! On-disk index directory with a process-wide read cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::{IndexError, ValueIndex};

/// Indexes stored as `<dir>/<db_id>.json`, loaded once per process.
///
/// A database without an index file is remembered as `None` so workers do not
/// probe the filesystem on every grounding request. Loads run under a per-id
/// slot, so reading one large index does not stall lookups for other ids.
pub struct IndexCache {
    dir: PathBuf,
    slots: RwLock<HashMap<String, Arc<IndexSlot>>>,
}

/// Outer `None`: not looked up yet. Inner `None`: no index file.
type IndexSlot = Mutex<Option<Option<Arc<ValueIndex>>>>;

impl IndexCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            slots: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, db_id: &str) -> PathBuf {
        self.dir.join(format!("{db_id}.json"))
    }

    /// Index for `db_id`, or `None` when none has been built.
    ///
    /// # Errors
    ///
    /// Returns an [`IndexError`] if an index file exists but cannot be read.
    pub fn get(&self, db_id: &str) -> Result<Option<Arc<ValueIndex>>, IndexError> {
        let slot = self.slot(db_id);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = guard.as_ref() {
            return Ok(entry.clone());
        }

        let path = self.path_for(db_id);
        let entry = if path.is_file() {
            let index = ValueIndex::load(&path)?;
            tracing::debug!(db_id, values = index.len(), "value index loaded");
            Some(Arc::new(index))
        } else {
            tracing::debug!(db_id, path = %path.display(), "no value index");
            None
        };
        *guard = Some(entry.clone());
        Ok(entry)
    }

    /// Write `index` for `db_id` and make it visible to later lookups.
    ///
    /// # Errors
    ///
    /// Returns an [`IndexError`] if the file cannot be written.
    pub fn store(&self, db_id: &str, index: ValueIndex) -> Result<PathBuf, IndexError> {
        let path = self.path_for(db_id);
        index.save(&path)?;
        let slot = self.slot(db_id);
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Some(Arc::new(index)));
        Ok(path)
    }

    fn slot(&self, db_id: &str) -> Arc<IndexSlot> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(db_id)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(db_id.to_string()).or_default())
    }
}
