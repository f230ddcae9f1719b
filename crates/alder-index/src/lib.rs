//! # alder-index
//!
//! Approximate nearest-neighbour index over the distinct text values of a
//! database, used to ground literals mentioned in a question to values that
//! actually occur in the data.
//!
//! Each value is `MinHash`-sketched over character n-grams; sketches are split
//! into bands and bucketed (banded LSH) so a query only scores values that
//! collide with it in at least one band. An index is immutable once built and
//! is persisted as one JSON file per database, replaced atomically on rebuild.

pub mod error;
pub mod minhash;
pub mod store;

pub use error::IndexError;
pub use store::IndexCache;

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use alder_config::IndexConfig;
use alder_core::{Cell, DatabaseSchema, SqlExecutionResult};
use serde::{Deserialize, Serialize};

use crate::minhash::{MinHasher, fnv1a, jaccard};

/// Seed for the permutation family; part of the persisted format.
const DEFAULT_SEED: u64 = 0x616c_6465_72;

/// Longest value kept in the index, in bytes.
const MAX_VALUE_LEN: usize = 256;

/// Sketch and bucketing layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    pub num_perm: usize,
    pub bands: usize,
    pub ngram: usize,
    pub seed: u64,
}

impl IndexParams {
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidParams`] unless `bands` is non-zero and
    /// divides `num_perm`, and `ngram` is non-zero.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.num_perm == 0 || self.bands == 0 || self.num_perm % self.bands != 0 {
            return Err(IndexError::InvalidParams(format!(
                "bands ({}) must be non-zero and divide num_perm ({})",
                self.bands, self.num_perm
            )));
        }
        if self.ngram == 0 {
            return Err(IndexError::InvalidParams("ngram must be at least 1".into()));
        }
        Ok(())
    }

    const fn rows_per_band(&self) -> usize {
        self.num_perm / self.bands
    }
}

impl From<&IndexConfig> for IndexParams {
    fn from(config: &IndexConfig) -> Self {
        Self {
            num_perm: config.num_perm,
            bands: config.bands,
            ngram: config.ngram,
            seed: DEFAULT_SEED,
        }
    }
}

/// One indexed value and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub table: String,
    pub column: String,
    pub value: String,
}

/// A query hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMatch {
    pub table: String,
    pub column: String,
    pub value: String,
    /// Estimated Jaccard similarity of character n-grams.
    pub similarity: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValueIndex {
    params: IndexParams,
    entries: Vec<ValueEntry>,
    sketches: Vec<Vec<u64>>,
    #[serde(skip)]
    hasher: Option<MinHasher>,
    #[serde(skip)]
    buckets: HashMap<(usize, u64), Vec<usize>>,
}

impl ValueIndex {
    /// Index the distinct values of every non-primary-key text column.
    ///
    /// Columns whose value query fails are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidParams`] for an unusable layout.
    pub fn build(
        db_path: &Path,
        schema: &DatabaseSchema,
        config: &IndexConfig,
    ) -> Result<Self, IndexError> {
        let mut entries = Vec::new();
        for column_ref in schema.text_columns() {
            let sql = format!(
                "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL LIMIT {limit}",
                col = quote_ident(&column_ref.column),
                table = quote_ident(&column_ref.table),
                limit = config.max_values_per_column,
            );
            match alder_db::execute_no_timeout(db_path, &sql) {
                SqlExecutionResult::Success { rows, .. } => {
                    for row in rows {
                        let Some(Cell::Text(value)) = row.into_iter().next() else {
                            continue;
                        };
                        let value = value.trim();
                        if value.is_empty() || value.len() > MAX_VALUE_LEN {
                            continue;
                        }
                        entries.push(ValueEntry {
                            table: column_ref.table.clone(),
                            column: column_ref.column.clone(),
                            value: value.to_string(),
                        });
                    }
                }
                other => tracing::warn!(
                    table = %column_ref.table,
                    column = %column_ref.column,
                    outcome = %other.summary(),
                    "value index: skipping column"
                ),
            }
        }

        tracing::info!(
            db = %db_path.display(),
            values = entries.len(),
            "value index built"
        );
        Self::from_entries(entries, IndexParams::from(config))
    }

    /// Index an explicit list of values.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidParams`] for an unusable layout.
    pub fn from_entries(entries: Vec<ValueEntry>, params: IndexParams) -> Result<Self, IndexError> {
        params.validate()?;
        let hasher = MinHasher::new(params.num_perm, params.ngram, params.seed);
        let sketches = entries.iter().map(|e| hasher.sketch(&e.value)).collect();
        let mut index = Self {
            params,
            entries,
            sketches,
            hasher: Some(hasher),
            buckets: HashMap::new(),
        };
        index.rebuild_buckets();
        Ok(index)
    }

    fn rebuild_buckets(&mut self) {
        let rows = self.params.rows_per_band();
        let mut buckets: HashMap<(usize, u64), Vec<usize>> = HashMap::new();
        for (id, sketch) in self.sketches.iter().enumerate() {
            for (band, key) in band_keys(sketch, rows) {
                buckets.entry((band, key)).or_default().push(id);
            }
        }
        self.buckets = buckets;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn params(&self) -> IndexParams {
        self.params
    }

    /// The `top_k` stored values most similar to `text`.
    ///
    /// Candidates come from colliding LSH buckets; when nothing collides every
    /// value is scored. Ties keep the exact (case-insensitive) match first,
    /// then index order.
    #[must_use]
    pub fn query(&self, text: &str, top_k: usize) -> Vec<ValueMatch> {
        let Some(hasher) = &self.hasher else {
            return Vec::new();
        };
        if top_k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let sketch = hasher.sketch(text);
        let mut candidates: HashSet<usize> = HashSet::new();
        for key in band_keys(&sketch, self.params.rows_per_band()) {
            if let Some(ids) = self.buckets.get(&key) {
                candidates.extend(ids);
            }
        }
        let candidates: Vec<usize> = if candidates.is_empty() {
            (0..self.entries.len()).collect()
        } else {
            let mut ids: Vec<usize> = candidates.into_iter().collect();
            ids.sort_unstable();
            ids
        };

        let needle = text.trim();
        let mut scored: Vec<(f64, bool, usize)> = candidates
            .into_iter()
            .map(|id| {
                let exact = self.entries[id].value.eq_ignore_ascii_case(needle);
                (jaccard(&sketch, &self.sketches[id]), exact, id)
            })
            .filter(|(similarity, exact, _)| *similarity > 0.0 || *exact)
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        scored
            .into_iter()
            .take(top_k)
            .map(|(similarity, _, id)| {
                let entry = &self.entries[id];
                ValueMatch {
                    table: entry.table.clone(),
                    column: entry.column.clone(),
                    value: entry.value.clone(),
                    similarity,
                }
            })
            .collect()
    }

    /// Persist to `path`, replacing any previous index atomically.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] or [`IndexError::Format`] on write failure.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let io_err = |source| IndexError::Io {
            path: path.display().to_string(),
            source,
        };
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(io_err)?;

        let mut file = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        serde_json::to_writer(&mut file, self)?;
        file.flush().map_err(io_err)?;
        file.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Load an index written by [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`], [`IndexError::Format`], or
    /// [`IndexError::InvalidParams`] if the file is unreadable or inconsistent.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read(path).map_err(|source| IndexError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut index: Self = serde_json::from_slice(&raw)?;
        index.params.validate()?;
        if index.sketches.len() != index.entries.len()
            || index.sketches.iter().any(|s| s.len() != index.params.num_perm)
        {
            return Err(IndexError::InvalidParams(format!(
                "{}: sketch table does not match entries",
                path.display()
            )));
        }
        index.hasher = Some(MinHasher::new(
            index.params.num_perm,
            index.params.ngram,
            index.params.seed,
        ));
        index.rebuild_buckets();
        Ok(index)
    }
}

fn band_keys(sketch: &[u64], rows: usize) -> impl Iterator<Item = (usize, u64)> + '_ {
    sketch
        .chunks(rows)
        .enumerate()
        .filter(|(_, band)| band.iter().any(|&v| v != u64::MAX))
        .map(|(band, values)| {
            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            (band, fnv1a(&bytes))
        })
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params() -> IndexParams {
        IndexParams {
            num_perm: 64,
            bands: 16,
            ngram: 3,
            seed: DEFAULT_SEED,
        }
    }

    fn entry(value: &str) -> ValueEntry {
        ValueEntry {
            table: "schools".into(),
            column: "city".into(),
            value: value.into(),
        }
    }

    fn cities() -> ValueIndex {
        ValueIndex::from_entries(
            vec![
                entry("Los Angeles"),
                entry("San Francisco"),
                entry("San Diego"),
                entry("Fresno"),
            ],
            params(),
        )
        .unwrap()
    }

    #[test]
    fn exact_value_ranks_first() {
        let hits = cities().query("san francisco", 2);
        assert_eq!(hits[0].value, "San Francisco");
        assert!((hits[0].similarity - 1.0).abs() < f64::EPSILON);
        assert_eq!(hits[0].table, "schools");
        assert_eq!(hits[0].column, "city");
    }

    #[test]
    fn misspelling_is_grounded() {
        let hits = cities().query("Los Angelos", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "Los Angeles");
    }

    #[test]
    fn top_k_bounds_results() {
        assert!(cities().query("san", 0).is_empty());
        assert!(cities().query("san", 3).len() <= 3);
    }

    #[test]
    fn bad_params_are_rejected() {
        let mut bad = params();
        bad.bands = 7;
        assert!(matches!(
            ValueIndex::from_entries(vec![], bad),
            Err(IndexError::InvalidParams(_))
        ));
    }

    #[test]
    fn save_and_load_preserve_queries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.json");
        let index = cities();
        index.save(&path).unwrap();

        let loaded = ValueIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.query("fresno", 1), index.query("fresno", 1));
    }

    #[test]
    fn rebuild_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        cities().save(&path).unwrap();
        ValueIndex::from_entries(vec![entry("Oakland")], params())
            .unwrap()
            .save(&path)
            .unwrap();

        let loaded = ValueIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.query("oakland", 1)[0].value, "Oakland");
    }
}
