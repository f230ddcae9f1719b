//! Sandboxed SQL execution.
//!
//! Every query runs on a connection opened with `SQLITE_OPEN_READ_ONLY` and is
//! additionally rejected up front when `SQLite` reports the statement as
//! writing. Timeouts are cooperative: the worker thread polls a stop flag from
//! a `SQLite` progress handler (every `progress_interval_ops` VM instructions)
//! and between fetched rows. The caller stops waiting after `timeout + grace`
//! whether or not the worker has acknowledged the flag, so the effective upper
//! bound on a blocked caller is `timeout + grace`; the worker itself may run on
//! for up to one polling interval after the flag is raised.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use alder_config::RewardConfig;
use alder_core::{Cell, SqlExecutionResult};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::cache::LruCache;

/// Knobs shared by every query an engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Wall-clock budget used by [`ExecutionEngine::cached_execute`].
    pub timeout: Duration,
    /// Extra wait for the worker to acknowledge cancellation.
    pub grace: Duration,
    /// VM instructions between stop-flag polls.
    pub progress_interval_ops: i32,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self::from(&RewardConfig::default())
    }
}

impl From<&RewardConfig> for ExecutionOptions {
    fn from(config: &RewardConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.execution_timeout_ms),
            grace: Duration::from_millis(config.grace_period_ms),
            progress_interval_ops: config.progress_interval_ops,
        }
    }
}

/// Memo-table counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the memo table.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type CacheKey = (PathBuf, String);

/// Process-wide execution service with a bounded memo table.
///
/// Built once per process and shared between task workers by reference.
/// The memo table is keyed on the exact `(db_path, sql)` pair: two spellings
/// of the same query are cached independently.
pub struct ExecutionEngine {
    options: ExecutionOptions,
    cache: Mutex<LruCache<CacheKey, SqlExecutionResult>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ExecutionEngine {
    #[must_use]
    pub fn new(options: ExecutionOptions, cache_capacity: usize) -> Self {
        Self {
            options,
            cache: Mutex::new(LruCache::new(cache_capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn from_config(config: &RewardConfig) -> Self {
        Self::new(ExecutionOptions::from(config), config.cache_capacity)
    }

    #[must_use]
    pub const fn options(&self) -> ExecutionOptions {
        self.options
    }

    /// Run `sql` with an explicit timeout, bypassing the memo table.
    #[must_use]
    pub fn execute_with_timeout(
        &self,
        db_path: &Path,
        sql: &str,
        timeout: Duration,
    ) -> SqlExecutionResult {
        execute_with_timeout(
            db_path,
            sql,
            timeout,
            self.options.grace,
            self.options.progress_interval_ops,
        )
    }

    /// Memoized execution with the engine's default timeout.
    ///
    /// The lock is not held while the query runs, so two workers missing on
    /// the same key at the same moment may both execute it; the later insert
    /// wins and both results are identical.
    #[must_use]
    pub fn cached_execute(&self, db_path: &Path, sql: &str) -> SqlExecutionResult {
        let key = (db_path.to_path_buf(), sql.to_string());
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = self.execute_with_timeout(db_path, sql, self.options.timeout);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, result.clone());
        result
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self
                .cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

/// Run `sql` on a dedicated worker thread, giving up after `timeout + grace`.
///
/// Never panics and never returns an error: failures become
/// [`SqlExecutionResult::Error`], an expired budget becomes
/// [`SqlExecutionResult::Timeout`].
#[must_use]
pub fn execute_with_timeout(
    db_path: &Path,
    sql: &str,
    timeout: Duration,
    grace: Duration,
    progress_interval_ops: i32,
) -> SqlExecutionResult {
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::sync_channel(1);

    let worker_stop = Arc::clone(&stop);
    let worker_path = db_path.to_path_buf();
    let worker_sql = sql.to_string();
    let spawned = thread::Builder::new()
        .name("alder-sql".to_string())
        .spawn(move || {
            let result = run_cancellable(
                &worker_path,
                &worker_sql,
                &worker_stop,
                progress_interval_ops,
            );
            // The receiver is gone once the caller has reported a timeout.
            let _ = tx.send(result);
        });
    if let Err(error) = spawned {
        return SqlExecutionResult::Error {
            message: format!("failed to spawn query worker: {error}"),
        };
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            stop.store(true, Ordering::Relaxed);
            match rx.recv_timeout(grace) {
                Ok(_) => tracing::debug!(
                    db = %db_path.display(),
                    "query worker acknowledged cancellation"
                ),
                Err(_) => tracing::warn!(
                    db = %db_path.display(),
                    grace_ms = grace.as_millis(),
                    "query worker still running after grace period"
                ),
            }
            SqlExecutionResult::Timeout
        }
        Err(RecvTimeoutError::Disconnected) => SqlExecutionResult::Error {
            message: "query worker exited without a result".to_string(),
        },
    }
}

/// Run `sql` on the calling thread without any cancellation.
///
/// For trusted, bounded offline work such as value-index builds.
#[must_use]
pub fn execute_no_timeout(db_path: &Path, sql: &str) -> SqlExecutionResult {
    let outcome = open_read_only(db_path).and_then(|conn| fetch_all(&conn, sql, None));
    into_result(outcome)
}

/// Open `db_path` in enforced read-only mode.
///
/// # Errors
///
/// Returns the `SQLite` error if the file is missing or unreadable.
pub fn open_read_only(db_path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.execute_batch("PRAGMA query_only = ON;")?;
    Ok(conn)
}

fn run_cancellable(
    db_path: &Path,
    sql: &str,
    stop: &Arc<AtomicBool>,
    progress_interval_ops: i32,
) -> SqlExecutionResult {
    let outcome = open_read_only(db_path).and_then(|conn| {
        let flag = Arc::clone(stop);
        conn.progress_handler(
            progress_interval_ops,
            Some(move || flag.load(Ordering::Relaxed)),
        );
        fetch_all(&conn, sql, Some(stop))
    });
    into_result(outcome)
}

struct Fetched {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

fn fetch_all(
    conn: &Connection,
    sql: &str,
    stop: Option<&Arc<AtomicBool>>,
) -> rusqlite::Result<Fetched> {
    let mut stmt = conn.prepare(sql)?;
    if !stmt.readonly() {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
            Some("statement would modify the database".to_string()),
        ));
    }

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let width = columns.len();

    let mut rows = stmt.query([])?;
    let mut fetched = Vec::new();
    while let Some(row) = rows.next()? {
        if stop.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
                Some("cancelled".to_string()),
            ));
        }
        let mut cells = Vec::with_capacity(width);
        for index in 0..width {
            cells.push(to_cell(row.get_ref(index)?));
        }
        fetched.push(cells);
    }

    Ok(Fetched {
        columns,
        rows: fetched,
    })
}

fn to_cell(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(v) => Cell::Integer(v),
        ValueRef::Real(v) => Cell::Real(v),
        ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Cell::Blob(bytes.to_vec()),
    }
}

fn into_result(outcome: rusqlite::Result<Fetched>) -> SqlExecutionResult {
    match outcome {
        Ok(Fetched { columns, rows }) => SqlExecutionResult::Success { columns, rows },
        Err(error) => SqlExecutionResult::Error {
            message: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Instant;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, item TEXT, amount REAL);
             INSERT INTO orders (item, amount) VALUES ('apple', 1.5), ('pear', NULL), ('fig', 3.0);",
        )
        .unwrap();
        (dir, path)
    }

    const RUNAWAY: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) \
                           SELECT count(*) FROM c";

    #[test]
    fn success_returns_columns_and_rows() {
        let (_dir, path) = fixture();
        let result = execute_no_timeout(&path, "SELECT item, amount FROM orders ORDER BY id");
        assert_eq!(
            result,
            SqlExecutionResult::Success {
                columns: vec!["item".into(), "amount".into()],
                rows: vec![
                    vec![Cell::Text("apple".into()), Cell::Real(1.5)],
                    vec![Cell::Text("pear".into()), Cell::Null],
                    vec![Cell::Text("fig".into()), Cell::Real(3.0)],
                ],
            }
        );
    }

    #[test]
    fn malformed_sql_is_an_error_result() {
        let (_dir, path) = fixture();
        let result = execute_no_timeout(&path, "SELEC nonsense");
        assert!(matches!(result, SqlExecutionResult::Error { .. }), "{result:?}");
    }

    #[test]
    fn writes_are_rejected() {
        let (_dir, path) = fixture();
        for sql in ["DELETE FROM orders", "DROP TABLE orders", "INSERT INTO orders (item) VALUES ('x')"] {
            let result = execute_with_timeout(&path, sql, Duration::from_secs(5), Duration::from_secs(1), 1000);
            assert!(matches!(result, SqlExecutionResult::Error { .. }), "{sql}: {result:?}");
        }
        let count = execute_no_timeout(&path, "SELECT count(*) FROM orders");
        assert_eq!(count.frozen_rows().unwrap().len(), 1);
        assert!(matches!(
            count,
            SqlExecutionResult::Success { ref rows, .. } if rows[0][0] == Cell::Integer(3)
        ));
    }

    #[test]
    fn missing_database_is_an_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute_no_timeout(&dir.path().join("nope.sqlite"), "SELECT 1");
        assert!(matches!(result, SqlExecutionResult::Error { .. }));
    }

    #[test]
    fn runaway_query_times_out_within_grace() {
        let (_dir, path) = fixture();
        let timeout = Duration::from_millis(10);
        let grace = Duration::from_secs(1);

        let started = Instant::now();
        let result = execute_with_timeout(&path, RUNAWAY, timeout, grace, 1000);
        let elapsed = started.elapsed();

        assert_eq!(result, SqlExecutionResult::Timeout);
        assert!(elapsed >= timeout, "returned early: {elapsed:?}");
        assert!(elapsed < timeout + grace + Duration::from_millis(500), "too slow: {elapsed:?}");
    }

    #[test]
    fn cached_execute_runs_once() {
        let (_dir, path) = fixture();
        let engine = ExecutionEngine::new(ExecutionOptions::default(), 8);

        let first = engine.cached_execute(&path, "SELECT item FROM orders");
        let second = engine.cached_execute(&path, "SELECT item FROM orders");
        assert_eq!(first, second);
        assert_eq!(
            engine.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn cache_keys_on_exact_text() {
        let (_dir, path) = fixture();
        let engine = ExecutionEngine::new(ExecutionOptions::default(), 8);

        let _ = engine.cached_execute(&path, "SELECT item FROM orders");
        let _ = engine.cached_execute(&path, "select item from orders");
        let stats = engine.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn timeouts_are_cached_too() {
        let (_dir, path) = fixture();
        let options = ExecutionOptions {
            timeout: Duration::from_millis(10),
            grace: Duration::from_millis(500),
            progress_interval_ops: 100,
        };
        let engine = ExecutionEngine::new(options, 8);

        assert_eq!(engine.cached_execute(&path, RUNAWAY), SqlExecutionResult::Timeout);
        let started = Instant::now();
        assert_eq!(engine.cached_execute(&path, RUNAWAY), SqlExecutionResult::Timeout);
        assert!(started.elapsed() < Duration::from_millis(10));
    }
}
