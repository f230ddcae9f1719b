//! The schema cache and execution engine shared across worker threads.

use std::sync::Arc;
use std::time::Duration;

use alder_core::{Cell, SqlExecutionResult};
use alder_db::{DatabaseError, ExecutionEngine, ExecutionOptions, SchemaCache};
use pretty_assertions::assert_eq;
use rstest::rstest;
use rusqlite::Connection;

fn database_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("t1");
    std::fs::create_dir_all(&db_dir).unwrap();
    let conn = Connection::open(db_dir.join("t1.sqlite")).unwrap();
    conn.execute_batch(
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, status TEXT);
         INSERT INTO orders (status) VALUES ('open'), ('shipped'), ('open');",
    )
    .unwrap();
    dir
}

#[test]
fn workers_share_one_memo_table() {
    let root = database_root();
    let schemas = Arc::new(SchemaCache::new(root.path()));
    let engine = Arc::new(ExecutionEngine::new(
        ExecutionOptions {
            timeout: Duration::from_secs(5),
            ..ExecutionOptions::default()
        },
        64,
    ));

    let path = schemas.db_path("t1").unwrap();
    let warm = engine.cached_execute(&path, "SELECT count(*) FROM orders");
    assert_eq!(
        warm,
        SqlExecutionResult::Success {
            columns: vec!["count(*)".into()],
            rows: vec![vec![Cell::Integer(3)]],
        }
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let schemas = Arc::clone(&schemas);
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let schema = schemas.get("t1").unwrap();
                assert!(schema.table("ORDERS").is_some());
                let path = schemas.db_path("t1").unwrap();
                engine.cached_execute(&path, "SELECT count(*) FROM orders")
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), warm);
    }
    let stats = engine.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);
    assert_eq!(schemas.load_count(), 1);
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Rows(usize),
    Timeout,
    Error(&'static str),
}

fn outcome(result: &SqlExecutionResult) -> Outcome {
    match result {
        SqlExecutionResult::Success { rows, .. } => Outcome::Rows(rows.len()),
        SqlExecutionResult::Timeout => Outcome::Timeout,
        SqlExecutionResult::Error { message } if message.contains("no such table") => {
            Outcome::Error("no such table")
        }
        SqlExecutionResult::Error { message } if message.contains("modify the database") => {
            Outcome::Error("write")
        }
        SqlExecutionResult::Error { .. } => Outcome::Error("other"),
    }
}

#[rstest]
#[case("SELECT status FROM orders", 500, Outcome::Rows(3))]
#[case("SELECT status FROM orders WHERE status = 'lost'", 500, Outcome::Rows(0))]
#[case("SELECT * FROM order_lines", 500, Outcome::Error("no such table"))]
#[case("DELETE FROM orders", 500, Outcome::Error("write"))]
#[case("SELEKT 1", 500, Outcome::Error("other"))]
#[case(
    "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT count(*) FROM n",
    20,
    Outcome::Timeout
)]
fn execute_with_timeout_outcomes(
    #[case] sql: &str,
    #[case] timeout_ms: u64,
    #[case] expected: Outcome,
) {
    let root = database_root();
    let path = SchemaCache::new(root.path()).db_path("t1").unwrap();
    let engine = ExecutionEngine::new(
        ExecutionOptions {
            grace: Duration::from_millis(500),
            ..ExecutionOptions::default()
        },
        8,
    );

    let result = engine.execute_with_timeout(&path, sql, Duration::from_millis(timeout_ms));
    assert_eq!(outcome(&result), expected, "{result:?}");
}

#[rstest]
#[case("")]
#[case(".")]
#[case("..")]
#[case("../t1")]
#[case("t1/../../etc")]
#[case("a\\b")]
fn db_ids_that_leave_the_root_are_rejected(#[case] db_id: &str) {
    let root = database_root();
    let schemas = SchemaCache::new(root.path());
    assert!(matches!(
        schemas.db_path(db_id),
        Err(DatabaseError::InvalidDbId(ref id)) if id == db_id
    ));
    assert!(matches!(schemas.get(db_id), Err(DatabaseError::InvalidDbId(_))));
}
