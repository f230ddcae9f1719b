//! Batch runs against a real database directory with a scripted oracle.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alder_config::AlderConfig;
use alder_core::{ActionKind, SqlExecutionResult, Stage, Task, final_sql};
use alder_db::{SchemaCache, execute_no_timeout, load_schema};
use alder_index::{IndexCache, ValueIndex};
use alder_search::{
    CONFIG_SNAPSHOT, FnOracle, Oracle, OracleError, PromptPayload, TaskRunner, TaskStatus,
    load_paths,
};
use pretty_assertions::assert_eq;
use rusqlite::Connection;

fn seed_t1(db_root: &Path) {
    let dir = db_root.join("t1");
    std::fs::create_dir_all(&dir).unwrap();
    let conn = Connection::open(dir.join("t1.sqlite")).unwrap();
    conn.execute_batch(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT);
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             customer_id INTEGER REFERENCES customers(id),
             status TEXT
         );
         INSERT INTO customers (name) VALUES ('Ada'), ('Grace');
         INSERT INTO orders (customer_id, status) VALUES (1, 'shipped'), (2, 'pending'), (1, 'shipped');",
    )
    .unwrap();
}

fn config(root: &Path) -> AlderConfig {
    let mut config = AlderConfig::default();
    config.search.db_root_dir = root.join("db").display().to_string();
    config.search.save_root_dir = root.join("out").display().to_string();
    config.index.index_dir = root.join("index").display().to_string();
    config.search.max_rollout_steps = 10;
    config.search.max_depth = 4;
    config.oracle.sql_samples = 3;
    config.runner.workers = 2;
    config
}

fn scripted(
    payload: &PromptPayload<'_>,
    n: usize,
) -> Result<Vec<String>, OracleError> {
    let samples = match payload.action {
        ActionKind::SchemaSelection => vec![r#"{"orders": ["status"]}"#.to_string()],
        ActionKind::Rephrase => vec!["How many rows does orders have?".to_string()],
        ActionKind::ValueGrounding => vec![r#"["shiped"]"#.to_string()],
        ActionKind::FunctionGrounding => vec![r#"["count"]"#.to_string()],
        ActionKind::SqlGeneration | ActionKind::SqlRevision => vec![
            "```sql\nSELECT count(*) FROM orders\n```".to_string(),
            "SELECT COUNT(id) FROM orders".to_string(),
            "SELECT count(*) FROM order_lines".to_string(),
        ],
        ActionKind::End => Vec::new(),
    };
    Ok(samples.into_iter().cycle().take(n).collect())
}

#[test]
fn count_rows_in_orders_yields_executable_end_paths() {
    let root = tempfile::tempdir().unwrap();
    seed_t1(&root.path().join("db"));
    let config = config(root.path());

    let db_path = root.path().join("db/t1/t1.sqlite");
    let schema = load_schema(&db_path).unwrap();
    let index = ValueIndex::build(&db_path, &schema, &config.index).unwrap();
    IndexCache::new(&config.index.index_dir)
        .store("t1", index)
        .unwrap();

    let runner = TaskRunner::new(config, Arc::new(FnOracle(scripted)));
    let task = Task::new(0, "t1", "count rows in orders", "");
    let summary = runner.run(std::slice::from_ref(&task), |_| {}).unwrap();

    assert_eq!(summary.solved.len(), 1);
    assert!(summary.skipped.is_empty());
    let report = &summary.solved[0];
    assert_eq!(report.rollouts, 10);
    assert!(report.end_paths >= 1);
    assert!(report.dropped_samples == 0);

    let paths = load_paths(&runner.output_path(0)).unwrap();
    assert_eq!(paths.len(), report.end_paths);
    let mut executed = 0;
    for path in &paths {
        assert_eq!(path[0].stage, Stage::Root);
        let sql = final_sql(path).expect("END path carries SQL");
        assert!(!sql.is_empty());
        if matches!(
            execute_no_timeout(&db_path, sql),
            SqlExecutionResult::Success { .. }
        ) {
            executed += 1;
        }

        let grounded = path
            .iter()
            .flat_map(|node| &node.artifacts.grounded_values)
            .find(|value| value.keyword == "shiped");
        if let Some(value) = grounded {
            assert_eq!(value.value, "shipped");
            assert_eq!(value.column, "status");
        }
    }
    assert!(executed >= 1);
    assert!(runner.output_path(0).with_file_name(CONFIG_SNAPSHOT).is_file());
}

#[test]
fn failing_tasks_are_skipped_without_output() {
    let root = tempfile::tempdir().unwrap();
    seed_t1(&root.path().join("db"));
    let runner = TaskRunner::new(config(root.path()), Arc::new(FnOracle(scripted)));

    let tasks = vec![
        Task::new(1, "t1", "count rows in orders", ""),
        Task::new(2, "missing_db", "anything", ""),
    ];
    let seen = AtomicUsize::new(0);
    let summary = runner
        .run(&tasks, |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

    assert_eq!(seen.load(Ordering::Relaxed), 2);
    assert_eq!(summary.solved.len(), 1);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].question_id, 2);
    assert!(runner.output_path(1).is_file());
    assert!(!runner.output_path(2).exists());
}

#[test]
fn panicking_oracle_is_contained() {
    struct Exploding;
    impl Oracle for Exploding {
        fn request(
            &self,
            payload: &PromptPayload<'_>,
            _: usize,
        ) -> Result<Vec<String>, OracleError> {
            panic!("oracle blew up on {}", payload.original_question);
        }
    }

    let root = tempfile::tempdir().unwrap();
    seed_t1(&root.path().join("db"));
    let runner = TaskRunner::new(config(root.path()), Arc::new(Exploding));

    let status = runner.run_task(&Task::new(3, "t1", "boom", ""));
    match status {
        TaskStatus::Failed {
            question_id,
            reason,
        } => {
            assert_eq!(question_id, 3);
            assert!(reason.contains("oracle blew up on boom"), "{reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!runner.output_path(3).exists());
}

#[test]
fn existing_output_is_kept_unless_overwriting() {
    let root = tempfile::tempdir().unwrap();
    seed_t1(&root.path().join("db"));
    let task = Task::new(4, "t1", "count rows in orders", "");

    let runner = TaskRunner::new(config(root.path()), Arc::new(FnOracle(scripted)));
    assert!(matches!(runner.run_task(&task), TaskStatus::Solved { .. }));
    assert_eq!(
        runner.run_task(&task),
        TaskStatus::AlreadyDone { question_id: 4 }
    );

    let mut overwrite = config(root.path());
    overwrite.runner.overwrite = true;
    let schemas = Arc::new(SchemaCache::new(&overwrite.search.db_root_dir));
    let rerun = TaskRunner::with_services(
        overwrite.clone(),
        schemas,
        Arc::new(IndexCache::new(&overwrite.index.index_dir)),
        Arc::new(alder_db::ExecutionEngine::from_config(&overwrite.reward)),
        Arc::new(FnOracle(scripted)),
    );
    assert!(matches!(rerun.run_task(&task), TaskStatus::Solved { .. }));
}
