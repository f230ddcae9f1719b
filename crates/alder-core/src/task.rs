//! Task records: one question against one database.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Immutable search input.
///
/// Field names follow the BIRD/Spider dataset layout; `SQL` is accepted as
/// an alias of `sql`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub question_id: u64,
    pub db_id: String,
    pub question: String,
    #[serde(default)]
    pub evidence: String,
    /// Known-correct SQL, used for offline evaluation only.
    #[serde(default, alias = "SQL")]
    pub sql: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl Task {
    /// Build a task without gold SQL or difficulty.
    #[must_use]
    pub fn new(
        question_id: u64,
        db_id: impl Into<String>,
        question: impl Into<String>,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            question_id,
            db_id: db_id.into(),
            question: question.into(),
            evidence: evidence.into(),
            sql: None,
            difficulty: None,
        }
    }
}

/// Load a JSON array of tasks from `path`.
///
/// # Errors
///
/// Returns [`CoreError::Io`] if the file cannot be read, [`CoreError::Json`]
/// if it is not a task array, and [`CoreError::Validation`] if two tasks share
/// a question id or a task has an empty `db_id` or question.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>, CoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let tasks: Vec<Task> = serde_json::from_str(&raw)?;

    let mut seen = std::collections::HashSet::with_capacity(tasks.len());
    for task in &tasks {
        if !seen.insert(task.question_id) {
            return Err(CoreError::Validation(format!(
                "duplicate question_id {}",
                task.question_id
            )));
        }
        if task.db_id.trim().is_empty() || task.question.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "task {} is missing db_id or question",
                task.question_id
            )));
        }
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_bird_style_record() {
        let raw = r#"{
            "question_id": 7,
            "db_id": "california_schools",
            "question": "How many schools are there?",
            "evidence": "",
            "SQL": "SELECT count(*) FROM schools",
            "difficulty": "simple"
        }"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.question_id, 7);
        assert_eq!(task.sql.as_deref(), Some("SELECT count(*) FROM schools"));
        assert_eq!(task.difficulty.as_deref(), Some("simple"));
    }

    #[test]
    fn optional_fields_default() {
        let task: Task =
            serde_json::from_str(r#"{"question_id": 1, "db_id": "t1", "question": "q"}"#).unwrap();
        assert_eq!(task, Task::new(1, "t1", "q", ""));
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"[{"question_id": 1, "db_id": "a", "question": "x"},
                {"question_id": 1, "db_id": "b", "question": "y"}]"#,
        )
        .unwrap();

        let err = load_tasks(&path).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)), "{err}");
    }

    #[test]
    fn load_reads_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"[{"question_id": 3, "db_id": "t1", "question": "count rows in orders"}]"#,
        )
        .unwrap();

        let tasks = load_tasks(&path).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].db_id, "t1");
    }
}
