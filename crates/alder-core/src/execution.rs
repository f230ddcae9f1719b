//! SQL execution results.
//!
//! Results are immutable once produced and are compared by value when the
//! reward model groups candidates by what they return. [`Cell`] therefore has
//! total equality, ordering, and hashing, with floats compared bitwise.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// One value in a result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Integer(_) => 1,
            Self::Real(_) => 2,
            Self::Text(_) => 3,
            Self::Blob(_) => 4,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Integer(v) => v.hash(state),
            Self::Real(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
            Self::Blob(v) => v.hash(state),
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Outcome of running one SQL string on one database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SqlExecutionResult {
    Success {
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
    },
    Timeout,
    Error {
        message: String,
    },
}

impl SqlExecutionResult {
    /// Whether the query succeeded and returned at least one non-null cell.
    ///
    /// Empty and all-null results are treated as degenerate and excluded
    /// from consistency voting.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Success { rows, .. } => rows.iter().any(|row| row.iter().any(|c| !c.is_null())),
            Self::Timeout | Self::Error { .. } => false,
        }
    }

    /// Order- and duplicate-insensitive view of the rows.
    ///
    /// Returns `None` for non-success results.
    #[must_use]
    pub fn frozen_rows(&self) -> Option<BTreeSet<Vec<Cell>>> {
        match self {
            Self::Success { rows, .. } => Some(rows.iter().cloned().collect()),
            Self::Timeout | Self::Error { .. } => None,
        }
    }

    /// Short description for logs and revision feedback.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Success { rows, .. } if rows.is_empty() => "query returned no rows".to_string(),
            Self::Success { rows, .. } => {
                let preview: Vec<String> = rows
                    .iter()
                    .take(3)
                    .map(|row| {
                        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                        format!("({})", cells.join(", "))
                    })
                    .collect();
                format!("{} row(s): {}", rows.len(), preview.join(" "))
            }
            Self::Timeout => "query timed out".to_string(),
            Self::Error { message } => format!("query failed: {message}"),
        }
    }
}

/// Free-function form of [`SqlExecutionResult::is_valid`].
#[must_use]
pub fn is_valid_result(result: &SqlExecutionResult) -> bool {
    result.is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn success(rows: Vec<Vec<Cell>>) -> SqlExecutionResult {
        SqlExecutionResult::Success {
            columns: vec!["c".into()],
            rows,
        }
    }

    #[rstest]
    #[case(success(vec![vec![Cell::Integer(3)]]), true)]
    #[case(success(vec![vec![Cell::Null], vec![Cell::Text("x".into())]]), true)]
    #[case(success(vec![]), false)]
    #[case(success(vec![vec![Cell::Null, Cell::Null]]), false)]
    #[case(SqlExecutionResult::Timeout, false)]
    #[case(SqlExecutionResult::Error { message: "no such table".into() }, false)]
    fn validity(#[case] result: SqlExecutionResult, #[case] expected: bool) {
        assert_eq!(is_valid_result(&result), expected);
    }

    #[test]
    fn frozen_rows_ignore_order_and_duplicates() {
        let a = success(vec![
            vec![Cell::Integer(1)],
            vec![Cell::Integer(2)],
            vec![Cell::Integer(1)],
        ]);
        let b = success(vec![vec![Cell::Integer(2)], vec![Cell::Integer(1)]]);
        assert_eq!(a.frozen_rows(), b.frozen_rows());
        assert_eq!(SqlExecutionResult::Timeout.frozen_rows(), None);
    }

    #[test]
    fn real_cells_compare_bitwise() {
        assert_eq!(Cell::Real(0.5), Cell::Real(0.5));
        assert_ne!(Cell::Real(0.0), Cell::Real(-0.0));
        assert_ne!(Cell::Integer(1), Cell::Real(1.0));
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(&SqlExecutionResult::Timeout).unwrap();
        assert_eq!(json, serde_json::json!({"status": "timeout"}));
    }
}
