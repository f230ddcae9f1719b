//! Parsers for raw oracle samples.
//!
//! Every parser returns `None` for a sample it cannot use; the caller drops
//! and counts those.

use std::collections::BTreeMap;

use alder_core::{DatabaseSchema, SchemaSelection};
use serde::de::DeserializeOwned;

const FENCE: &str = "```";

/// Fenced code blocks in `text` as `(language tag, body)`, in order.
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    text.split(FENCE)
        .skip(1)
        .step_by(2)
        .map(|block| match block.split_once('\n') {
            Some((tag, body)) => (tag.trim(), body.trim()),
            None => ("", block.trim()),
        })
        .collect()
}

/// Decode JSON from a sample: last fenced block first, then the whole text,
/// then the outermost bracketed span.
fn parse_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let blocks = fenced_blocks(text);
    for (_, body) in blocks.iter().rev() {
        if let Ok(value) = serde_json::from_str(body) {
            return Some(value);
        }
    }

    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// SQL from the last fenced block holding a query, whatever its language
/// tag, else the whole trimmed text.
///
/// Only `SELECT` and `WITH` statements are accepted.
#[must_use]
pub fn parse_sql(text: &str) -> Option<String> {
    let candidate = fenced_blocks(text)
        .into_iter()
        .rev()
        .map(|(_, body)| body)
        .find(|body| is_query(body))
        .unwrap_or_else(|| text.trim());
    is_query(candidate).then(|| candidate.to_string())
}

fn is_query(sql: &str) -> bool {
    let Some(first) = sql.split_whitespace().next() else {
        return false;
    };
    let first = first.split('(').next().unwrap_or(first);
    first.eq_ignore_ascii_case("select") || first.eq_ignore_ascii_case("with")
}

/// `{ "table": ["column", ...] }` resolved against `schema`.
#[must_use]
pub fn parse_schema_selection(text: &str, schema: &DatabaseSchema) -> Option<SchemaSelection> {
    let raw: BTreeMap<String, Vec<String>> = parse_json(text)?;
    let selection = schema.resolve_selection(&raw);
    (!selection.is_empty()).then_some(selection)
}

/// `{ "rephrased_question": "..." }` or plain text.
#[must_use]
pub fn parse_rephrase(text: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct Rephrase {
        rephrased_question: String,
    }

    let rephrased = match parse_json::<Rephrase>(text) {
        Some(parsed) => parsed.rephrased_question,
        None if text.trim_start().starts_with('{') || text.contains(FENCE) => return None,
        None => text.to_string(),
    };
    let rephrased = rephrased.trim();
    (!rephrased.is_empty()).then(|| rephrased.to_string())
}

/// JSON array of strings, trimmed, blanks and duplicates removed.
#[must_use]
pub fn parse_string_list(text: &str) -> Option<Vec<String>> {
    let raw: Vec<String> = parse_json(text)?;
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for item in raw {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    Some(out)
}
