//! Database schema metadata.
//!
//! A [`DatabaseSchema`] is loaded once per database id and shared read-only
//! between concurrent searches. Table and column lookups are ASCII
//! case-insensitive, matching `SQLite` identifier rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A `(table, column)` pair on the other side of a key relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Metadata for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Declared type as written in the DDL (may be empty).
    pub column_type: String,
    pub primary_key: bool,
    /// Columns this column references.
    #[serde(default)]
    pub foreign_keys: Vec<ColumnRef>,
    /// Columns referencing this column.
    #[serde(default)]
    pub referenced_by: Vec<ColumnRef>,
}

impl ColumnInfo {
    /// Whether the declared type has `SQLite` TEXT affinity.
    #[must_use]
    pub fn is_text(&self) -> bool {
        let upper = self.column_type.to_ascii_uppercase();
        !upper.contains("INT")
            && (upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: BTreeMap<String, ColumnInfo>,
}

impl TableSchema {
    /// Case-insensitive column lookup returning the canonical name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<(&str, &ColumnInfo)> {
        self.columns
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(column, info)| (column.as_str(), info))
    }
}

/// Selected subset of a schema: table → columns, canonical names.
pub type SchemaSelection = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: BTreeMap<String, TableSchema>,
}

impl DatabaseSchema {
    /// Case-insensitive table lookup returning the canonical name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<(&str, &TableSchema)> {
        self.tables
            .iter()
            .find(|(table, _)| table.eq_ignore_ascii_case(name))
            .map(|(table, schema)| (table.as_str(), schema))
    }

    /// Fill every column's `referenced_by` list from the foreign keys.
    ///
    /// Loaders call this once after all foreign keys are recorded.
    pub fn link_back_references(&mut self) {
        let mut back: Vec<(ColumnRef, ColumnRef)> = Vec::new();
        for (table, schema) in &self.tables {
            for (column, info) in &schema.columns {
                for target in &info.foreign_keys {
                    back.push((target.clone(), ColumnRef::new(table, column)));
                }
            }
        }

        for (target, source) in back {
            let Some(table) = self
                .tables
                .iter_mut()
                .find(|(name, _)| name.eq_ignore_ascii_case(&target.table))
                .map(|(_, table)| table)
            else {
                continue;
            };
            if let Some(info) = table
                .columns
                .iter_mut()
                .find(|(name, _)| name.eq_ignore_ascii_case(&target.column))
                .map(|(_, info)| info)
            {
                if !info.referenced_by.contains(&source) {
                    info.referenced_by.push(source);
                }
            }
        }
    }

    /// Non-primary-key columns with TEXT affinity, as `(table, column)`.
    #[must_use]
    pub fn text_columns(&self) -> Vec<ColumnRef> {
        self.tables
            .iter()
            .flat_map(|(table, schema)| {
                schema
                    .columns
                    .iter()
                    .filter(|(_, info)| info.is_text() && !info.primary_key)
                    .map(move |(column, _)| ColumnRef::new(table, column))
            })
            .collect()
    }

    /// Validate a raw `table → columns` proposal against this schema.
    ///
    /// Unknown tables and columns are discarded. Every kept table also gets
    /// its primary-key and foreign-key columns so joins stay expressible.
    /// Returns an empty selection when nothing matched.
    #[must_use]
    pub fn resolve_selection(&self, raw: &BTreeMap<String, Vec<String>>) -> SchemaSelection {
        let mut selection = SchemaSelection::new();
        for (raw_table, raw_columns) in raw {
            let Some((table, schema)) = self.table(raw_table) else {
                continue;
            };
            let entry = selection.entry(table.to_string()).or_default();
            for raw_column in raw_columns {
                if let Some((column, _)) = schema.column(raw_column) {
                    if !entry.iter().any(|c| c == column) {
                        entry.push(column.to_string());
                    }
                }
            }
            for (column, info) in &schema.columns {
                if (info.primary_key || !info.foreign_keys.is_empty())
                    && !entry.iter().any(|c| c == column)
                {
                    entry.push(column.clone());
                }
            }
            entry.sort();
        }
        selection.retain(|_, columns| !columns.is_empty());
        selection
    }

    /// Restrict the schema to `selection`. Unknown names are ignored.
    #[must_use]
    pub fn subset(&self, selection: &SchemaSelection) -> Self {
        let mut tables = BTreeMap::new();
        for (table, columns) in selection {
            let Some((name, schema)) = self.table(table) else {
                continue;
            };
            let kept = schema
                .columns
                .iter()
                .filter(|(column, _)| columns.iter().any(|c| c.eq_ignore_ascii_case(column)))
                .map(|(column, info)| (column.clone(), info.clone()))
                .collect();
            tables.insert(name.to_string(), TableSchema { columns: kept });
        }
        Self { tables }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn column(column_type: &str, primary_key: bool) -> ColumnInfo {
        ColumnInfo {
            column_type: column_type.to_string(),
            primary_key,
            ..ColumnInfo::default()
        }
    }

    fn shop() -> DatabaseSchema {
        let mut customers = TableSchema::default();
        customers.columns.insert("id".into(), column("INTEGER", true));
        customers.columns.insert("name".into(), column("TEXT", false));
        customers.columns.insert("city".into(), column("VARCHAR(40)", false));

        let mut orders = TableSchema::default();
        orders.columns.insert("id".into(), column("INTEGER", true));
        orders.columns.insert("amount".into(), column("REAL", false));
        let mut customer_id = column("INTEGER", false);
        customer_id.foreign_keys.push(ColumnRef::new("customers", "id"));
        orders.columns.insert("customer_id".into(), customer_id);

        let mut schema = DatabaseSchema::default();
        schema.tables.insert("customers".into(), customers);
        schema.tables.insert("orders".into(), orders);
        schema.link_back_references();
        schema
    }

    #[rstest]
    #[case("TEXT", true)]
    #[case("varchar(20)", true)]
    #[case("NCHAR", true)]
    #[case("CLOB", true)]
    #[case("INTEGER", false)]
    #[case("REAL", false)]
    #[case("", false)]
    fn text_affinity(#[case] declared: &str, #[case] expected: bool) {
        assert_eq!(column(declared, false).is_text(), expected);
    }

    #[test]
    fn back_references_are_linked() {
        let schema = shop();
        let id = &schema.tables["customers"].columns["id"];
        assert_eq!(id.referenced_by, vec![ColumnRef::new("orders", "customer_id")]);
    }

    #[test]
    fn text_columns_skip_primary_keys_and_numbers() {
        let schema = shop();
        assert_eq!(
            schema.text_columns(),
            vec![
                ColumnRef::new("customers", "city"),
                ColumnRef::new("customers", "name"),
            ]
        );
    }

    #[test]
    fn resolve_selection_canonicalizes_and_adds_keys() {
        let schema = shop();
        let mut raw = BTreeMap::new();
        raw.insert("ORDERS".to_string(), vec!["Amount".to_string(), "bogus".to_string()]);
        raw.insert("missing".to_string(), vec!["x".to_string()]);

        let selection = schema.resolve_selection(&raw);
        let mut expected = SchemaSelection::new();
        expected.insert(
            "orders".into(),
            vec!["amount".into(), "customer_id".into(), "id".into()],
        );
        assert_eq!(selection, expected);
    }

    #[test]
    fn subset_keeps_selected_columns_only() {
        let schema = shop();
        let mut selection = SchemaSelection::new();
        selection.insert("customers".into(), vec!["name".into()]);

        let subset = schema.subset(&selection);
        assert_eq!(subset.tables.len(), 1);
        assert_eq!(
            subset.tables["customers"].columns.keys().collect::<Vec<_>>(),
            vec!["name"]
        );
    }
}
