//! Flat, append-only tables.
//!
//! Every tabular output of the runtime (collector histories, batch
//! results, event tables) is a [`Table`]: a fixed header and rows of
//! [`Value`]s of exactly the header's width.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::value::Value;

/// A rectangular table with named columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table with the given header.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Column names, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows, in append order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// [`ConfigError::RowWidth`] if the row length differs from the
    /// column count. The table is unchanged on error.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ConfigError> {
        if row.len() != self.columns.len() {
            return Err(ConfigError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append a record, matching fields to columns by name.
    ///
    /// Columns absent from the record are filled with `Null`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] naming the first record field
    /// that has no matching column.
    pub fn push_record(&mut self, record: &Record) -> Result<(), ConfigError> {
        if let Some(unknown) = record.keys().find(|k| self.column_index(k).is_none()) {
            return Err(ConfigError::invalid(unknown, "no such column"));
        }
        let row = self
            .columns
            .iter()
            .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        self.rows.push(row);
        Ok(())
    }

    /// Cell at `(row, column name)`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Iterate one column top to bottom.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[col]))
    }

    /// Append every row of `other`, which must have the same header.
    ///
    /// # Errors
    ///
    /// [`ConfigError::RowWidth`] when the headers differ in width, or
    /// [`ConfigError::InvalidParameter`] when they differ in names.
    pub fn append(&mut self, other: Table) -> Result<(), ConfigError> {
        if other.columns.len() != self.columns.len() {
            return Err(ConfigError::RowWidth {
                expected: self.columns.len(),
                actual: other.columns.len(),
            });
        }
        if other.columns != self.columns {
            return Err(ConfigError::invalid("columns", "headers differ"));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Rows as name → value records.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows.iter().map(move |row| {
            Record(
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect(),
            )
        })
    }
}

/// An ordered set of named values, e.g. one event-table row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record(pub IndexMap<String, Value>);

impl Record {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or overwrite a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
