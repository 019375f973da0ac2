#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dynamic-schema tabular frame with CSV persistence.
//!
//! A [`Frame`] is an ordered set of columns plus rows of
//! [`serde_json::Value`] cells keyed by column name. The column set is
//! deliberately not fixed: weekly cache files can gain columns from new API
//! responses and lose columns that have gone entirely empty, so every reader
//! must tolerate a variable schema.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;

/// A single row: cell values keyed by column name. Cells absent from the
/// map are treated as null.
pub type Row = serde_json::Map<String, Value>;

/// Errors that can occur during frame operations.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is missing from the frame.
    #[error("Missing column: {name}")]
    MissingColumn {
        /// Name of the missing column.
        name: String,
    },
}

/// One sort criterion for [`Frame::sort_by`].
#[derive(Debug, Clone)]
pub struct SortKey {
    /// Column to sort on.
    pub column: String,
    /// Sort direction.
    pub ascending: bool,
}

impl SortKey {
    /// Ascending sort on `column`.
    #[must_use]
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_owned(),
            ascending: true,
        }
    }

    /// Descending sort on `column`.
    #[must_use]
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_owned(),
            ascending: false,
        }
    }
}

/// An ordered-column table of dynamic rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Frame {
    /// Creates an empty frame with no columns and no rows.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Builds a frame from records, with columns in first-seen order across
    /// all rows.
    #[must_use]
    pub fn from_records(records: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &records {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self {
            columns,
            rows: records,
        }
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` when the frame has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in output order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The rows of this frame.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// `true` when a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Reads a CSV file into a frame.
    ///
    /// Cell scalars are inferred: integers, then floats, then strings; empty
    /// cells become null and are omitted from the row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if the file cannot be read or parsed.
    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_owned())
            .collect();

        let mut rows: Vec<Row> = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let cell = infer_scalar(record.get(i).unwrap_or(""));
                if !cell.is_null() {
                    row.insert(column.clone(), cell);
                }
            }
            rows.push(row);
        }

        log::debug!("Read {} rows from {}", rows.len(), path.display());

        Ok(Self { columns, rows })
    }

    /// Writes the frame as CSV, preserving column order. Null and missing
    /// cells become empty fields.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if the file cannot be written.
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|column| row.get(column).map_or_else(String::new, cell_to_string))
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;

        log::debug!("Wrote {} rows to {}", self.rows.len(), path.display());

        Ok(())
    }

    /// Concatenates frames row-wise. The column set is the union in
    /// first-seen order.
    #[must_use]
    pub fn concat(frames: Vec<Self>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Row> = Vec::new();
        for frame in frames {
            for column in frame.columns {
                if !columns.iter().any(|c| *c == column) {
                    columns.push(column);
                }
            }
            rows.extend(frame.rows);
        }
        Self { columns, rows }
    }

    /// Stable multi-key sort. Null and missing cells order after every
    /// non-null value in ascending direction.
    pub fn sort_by(&mut self, keys: &[SortKey]) {
        self.rows.sort_by(|a, b| {
            for key in keys {
                let ordering = cmp_cells(a.get(&key.column), b.get(&key.column));
                let ordering = if key.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Drops rows whose `subset` cell values repeat an earlier row, keeping
    /// the first occurrence.
    pub fn dedup_by(&mut self, subset: &[&str]) {
        let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();
        self.rows.retain(|row| {
            let key: Vec<String> = subset
                .iter()
                .map(|column| row.get(*column).map_or_else(String::new, cell_to_string))
                .collect();
            seen.insert(key)
        });
    }

    /// Removes every column whose cells are null (or missing) in all rows.
    /// No-op on a frame without rows.
    pub fn drop_empty_columns(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let empty: Vec<String> = self
            .columns
            .iter()
            .filter(|column| {
                self.rows
                    .iter()
                    .all(|row| row.get(*column).is_none_or(Value::is_null))
            })
            .cloned()
            .collect();
        for column in &empty {
            self.remove_column(column);
        }
    }

    /// Removes the named columns. Names not present are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        for name in names {
            self.remove_column(name);
        }
    }

    fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c != name);
        for row in &mut self.rows {
            row.remove(name);
        }
    }

    /// Returns the rows whose `column` cell (in string form) is in `allowed`.
    #[must_use]
    pub fn filter_in(&self, column: &str, allowed: &[String]) -> Self {
        let rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|row| {
                row.get(column)
                    .is_some_and(|cell| allowed.iter().any(|v| *v == cell_to_string(cell)))
            })
            .cloned()
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Inserts a constant-valued column at `index` in the column order,
    /// replacing any previous column of the same name.
    pub fn insert_const(&mut self, index: usize, name: &str, value: &Value) {
        self.columns.retain(|c| c != name);
        let index = index.min(self.columns.len());
        self.columns.insert(index, name.to_owned());
        for row in &mut self.rows {
            row.insert(name.to_owned(), value.clone());
        }
    }

    /// Appends a constant-valued column, replacing any previous column of
    /// the same name.
    pub fn set_const(&mut self, name: &str, value: &Value) {
        self.insert_const(self.columns.len(), name, value);
    }

    /// Moves the listed columns (those that exist) to the front of the
    /// column order, keeping the remaining columns in their current order.
    pub fn reorder_front(&mut self, names: &[&str]) {
        let mut ordered: Vec<String> = names
            .iter()
            .filter(|name| self.has_column(name))
            .map(|name| (*name).to_owned())
            .collect();
        ordered.extend(
            self.columns
                .iter()
                .filter(|c| !names.contains(&c.as_str()))
                .cloned(),
        );
        self.columns = ordered;
    }

    /// Rewrites every cell of `column` through `f`, which also sees missing
    /// cells as `None`. Returning `None` clears the cell. No-op when the
    /// column is absent.
    pub fn map_column(&mut self, column: &str, f: impl Fn(Option<&Value>) -> Option<Value>) {
        if !self.has_column(column) {
            return;
        }
        for row in &mut self.rows {
            match f(row.get(column)) {
                Some(value) => {
                    row.insert(column.to_owned(), value);
                }
                None => {
                    row.remove(column);
                }
            }
        }
    }

    /// Inserts `target` immediately after `source` in the column order,
    /// computing each cell from the source cell. Replaces any previous
    /// `target` column; no-op when `source` is absent.
    pub fn derive_column(
        &mut self,
        source: &str,
        target: &str,
        f: impl Fn(Option<&Value>) -> Option<Value>,
    ) {
        self.columns.retain(|c| c != target);
        let Some(position) = self.columns.iter().position(|c| c == source) else {
            return;
        };
        self.columns.insert(position + 1, target.to_owned());
        for row in &mut self.rows {
            match f(row.get(source)) {
                Some(value) => {
                    row.insert(target.to_owned(), value);
                }
                None => {
                    row.remove(target);
                }
            }
        }
    }

    /// Renames columns via `(from, to)` pairs. Missing names are ignored.
    pub fn rename_columns(&mut self, renames: &[(&str, &str)]) {
        for (from, to) in renames {
            if let Some(column) = self.columns.iter_mut().find(|c| c == from) {
                (*to).clone_into(column);
            }
            for row in &mut self.rows {
                if let Some(cell) = row.remove(*from) {
                    row.insert((*to).to_owned(), cell);
                }
            }
        }
    }

    /// Projects the frame onto the named columns, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumn`] if any name is absent.
    pub fn select(&self, names: &[&str]) -> Result<Self, TableError> {
        for name in names {
            if !self.has_column(name) {
                return Err(TableError::MissingColumn {
                    name: (*name).to_owned(),
                });
            }
        }
        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|row| {
                let mut projected = Row::new();
                for name in names {
                    if let Some(cell) = row.get(*name) {
                        projected.insert((*name).to_owned(), cell.clone());
                    }
                }
                projected
            })
            .collect();
        Ok(Self {
            columns: names.iter().map(|n| (*n).to_owned()).collect(),
            rows,
        })
    }
}

/// Infers a scalar cell value from a CSV field: integer, then float, then
/// string. Empty (or whitespace-only) fields become null.
#[must_use]
pub fn infer_scalar(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = trimmed.parse::<f64>()
        && let Some(number) = serde_json::Number::from_f64(float)
    {
        return Value::Number(number);
    }
    Value::String(trimmed.to_owned())
}

/// Renders a cell for CSV output. Null becomes an empty field; numbers and
/// booleans use their plain form; nested values fall back to JSON text.
#[must_use]
pub fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Coerces a cell to an integer. Floats truncate; numeric strings parse.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn as_i64(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Coerces a cell to a float. Numeric strings parse.
#[must_use]
pub fn as_f64(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Compares two cells: numbers numerically, strings lexicographically,
/// numbers before strings, null/missing after everything.
#[must_use]
pub fn cmp_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank_a = cell_rank(a);
    let rank_b = cell_rank(b);
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Some(left), Some(right)) => match (as_f64(left), as_f64(right)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => cell_to_string(left).cmp(&cell_to_string(right)),
        },
        _ => Ordering::Equal,
    }
}

/// Type rank used by [`cmp_cells`] before value comparison: numeric cells
/// first, then strings and booleans, then null/missing.
fn cell_rank(cell: Option<&Value>) -> u8 {
    match cell {
        Some(value) if as_f64(value).is_some() => 0,
        Some(Value::String(_) | Value::Bool(_)) => 1,
        Some(Value::Null) | None => 3,
        Some(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let mut row = Row::new();
        for (key, value) in pairs {
            if !value.is_null() {
                row.insert((*key).to_owned(), value.clone());
            }
        }
        row
    }

    #[test]
    fn csv_round_trip_preserves_content() {
        let frame = Frame::from_records(vec![
            row(&[
                ("geocode", json!(3_106_200)),
                ("municipio", json!("Divinópolis")),
                ("casos", json!(12)),
            ]),
            row(&[
                ("geocode", json!(3_114_406)),
                ("municipio", json!("Carmo do Cajuru")),
                ("casos", Value::Null),
            ]),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round_trip.csv");
        frame.write_csv(&path).unwrap();
        let read = Frame::read_csv(&path).unwrap();

        assert_eq!(read, frame);
    }

    #[test]
    fn infers_scalar_types() {
        assert_eq!(infer_scalar("202403"), json!(202_403));
        assert_eq!(infer_scalar("0.85"), json!(0.85));
        assert_eq!(infer_scalar("dengue"), json!("dengue"));
        assert_eq!(infer_scalar("  "), Value::Null);
    }

    #[test]
    fn sort_by_orders_multi_key() {
        let mut frame = Frame::from_records(vec![
            row(&[("disease", json!("dengue")), ("SE", json!(202_401))]),
            row(&[("disease", json!("chikungunya")), ("SE", json!(202_403))]),
            row(&[("disease", json!("dengue")), ("SE", json!(202_405))]),
        ]);

        frame.sort_by(&[SortKey::asc("disease"), SortKey::desc("SE")]);

        let weeks: Vec<Option<i64>> = frame
            .rows()
            .iter()
            .map(|r| r.get("SE").and_then(as_i64))
            .collect();
        assert_eq!(
            weeks,
            vec![Some(202_403), Some(202_405), Some(202_401)]
        );
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut frame = Frame::from_records(vec![
            row(&[("geocode", json!(3_106_200)), ("municipio", json!("first"))]),
            row(&[("geocode", json!(3_106_200)), ("municipio", json!("second"))]),
            row(&[("geocode", json!(3_114_406)), ("municipio", json!("other"))]),
        ]);

        frame.dedup_by(&["geocode"]);

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.rows()[0].get("municipio"), Some(&json!("first")));
    }

    #[test]
    fn drop_empty_columns_removes_only_all_null() {
        let mut frame = Frame::from_records(vec![
            row(&[("a", json!(1)), ("b", Value::Null), ("c", json!("x"))]),
            row(&[("a", Value::Null), ("b", Value::Null), ("c", json!("y"))]),
        ]);
        // Column "b" was never materialized in any row.
        frame.columns = vec!["a".into(), "b".into(), "c".into()];

        frame.drop_empty_columns();

        assert_eq!(frame.columns(), &["a".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn concat_unions_columns_in_first_seen_order() {
        let left = Frame::from_records(vec![row(&[("a", json!(1)), ("b", json!(2))])]);
        let right = Frame::from_records(vec![row(&[("b", json!(3)), ("c", json!(4))])]);

        let merged = Frame::concat(vec![left, right]);

        assert_eq!(
            merged.columns(),
            &["a".to_owned(), "b".to_owned(), "c".to_owned()]
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn filter_in_matches_string_form() {
        let frame = Frame::from_records(vec![
            row(&[("uf", json!("MG"))]),
            row(&[("uf", json!("SP"))]),
        ]);

        let filtered = frame.filter_in("uf", &["MG".to_owned()]);

        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn insert_const_places_column() {
        let mut frame = Frame::from_records(vec![row(&[("casos", json!(3))])]);
        frame.insert_const(0, "geocode", &json!(3_106_200));
        frame.insert_const(0, "disease", &json!("dengue"));

        assert_eq!(
            frame.columns(),
            &["disease".to_owned(), "geocode".to_owned(), "casos".to_owned()]
        );
        assert_eq!(frame.rows()[0].get("disease"), Some(&json!("dengue")));
    }

    #[test]
    fn reorder_front_moves_named_columns() {
        let mut frame =
            Frame::from_records(vec![row(&[("x", json!(1)), ("y", json!(2)), ("z", json!(3))])]);
        frame.reorder_front(&["z", "x"]);

        assert_eq!(
            frame.columns(),
            &["z".to_owned(), "x".to_owned(), "y".to_owned()]
        );
    }

    #[test]
    fn map_column_sees_missing_cells() {
        let mut frame = Frame::from_records(vec![
            row(&[("casos", json!(3))]),
            row(&[("SE", json!(202_401))]),
        ]);
        frame.map_column("casos", |cell| {
            Some(Value::from(cell.and_then(as_i64).unwrap_or(0)))
        });

        assert_eq!(frame.rows()[0].get("casos"), Some(&json!(3)));
        assert_eq!(frame.rows()[1].get("casos"), Some(&json!(0)));
    }

    #[test]
    fn derive_column_inserts_after_source() {
        let mut frame =
            Frame::from_records(vec![row(&[("SE", json!(202_403)), ("casos", json!(1))])]);
        frame.derive_column("SE", "ano", |cell| {
            cell.and_then(as_i64).map(|se| Value::from(se / 100))
        });

        assert_eq!(
            frame.columns(),
            &["SE".to_owned(), "ano".to_owned(), "casos".to_owned()]
        );
        assert_eq!(frame.rows()[0].get("ano"), Some(&json!(2024)));
    }

    #[test]
    fn select_errors_on_missing_column() {
        let frame = Frame::from_records(vec![row(&[("a", json!(1))])]);
        assert!(matches!(
            frame.select(&["a", "missing"]),
            Err(TableError::MissingColumn { .. })
        ));
    }
}
