use crate::error::{PipelineError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A single cell. Empty CSV cells load as `Missing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Missing,
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Build from a raw CSV cell: empty stays missing, everything else is text.
    pub fn from_cell(cell: &str) -> Self {
        if cell.is_empty() {
            Value::Missing
        } else {
            Value::Text(cell.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Missing, or text that is empty.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The text written to output CSVs.
    pub fn render(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Date(_) | Value::Timestamp(_) => 0,
            Value::Text(_) => 1,
            Value::Missing => 2,
        }
    }

    /// Ordering used by table sorts. Missing values sort last.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Date(a), Value::Timestamp(b)) => a.and_time(chrono::NaiveTime::MIN).cmp(b),
            (Value::Timestamp(a), Value::Date(b)) => a.cmp(&b.and_time(chrono::NaiveTime::MIN)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Value of the leading index column.
    pub label: usize,
    pub values: Vec<Value>,
}

/// An in-memory table with named columns and labelled rows.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    lookup: HashMap<String, usize>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self> {
        let name = name.into();
        let mut lookup = HashMap::with_capacity(columns.len());
        for (idx, col) in columns.iter().enumerate() {
            if lookup.insert(col.clone(), idx).is_some() {
                return Err(PipelineError::DuplicateColumn {
                    table: name,
                    column: col.clone(),
                });
            }
        }
        Ok(Self {
            name,
            columns,
            lookup,
            rows: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row labelled with its position.
    pub fn push(&mut self, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        let label = self.rows.len();
        self.rows.push(Row { label, values });
    }

    pub fn push_labelled(&mut self, label: usize, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push(Row { label, values });
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.lookup.get(column).copied()
    }

    /// Like `column_index`, but a missing column is a schema error.
    pub fn require(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| PipelineError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r.values[idx])
    }

    /// New table holding only `columns`, in that order. Labels are kept.
    pub fn project(&self, columns: &[String]) -> Result<Table> {
        let indices = columns
            .iter()
            .map(|c| self.require(c))
            .collect::<Result<Vec<_>>>()?;
        let mut out = Table::new(self.name.clone(), columns.to_vec())?;
        for row in &self.rows {
            let values = indices.iter().map(|&i| row.values[i].clone()).collect();
            out.push_labelled(row.label, values);
        }
        Ok(out)
    }

    /// Stable ascending sort on the given key columns.
    pub fn sort_by_columns(&mut self, keys: &[String]) -> Result<()> {
        let indices = keys
            .iter()
            .map(|k| self.require(k))
            .collect::<Result<Vec<_>>>()?;
        self.rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a.values[i].sort_cmp(&b.values[i]))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(())
    }

    /// Assign fresh 0-based labels in current row order.
    pub fn relabel(&mut self) {
        for (idx, row) in self.rows.iter_mut().enumerate() {
            row.label = idx;
        }
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Row) -> bool,
    {
        self.rows.retain(keep);
    }

    /// Rewrite every value of one column in place.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> Result<()>
    where
        F: FnMut(Value) -> Value,
    {
        let idx = self.require(column)?;
        for row in &mut self.rows {
            let old = std::mem::replace(&mut row.values[idx], Value::Missing);
            row.values[idx] = f(old);
        }
        Ok(())
    }

    /// Fallible variant of `map_column`; `f` also receives the row position.
    pub fn try_map_column<F>(&mut self, column: &str, mut f: F) -> Result<()>
    where
        F: FnMut(usize, Value) -> Result<Value>,
    {
        let idx = self.require(column)?;
        for (pos, row) in self.rows.iter_mut().enumerate() {
            let old = std::mem::replace(&mut row.values[idx], Value::Missing);
            row.values[idx] = f(pos, old)?;
        }
        Ok(())
    }

    /// Append a column computed from each row.
    pub fn add_column<F>(&mut self, column: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&Table, &Row) -> Value,
    {
        if self.lookup.contains_key(column) {
            return Err(PipelineError::DuplicateColumn {
                table: self.name.clone(),
                column: column.to_string(),
            });
        }
        let this: &Table = self;
        let computed: Vec<Value> = this.rows.iter().map(|r| f(this, r)).collect();
        for (row, value) in self.rows.iter_mut().zip(computed) {
            row.values.push(value);
        }
        self.lookup.insert(column.to_string(), self.columns.len());
        self.columns.push(column.to_string());
        Ok(())
    }

    /// Value of `column` in `row`; the column must exist.
    pub fn get<'a>(&self, row: &'a Row, column: &str) -> Option<&'a Value> {
        self.column_index(column).map(|i| &row.values[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new("t", vec!["id".into(), "day".into()]).unwrap();
        let d = |s: &str| Value::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap());
        t.push(vec![Value::text("b"), d("2021-06-02")]);
        t.push(vec![Value::text("a"), Value::Missing]);
        t.push(vec![Value::text("c"), d("2021-06-01")]);
        t
    }

    #[test]
    fn duplicate_columns_rejected() {
        let err = Table::new("t", vec!["a".into(), "a".into()]).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateColumn { .. }));
    }

    #[test]
    fn sort_puts_missing_last_and_keeps_labels_until_relabel() {
        let mut t = sample();
        t.sort_by_columns(&["day".into()]).unwrap();
        let ids: Vec<_> = t.rows().iter().map(|r| r.values[0].render()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
        assert_eq!(t.rows()[0].label, 2);
        t.relabel();
        assert_eq!(t.rows()[0].label, 0);
    }

    #[test]
    fn project_reorders_and_rejects_unknown() {
        let t = sample();
        let p = t.project(&["day".into(), "id".into()]).unwrap();
        assert_eq!(p.columns(), ["day", "id"]);
        assert_eq!(p.rows()[0].values[1], Value::text("b"));
        assert!(matches!(
            t.project(&["nope".into()]),
            Err(PipelineError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn renders_dates_and_timestamps() {
        let ts = NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        assert_eq!(Value::Timestamp(ts).render(), "2021-06-01 13:45:00.000000");
        assert_eq!(Value::Date(ts.date()).render(), "2021-06-01");
        assert_eq!(Value::Missing.render(), "");
    }
}
