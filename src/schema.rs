//! Versioned survey schema.
//!
//! Column whitelists, renames, join keys and output projections change with
//! every release of the field survey. They live here as data so that a new
//! survey version is a new `SurveySchema` value (or JSON file), not new code.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a date column is parsed and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateKind {
    /// Calendar date; the time of day is dropped.
    Date,
    /// Full timestamp.
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Header in the source CSV, e.g. `Survey DateTime`.
    pub source: String,
    /// Normalized identifier, e.g. `survey_datetime`.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateColumn {
    pub column: String,
    pub kind: DateKind,
}

/// Month and year columns derived from a date column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodColumns {
    pub date_column: String,
    pub month: String,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTypeRule {
    pub site_column: String,
    pub target: String,
}

/// Use `fallback` when `column` is missing, blank or zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateFallback {
    pub column: String,
    pub fallback: String,
}

/// One source table and how to subset it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub source_file: String,
    pub columns: Vec<ColumnMapping>,
    #[serde(default)]
    pub dates: Vec<DateColumn>,
    #[serde(default)]
    pub period: Option<PeriodColumns>,
    #[serde(default)]
    pub lowercase: Vec<String>,
    /// Columns that get the project-code substitution.
    #[serde(default)]
    pub substitute: Vec<String>,
    #[serde(default)]
    pub system_type: Option<SystemTypeRule>,
    #[serde(default)]
    pub coordinate_fallbacks: Vec<CoordinateFallback>,
    /// File stem of the audit subset CSV.
    pub audit_file: String,
    /// Projection and sort for the audit file; `None` writes the whole
    /// subset in source order.
    #[serde(default)]
    pub audit_columns: Option<Vec<String>>,
    #[serde(default)]
    pub audit_sort: Vec<String>,
}

impl TableSchema {
    /// Column names after renaming, in declared order.
    pub fn targets(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.target.clone()).collect()
    }

    /// Column names after renaming and derivation.
    pub fn derived_columns(&self) -> Vec<String> {
        let mut cols = self.targets();
        if let Some(p) = &self.period {
            cols.push(p.month.clone());
            cols.push(p.year.clone());
        }
        if let Some(s) = &self.system_type {
            cols.push(s.target.clone());
        }
        cols
    }
}

/// Which table a join attaches to its child rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum JoinParent {
    /// A subset source table.
    Table(String),
    /// The raw (unprojected, unsorted, unfiltered) result of another join.
    Join(String),
}

/// A child-driven left join onto a parent, plus its output shaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSchema {
    pub name: String,
    pub child: String,
    pub parent: JoinParent,
    pub child_key: String,
    pub parent_key: String,
    /// Working projection: sorted, filtered, and fed to expansions.
    pub projection: Vec<String>,
    /// Final column order of the written file; defaults to `projection`.
    #[serde(default)]
    pub output_columns: Option<Vec<String>>,
    /// A row survives when at least one of these is non-blank.
    pub discriminators: Vec<String>,
    pub sort_by: Vec<String>,
    /// Assign index labels after the validity filter instead of before it.
    #[serde(default)]
    pub index_after_filter: bool,
    pub output_file: String,
}

impl JoinSchema {
    pub fn output_columns(&self) -> &[String] {
        self.output_columns.as_deref().unwrap_or(&self.projection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub equals: String,
}

/// Row expansion over a filtered join result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionSchema {
    pub name: String,
    pub source: String,
    pub conditions: Vec<Condition>,
    pub projection: Vec<String>,
    pub count_column: String,
    pub id_source: String,
    pub id_separator: String,
    pub id_column: String,
    pub output_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySchema {
    pub version: String,
    /// The table every join chain starts from.
    pub root: String,
    pub tables: Vec<TableSchema>,
    pub joins: Vec<JoinSchema>,
    #[serde(default)]
    pub expansions: Vec<ExpansionSchema>,
}

impl SurveySchema {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn join(&self, name: &str) -> Option<&JoinSchema> {
        self.joins.iter().find(|j| j.name == name)
    }

    /// Columns of a join's raw result: child columns, then parent columns.
    pub fn raw_join_columns(&self, join: &JoinSchema) -> Result<Vec<String>> {
        self.raw_join_columns_at(join, 0)
    }

    fn raw_join_columns_at(&self, join: &JoinSchema, depth: usize) -> Result<Vec<String>> {
        if depth > self.joins.len() {
            return Err(PipelineError::config(format!(
                "join '{}' is part of a parent cycle",
                join.name
            )));
        }
        let child = self
            .table(&join.child)
            .ok_or_else(|| unknown("join", &join.name, "child table", &join.child))?;
        let mut cols = child.derived_columns();
        match &join.parent {
            JoinParent::Table(name) => {
                let parent = self
                    .table(name)
                    .ok_or_else(|| unknown("join", &join.name, "parent table", name))?;
                cols.extend(parent.derived_columns());
            }
            JoinParent::Join(name) => {
                let parent = self
                    .join(name)
                    .ok_or_else(|| unknown("join", &join.name, "parent join", name))?;
                cols.extend(self.raw_join_columns_at(parent, depth + 1)?);
            }
        }
        Ok(cols)
    }

    /// Check every cross reference before any file is touched.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for t in &self.tables {
            if !names.insert(t.name.as_str()) {
                return Err(PipelineError::config(format!("duplicate table '{}'", t.name)));
            }
            let derived = t.derived_columns();
            let cols: HashSet<&str> = derived.iter().map(String::as_str).collect();
            if cols.len() != derived.len() {
                return Err(PipelineError::config(format!(
                    "table '{}' maps two source columns to one name",
                    t.name
                )));
            }
            let mut referenced: Vec<&str> = Vec::new();
            referenced.extend(t.dates.iter().map(|d| d.column.as_str()));
            referenced.extend(t.lowercase.iter().map(String::as_str));
            referenced.extend(t.substitute.iter().map(String::as_str));
            if let Some(p) = &t.period {
                referenced.push(&p.date_column);
            }
            if let Some(s) = &t.system_type {
                referenced.push(&s.site_column);
            }
            for f in &t.coordinate_fallbacks {
                referenced.push(&f.column);
                referenced.push(&f.fallback);
            }
            referenced.extend(t.audit_columns.iter().flatten().map(String::as_str));
            referenced.extend(t.audit_sort.iter().map(String::as_str));
            check_known(&cols, referenced, "table", &t.name)?;
        }
        if self.table(&self.root).is_none() {
            return Err(PipelineError::config(format!(
                "root table '{}' is not defined",
                self.root
            )));
        }

        let mut declared: HashSet<&str> = HashSet::new();
        for j in &self.joins {
            if let JoinParent::Join(parent) = &j.parent {
                if !declared.contains(parent.as_str()) {
                    return Err(PipelineError::config(format!(
                        "join '{}' must be declared after its parent join '{}'",
                        j.name, parent
                    )));
                }
            }
            if !declared.insert(j.name.as_str()) {
                return Err(PipelineError::config(format!("duplicate join '{}'", j.name)));
            }
            let raw = self.raw_join_columns(j)?;
            let raw_set: HashSet<&str> = raw.iter().map(String::as_str).collect();
            if raw_set.len() != raw.len() {
                return Err(PipelineError::config(format!(
                    "join '{}' would produce duplicate column names",
                    j.name
                )));
            }
            check_known(
                &raw_set,
                [j.child_key.as_str()]
                    .into_iter()
                    .chain(j.projection.iter().map(String::as_str)),
                "join",
                &j.name,
            )?;
            let parent_cols = match &j.parent {
                JoinParent::Table(name) => self
                    .table(name)
                    .map(TableSchema::derived_columns)
                    .unwrap_or_default(),
                JoinParent::Join(name) => match self.join(name) {
                    Some(parent) => self.raw_join_columns(parent)?,
                    None => Vec::new(),
                },
            };
            if !parent_cols.contains(&j.parent_key) {
                return Err(unknown("join", &j.name, "parent key", &j.parent_key));
            }
            if j.discriminators.is_empty() {
                return Err(PipelineError::config(format!(
                    "join '{}' needs at least one discriminator",
                    j.name
                )));
            }
            let projected: HashSet<&str> = j.projection.iter().map(String::as_str).collect();
            check_known(
                &projected,
                j.discriminators
                    .iter()
                    .chain(&j.sort_by)
                    .chain(j.output_columns.iter().flatten())
                    .map(String::as_str),
                "join",
                &j.name,
            )?;
        }

        for e in &self.expansions {
            let source = self
                .join(&e.source)
                .ok_or_else(|| unknown("expansion", &e.name, "source join", &e.source))?;
            let available: HashSet<&str> = source.projection.iter().map(String::as_str).collect();
            check_known(
                &available,
                e.conditions
                    .iter()
                    .map(|c| c.column.as_str())
                    .chain(e.projection.iter().map(String::as_str)),
                "expansion",
                &e.name,
            )?;
            let projected: HashSet<&str> = e.projection.iter().map(String::as_str).collect();
            check_known(
                &projected,
                [e.count_column.as_str(), e.id_source.as_str()],
                "expansion",
                &e.name,
            )?;
            if projected.contains(e.id_column.as_str()) {
                return Err(PipelineError::config(format!(
                    "expansion '{}' id column '{}' already exists",
                    e.name, e.id_column
                )));
            }
        }
        Ok(())
    }
}

fn unknown(kind: &str, name: &str, what: &str, value: &str) -> PipelineError {
    PipelineError::config(format!("{kind} '{name}' refers to unknown {what} '{value}'"))
}

fn check_known<'a, I>(known: &HashSet<&str>, referenced: I, kind: &str, name: &str) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for col in referenced {
        if !known.contains(col) {
            return Err(unknown(kind, name, "column", col));
        }
    }
    Ok(())
}
