use crate::error::{PipelineError, Result};
use crate::schema::{DateKind, TableSchema};
use crate::types::{Row, Table, Value};
use crate::util::{parse_datetime_safe, parse_f64_safe, system_type};
use csv::ReaderBuilder;
use log::{debug, info};
use regex::Regex;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub coordinates_filled: usize,
    pub substituted_cells: usize,
}

/// Read a repaired CSV and subset it per `schema`: whitelist and rename the
/// columns, parse dates, then derive and normalize fields.
///
/// Every whitelisted column must be present; otherwise nothing is returned.
pub fn load_table(
    schema: &TableSchema,
    path: &Path,
    substitutions: &[(Regex, String)],
) -> Result<(Table, LoadReport)> {
    info!("[START] subset {} from {}", schema.name, path.display());
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| PipelineError::csv(path, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut positions = Vec::with_capacity(schema.columns.len());
    let mut missing = Vec::new();
    for mapping in &schema.columns {
        match headers.iter().position(|h| *h == mapping.source) {
            Some(pos) => positions.push(pos),
            None => missing.push(mapping.source.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns {
            table: schema.name.clone(),
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    let mut table = Table::new(schema.name.clone(), schema.targets())?;
    let mut report = LoadReport::default();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| PipelineError::csv(path, e))?;
        if record.len() > headers.len() {
            return Err(PipelineError::Validation {
                table: schema.name.clone(),
                row: line,
                column: String::new(),
                value: format!("{} fields", record.len()),
                reason: format!("exceeds the {} header fields", headers.len()),
            });
        }
        // Short records are padded with missing cells.
        let values = positions
            .iter()
            .map(|&pos| record.get(pos).map_or(Value::Missing, Value::from_cell))
            .collect();
        table.push(values);
        report.total_rows += 1;
    }

    normalize(schema, &mut table, substitutions, &mut report)?;
    info!(
        "[END] subset {} ({} rows, {} columns)",
        schema.name,
        table.len(),
        table.columns().len()
    );
    Ok((table, report))
}

/// Apply the per-table transforms to a freshly loaded subset.
pub fn normalize(
    schema: &TableSchema,
    table: &mut Table,
    substitutions: &[(Regex, String)],
    report: &mut LoadReport,
) -> Result<()> {
    let name = schema.name.clone();
    for date in &schema.dates {
        let column = date.column.clone();
        let kind = date.kind;
        table.try_map_column(&date.column, |_, v| match v {
            Value::Text(s) => match parse_datetime_safe(Some(s.as_str())) {
                Some(ts) if kind == DateKind::Date => Ok(Value::Date(ts.date())),
                Some(ts) => Ok(Value::Timestamp(ts)),
                None if s.trim().is_empty() => Ok(Value::Missing),
                None => Err(PipelineError::InvalidDate {
                    table: name.clone(),
                    column: column.clone(),
                    value: s,
                }),
            },
            other => Ok(other),
        })?;
    }

    if let Some(period) = &schema.period {
        let part = |t: &Table, r: &Row, fmt: &str| match t.get(r, &period.date_column) {
            Some(Value::Date(d)) => Value::text(d.format(fmt).to_string()),
            Some(Value::Timestamp(ts)) => Value::text(ts.format(fmt).to_string()),
            _ => Value::Missing,
        };
        table.add_column(&period.month, |t, r| part(t, r, "%m"))?;
        table.add_column(&period.year, |t, r| part(t, r, "%Y"))?;
    }

    for column in &schema.substitute {
        let mut changed = 0usize;
        table.map_column(column, |v| match v {
            Value::Text(s) => {
                let mut out = s.clone();
                for (re, label) in substitutions {
                    out = re.replace_all(&out, label.as_str()).into_owned();
                }
                if out != s {
                    changed += 1;
                }
                Value::Text(out)
            }
            other => other,
        })?;
        debug!("{}: substituted project codes in {} cells", schema.name, changed);
        report.substituted_cells += changed;
    }

    if let Some(rule) = &schema.system_type {
        table.add_column(&rule.target, |t, r| {
            match t.get(r, &rule.site_column).and_then(Value::as_str) {
                Some(site) => system_type(site).map_or(Value::Missing, Value::Text),
                None => Value::Missing,
            }
        })?;
    }

    for column in &schema.lowercase {
        table.map_column(column, |v| match v {
            Value::Text(s) => Value::Text(s.to_lowercase()),
            other => other,
        })?;
    }

    for fallback in &schema.coordinate_fallbacks {
        let from = table.require(&fallback.fallback)?;
        let filled = fill_coordinates(table, &fallback.column, from)?;
        report.coordinates_filled += filled;
    }
    Ok(())
}

/// Replace missing, blank or zero coordinates with the captured GPS value.
fn fill_coordinates(table: &mut Table, column: &str, from: usize) -> Result<usize> {
    let target = table.require(column)?;
    let fills: Vec<Option<Value>> = table
        .rows()
        .iter()
        .map(|row| {
            let current = &row.values[target];
            let unusable = current.is_blank() || parse_f64_safe(current.as_str()) == Some(0.0);
            unusable.then(|| row.values[from].clone())
        })
        .collect();
    let mut filled = 0;
    table.try_map_column(column, |pos, v| {
        Ok(match &fills[pos] {
            Some(replacement) => {
                filled += 1;
                replacement.clone()
            }
            None => v,
        })
    })?;
    Ok(filled)
}
