use crate::error::{PipelineError, Result};
use crate::types::Table;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};
use tempfile::NamedTempFile;

/// Write `bytes` to `path` through a temporary file in the same directory,
/// so a failed write never leaves a truncated file behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| PipelineError::io(path, e))?;
    tmp.persist(path).map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}

/// Serialize a table as CSV: an unnamed index column first, then the
/// table's columns in order. Overwrites any existing file.
pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    let mut header = Vec::with_capacity(table.columns().len() + 1);
    header.push(String::new());
    header.extend(table.columns().iter().cloned());
    wtr.write_record(&header)
        .map_err(|e| PipelineError::csv(path, e))?;
    for row in table.rows() {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.label.to_string());
        record.extend(row.values.iter().map(|v| v.render()));
        wtr.write_record(&record)
            .map_err(|e| PipelineError::csv(path, e))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| PipelineError::io(path, e.into_error()))?;
    write_atomic(path, &bytes)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)
        .map_err(|e| PipelineError::config(format!("cannot serialize {}: {e}", path.display())))?;
    write_atomic(path, s.as_bytes())
}

/// Print the first `max_rows` rows of a table as markdown.
pub fn preview_table(title: &str, table: &Table, max_rows: usize) {
    println!("{}\n", title);
    if table.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    let mut header = vec![String::new()];
    header.extend(table.columns().iter().cloned());
    builder.push_record(header);
    for row in table.rows().iter().take(max_rows) {
        let mut record = vec![row.label.to_string()];
        record.extend(row.values.iter().map(|v| v.render()));
        builder.push_record(record);
    }
    let table_str = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use tempfile::TempDir;

    #[test]
    fn writes_index_column_and_quotes_when_needed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut t = Table::new("t", vec!["id".into(), "notes".into()]).unwrap();
        t.push_labelled(4, vec![Value::text("S1"), Value::text("a, b")]);
        t.push_labelled(7, vec![Value::text("S2"), Value::Missing]);
        write_csv(&path, &t).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            ",id,notes\n4,S1,\"a, b\"\n7,S2,\n"
        );
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "stale contents that are longer than the new file\n").unwrap();
        let t = Table::new("t", vec!["id".into()]).unwrap();
        write_csv(&path, &t).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), ",id\n");
    }
}
