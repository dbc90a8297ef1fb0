//! Row expansion: one output row per declared sub-unit.

use crate::error::{PipelineError, Result};
use crate::schema::ExpansionSchema;
use crate::types::{Table, Value};
use crate::util::{parse_count, MAX_COUNT};
use log::info;

/// Rows of `source` that satisfy every equality condition, projected.
pub fn select_eligible(source: &Table, spec: &ExpansionSchema) -> Result<Table> {
    let conditions = spec
        .conditions
        .iter()
        .map(|c| Ok((source.require(&c.column)?, c.equals.as_str())))
        .collect::<Result<Vec<_>>>()?;
    let mut eligible = source.project(&spec.projection)?;
    eligible.rename(spec.name.clone());

    let keep: Vec<bool> = source
        .rows()
        .iter()
        .map(|row| {
            conditions
                .iter()
                .all(|&(idx, want)| row.values[idx].as_str() == Some(want))
        })
        .collect();
    let mut pos = 0;
    eligible.retain(|_| {
        let k = keep[pos];
        pos += 1;
        k
    });
    Ok(eligible)
}

/// Repeat each row `count_column` times and append a synthesized id.
///
/// The id is `<id_source><id_separator><n>` where `n` is the row's position
/// in the whole expanded table, so numbering continues across source rows
/// rather than restarting at each one. Output rows are labelled 0..N.
/// Validation errors report the source row's label, which is the index
/// written alongside it in the source table's CSV.
pub fn expand_rows(rows: &Table, spec: &ExpansionSchema) -> Result<Table> {
    let count_idx = rows.require(&spec.count_column)?;
    let id_idx = rows.require(&spec.id_source)?;

    let mut columns = rows.columns().to_vec();
    columns.push(spec.id_column.clone());
    let mut out = Table::new(spec.name.clone(), columns)?;

    for row in rows.rows() {
        let raw = &row.values[count_idx];
        let count = match parse_count(raw.as_str()) {
            Some(n) if n >= 1 => n,
            _ => {
                return Err(PipelineError::Validation {
                    table: spec.name.clone(),
                    row: row.label,
                    column: spec.count_column.clone(),
                    value: raw.render(),
                    reason: format!("is not a whole number from 1 to {MAX_COUNT}"),
                })
            }
        };
        let source_id = match &row.values[id_idx] {
            Value::Text(id) if !id.is_empty() => id.clone(),
            other => {
                return Err(PipelineError::Validation {
                    table: spec.name.clone(),
                    row: row.label,
                    column: spec.id_source.clone(),
                    value: other.render(),
                    reason: "is required to build expanded ids".to_string(),
                })
            }
        };
        for _ in 0..count {
            let n = out.len();
            let mut values = row.values.clone();
            values.push(Value::Text(format!("{source_id}{}{n}", spec.id_separator)));
            out.push(values);
        }
    }
    info!(
        "{}: expanded {} rows into {}",
        spec.name,
        rows.len(),
        out.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Condition;

    fn spec() -> ExpansionSchema {
        ExpansionSchema {
            name: "subcore".to_string(),
            source: "collection".to_string(),
            conditions: vec![
                Condition {
                    column: "collection_type".to_string(),
                    equals: "sed_sample".to_string(),
                },
                Condition {
                    column: "subcores_taken".to_string(),
                    equals: "yes".to_string(),
                },
            ],
            projection: vec!["collection_GlobalID".to_string(), "number_subcores".to_string()],
            count_column: "number_subcores".to_string(),
            id_source: "collection_GlobalID".to_string(),
            id_separator: "-SC".to_string(),
            id_column: "sample_global_id".to_string(),
            output_file: "subcore".to_string(),
        }
    }

    fn collection(rows: &[(&str, &str, &str, &str)]) -> Table {
        let cols = ["collection_GlobalID", "collection_type", "subcores_taken", "number_subcores"];
        let mut t = Table::new("c", cols.iter().map(|c| c.to_string()).collect()).unwrap();
        for (id, kind, taken, n) in rows {
            t.push(vec![
                Value::from_cell(id),
                Value::from_cell(kind),
                Value::from_cell(taken),
                Value::from_cell(n),
            ]);
        }
        t
    }

    #[test]
    fn selects_sediment_rows_with_subcores() {
        let t = collection(&[
            ("A", "sed_sample", "yes", "2"),
            ("B", "water_sample", "yes", "1"),
            ("C", "sed_sample", "no", ""),
            ("D", "sed_sample", "yes", "1"),
        ]);
        let eligible = select_eligible(&t, &spec()).unwrap();
        let ids: Vec<_> = eligible.rows().iter().map(|r| r.values[0].render()).collect();
        assert_eq!(ids, ["A", "D"]);
        assert_eq!(eligible.columns(), ["collection_GlobalID", "number_subcores"]);
    }

    #[test]
    fn repeats_rows_with_global_suffix() {
        let t = collection(&[("A", "sed_sample", "yes", "3"), ("B", "sed_sample", "yes", "2.0")]);
        let eligible = select_eligible(&t, &spec()).unwrap();
        let out = expand_rows(&eligible, &spec()).unwrap();
        let ids: Vec<_> = out
            .rows()
            .iter()
            .map(|r| r.values[2].render())
            .collect();
        assert_eq!(ids, ["A-SC0", "A-SC1", "A-SC2", "B-SC3", "B-SC4"]);
        let labels: Vec<_> = out.rows().iter().map(|r| r.label).collect();
        assert_eq!(labels, [0, 1, 2, 3, 4]);
        assert_eq!(out.columns().last().map(String::as_str), Some("sample_global_id"));
    }

    #[test]
    fn zero_missing_or_garbage_counts_fail() {
        for bad in ["0", "", "lots", "1.5", "5000000000", "5000000000.0"] {
            let t = collection(&[("A", "sed_sample", "yes", bad)]);
            let eligible = select_eligible(&t, &spec()).unwrap();
            let err = expand_rows(&eligible, &spec()).unwrap_err();
            assert!(
                matches!(err, PipelineError::Validation { ref column, .. } if column == "number_subcores"),
                "count {bad:?} gave {err}"
            );
        }
    }

    #[test]
    fn bad_count_reports_source_row_label() {
        let t = collection(&[
            ("A", "water_sample", "", ""),
            ("B", "sed_sample", "yes", "2"),
            ("C", "sed_sample", "yes", "many"),
        ]);
        let eligible = select_eligible(&t, &spec()).unwrap();
        let err = expand_rows(&eligible, &spec()).unwrap_err();
        assert!(
            matches!(err, PipelineError::Validation { row: 2, ref value, .. } if value == "many"),
            "{err}"
        );
    }
}
