//! Child-driven left joins.
//!
//! Every child row is emitted once per matching parent row; a child without
//! a parent keeps missing parent fields. Parents without children never
//! appear.

use crate::error::{PipelineError, Result};
use crate::types::{Table, Value};
use log::{debug, error, info};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub matched: usize,
    pub orphans: usize,
    /// Parent keys held by more than one parent row.
    pub duplicate_keys: Vec<String>,
}

/// Left join `child` onto `parent` where `child[child_key] = parent[parent_key]`.
///
/// Output columns are the child's followed by the parent's. With `strict`
/// set, a parent key shared by several rows is an error; otherwise it is
/// logged and each match produces a row.
pub fn left_join(
    name: &str,
    child: &Table,
    child_key: &str,
    parent: &Table,
    parent_key: &str,
    strict: bool,
) -> Result<(Table, JoinReport)> {
    let ck = child.require(child_key)?;
    let pk = parent.require(parent_key)?;

    let mut by_key: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, row) in parent.rows().iter().enumerate() {
        if let Some(key) = row.values[pk].as_str() {
            by_key.entry(key).or_default().push(idx);
        }
    }

    let mut report = JoinReport::default();
    let mut duplicates: Vec<(&str, usize)> = by_key
        .iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(key, rows)| (*key, rows.len()))
        .collect();
    duplicates.sort_unstable();
    for (key, matches) in &duplicates {
        error!("{name}: parent key '{key}' is shared by {matches} rows of '{}'", parent.name());
        if strict {
            return Err(PipelineError::JoinKey {
                table: name.to_string(),
                key: key.to_string(),
                matches: *matches,
            });
        }
        report.duplicate_keys.push(key.to_string());
    }

    let mut columns = child.columns().to_vec();
    columns.extend(parent.columns().iter().cloned());
    let mut out = Table::new(name, columns)?;
    let empty_parent = vec![Value::Missing; parent.columns().len()];

    for row in child.rows() {
        let matches = row.values[ck]
            .as_str()
            .and_then(|key| by_key.get(key))
            .map(Vec::as_slice)
            .unwrap_or_default();
        if matches.is_empty() {
            debug!("{name}: child row {} has no parent", row.label);
            report.orphans += 1;
            let mut values = row.values.clone();
            values.extend(empty_parent.iter().cloned());
            out.push(values);
            continue;
        }
        for &p in matches {
            let mut values = row.values.clone();
            values.extend(parent.rows()[p].values.iter().cloned());
            out.push(values);
            report.matched += 1;
        }
    }
    info!(
        "{name}: {} rows ({} matched, {} orphaned)",
        out.len(),
        report.matched,
        report.orphans
    );
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, cols: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(name, cols.iter().map(|c| c.to_string()).collect()).unwrap();
        for r in rows {
            t.push(r.iter().map(|c| Value::from_cell(c)).collect());
        }
        t
    }

    fn survey() -> Table {
        table(
            "survey",
            &["survey_global_id", "site_id"],
            &[&["S1", "ePR_L01"], &["S2", "ePR_R02"]],
        )
    }

    #[test]
    fn fans_out_children_of_one_parent() {
        let crew = table(
            "crew",
            &["crew_global_id", "crew_ParentGlobalID"],
            &[&["C1", "S1"], &["C2", "S1"]],
        );
        let (out, report) =
            left_join("j", &crew, "crew_ParentGlobalID", &survey(), "survey_global_id", false)
                .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(report.matched, 2);
        for i in 0..2 {
            assert_eq!(out.value(i, "survey_global_id"), Some(&Value::text("S1")));
            assert_eq!(out.value(i, "site_id"), Some(&Value::text("ePR_L01")));
        }
        assert_eq!(
            out.columns(),
            ["crew_global_id", "crew_ParentGlobalID", "survey_global_id", "site_id"]
        );
    }

    #[test]
    fn orphans_kept_and_childless_parents_dropped() {
        let crew = table(
            "crew",
            &["crew_global_id", "crew_ParentGlobalID"],
            &[&["C1", "S9"], &["C2", ""]],
        );
        let (out, report) =
            left_join("j", &crew, "crew_ParentGlobalID", &survey(), "survey_global_id", false)
                .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(report.orphans, 2);
        assert_eq!(out.value(0, "survey_global_id"), Some(&Value::Missing));
        assert!(out
            .rows()
            .iter()
            .all(|r| r.values[2] != Value::text("S2")));
    }

    #[test]
    fn duplicate_parent_keys_fan_out_or_fail_when_strict() {
        let parent = table(
            "survey",
            &["survey_global_id", "site_id"],
            &[&["S1", "a"], &["S1", "b"]],
        );
        let crew = table("crew", &["crew_ParentGlobalID"], &[&["S1"]]);
        let (out, report) =
            left_join("j", &crew, "crew_ParentGlobalID", &parent, "survey_global_id", false)
                .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(report.duplicate_keys, ["S1"]);

        let err = left_join("j", &crew, "crew_ParentGlobalID", &parent, "survey_global_id", true)
            .unwrap_err();
        assert!(matches!(err, PipelineError::JoinKey { matches: 2, .. }));
    }

    #[test]
    fn colliding_column_names_are_rejected() {
        let crew = table("crew", &["survey_global_id"], &[&["S1"]]);
        let err = left_join("j", &crew, "survey_global_id", &survey(), "survey_global_id", false)
            .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateColumn { .. }));
    }
}
