use crate::error::Result;
use crate::types::{Table, Value};
use log::{debug, info};

/// Drop rows whose discriminator fields are all blank.
///
/// Empty strings in the discriminator columns are normalized to missing
/// first; other columns are left as they are. Returns the number of rows
/// dropped.
pub fn retain_substantive(table: &mut Table, discriminators: &[String]) -> Result<usize> {
    let indices = discriminators
        .iter()
        .map(|d| table.require(d))
        .collect::<Result<Vec<_>>>()?;
    for column in discriminators {
        table.map_column(column, |v| if v.is_blank() { Value::Missing } else { v })?;
    }

    let before = table.len();
    let name = table.name().to_string();
    table.retain(|row| {
        let keep = indices.iter().any(|&i| !row.values[i].is_missing());
        if !keep {
            debug!("{name}: dropping row {} with no {}", row.label, discriminators.join("/"));
        }
        keep
    });
    let dropped = before - table.len();
    info!("{}: dropped {} rows without {}", name, dropped, discriminators.join(", "));
    Ok(dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> Table {
        let cols = ["collection_type", "water_vessel_label", "core_label", "notes"];
        let mut t = Table::new("c", cols.iter().map(|c| c.to_string()).collect()).unwrap();
        t.push(vec![
            Value::text(""),
            Value::text(""),
            Value::text("CORE-1"),
            Value::text(""),
        ]);
        t.push(vec![
            Value::text(""),
            Value::Missing,
            Value::text(""),
            Value::text("orphan"),
        ]);
        t.push(vec![
            Value::text("water_sample"),
            Value::Missing,
            Value::Missing,
            Value::text(""),
        ]);
        t
    }

    fn discriminators() -> Vec<String> {
        vec![
            "collection_type".to_string(),
            "water_vessel_label".to_string(),
            "core_label".to_string(),
        ]
    }

    #[test]
    fn keeps_rows_with_any_discriminator() {
        let mut t = collection();
        let dropped = retain_substantive(&mut t, &discriminators()).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(t.len(), 2);
        assert_eq!(t.value(0, "core_label"), Some(&Value::text("CORE-1")));
        // blanks become missing only in discriminator columns
        assert_eq!(t.value(0, "collection_type"), Some(&Value::Missing));
        assert_eq!(t.value(0, "notes"), Some(&Value::text("")));
    }

    #[test]
    fn labels_survive_filtering() {
        let mut t = collection();
        retain_substantive(&mut t, &discriminators()).unwrap();
        let labels: Vec<_> = t.rows().iter().map(|r| r.label).collect();
        assert_eq!(labels, [0, 2]);
    }

    #[test]
    fn unknown_discriminator_is_schema_error() {
        let mut t = collection();
        assert!(retain_substantive(&mut t, &["nope".to_string()]).is_err());
    }
}
