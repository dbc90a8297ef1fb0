//! The repair → subset → join → filter → expand → write pipeline.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, StepContext};
use crate::expand::{expand_rows, select_eligible};
use crate::join::left_join;
use crate::loader::load_table;
use crate::output::write_csv;
use crate::repair::repair_dir;
use crate::schema::{JoinParent, TableSchema};
use crate::types::Table;
use crate::validity::retain_substantive;
use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub source: PathBuf,
    pub rows: usize,
    pub coordinates_filled: usize,
    pub substituted_cells: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputSummary {
    pub name: String,
    pub file: PathBuf,
    pub rows: usize,
    pub dropped_rows: usize,
    pub orphan_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub schema_version: String,
    pub generated_at: DateTime<Local>,
    pub repaired_files: Vec<PathBuf>,
    pub tables: Vec<TableSummary>,
    pub outputs: Vec<OutputSummary>,
    pub duplicate_parent_keys: Vec<String>,
}

/// A finished table and where it was written.
#[derive(Debug, Clone)]
pub struct WrittenTable {
    pub name: String,
    pub path: PathBuf,
    pub table: Table,
}

#[derive(Debug)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub written: Vec<WrittenTable>,
}

impl RunOutput {
    pub fn get(&self, name: &str) -> Option<&WrittenTable> {
        self.written.iter().find(|w| w.name == name)
    }
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate the configuration up front so bad schemas fail before any
    /// file is read.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate().step("configure")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Repair the raw exports into the repaired directory.
    pub fn repair(&self) -> Result<Vec<PathBuf>> {
        repair_dir(&self.config.raw_dir, &self.config.repaired_dir).step("repair")
    }

    /// Repair, then join.
    pub fn run(&self) -> Result<RunOutput> {
        let repaired = self.repair()?;
        let mut output = self.join()?;
        output.summary.repaired_files = repaired;
        Ok(output)
    }

    /// Subset every source table, build the joins and expansions, and write
    /// every output.
    pub fn join(&self) -> Result<RunOutput> {
        info!("[START] join_data ({})", self.config.schema.version);
        let schema = &self.config.schema;
        let substitutions = self.config.substitutions().step("configure")?;

        let mut summary = RunSummary {
            schema_version: schema.version.clone(),
            generated_at: Local::now(),
            repaired_files: Vec::new(),
            tables: Vec::new(),
            outputs: Vec::new(),
            duplicate_parent_keys: Vec::new(),
        };
        let mut written = Vec::new();

        let mut tables: HashMap<String, Table> = HashMap::new();
        for spec in &schema.tables {
            let step = format!("subset_{}", spec.name);
            let source = self.config.source_path(&spec.source_file);
            let (table, report) = load_table(spec, &source, &substitutions).step(&step)?;
            summary.tables.push(TableSummary {
                name: spec.name.clone(),
                source,
                rows: report.total_rows,
                coordinates_filled: report.coordinates_filled,
                substituted_cells: report.substituted_cells,
            });
            if spec.name == schema.root || self.config.write_intermediate {
                let audit = self.write_audit(spec, &table).step(&step)?;
                summary.outputs.push(OutputSummary {
                    name: audit.name.clone(),
                    file: audit.path.clone(),
                    rows: audit.table.len(),
                    dropped_rows: 0,
                    orphan_rows: 0,
                });
                written.push(audit);
            }
            tables.insert(spec.name.clone(), table);
        }

        // Raw joins first: a chained join needs its parent before projection.
        let mut raw_joins: HashMap<String, (Table, usize)> = HashMap::new();
        for spec in &schema.joins {
            let step = format!("join_{}", spec.name);
            let child = lookup(&tables, &spec.child).step(&step)?;
            let parent = match &spec.parent {
                JoinParent::Table(name) => lookup(&tables, name),
                JoinParent::Join(name) => raw_joins
                    .get(name)
                    .map(|(t, _)| t)
                    .ok_or_else(|| PipelineError::config(format!("join '{name}' not built"))),
            }
            .step(&step)?;
            let (joined, report) = left_join(
                &spec.name,
                child,
                &spec.child_key,
                parent,
                &spec.parent_key,
                self.config.strict_join_keys,
            )
            .step(&step)?;
            summary.duplicate_parent_keys.extend(report.duplicate_keys);
            raw_joins.insert(spec.name.clone(), (joined, report.orphans));
        }

        let mut filtered: HashMap<String, Table> = HashMap::new();
        for spec in &schema.joins {
            let step = format!("join_{}", spec.name);
            let (raw, orphans) = &raw_joins[&spec.name];
            let mut working = raw.project(&spec.projection).step(&step)?;
            working.sort_by_columns(&spec.sort_by).step(&step)?;
            if !spec.index_after_filter {
                working.relabel();
            }
            let dropped = retain_substantive(&mut working, &spec.discriminators).step(&step)?;
            if spec.index_after_filter {
                working.relabel();
            }
            let output = working.project(spec.output_columns()).step(&step)?;
            let path = self.config.output_path(&spec.output_file);
            info!("{}: writing {}", spec.name, path.display());
            write_csv(&path, &output).step(&step)?;
            summary.outputs.push(OutputSummary {
                name: spec.name.clone(),
                file: path.clone(),
                rows: output.len(),
                dropped_rows: dropped,
                orphan_rows: *orphans,
            });
            written.push(WrittenTable {
                name: spec.name.clone(),
                path,
                table: output,
            });
            filtered.insert(spec.name.clone(), working);
        }

        for spec in &schema.expansions {
            let step = format!("expand_{}", spec.name);
            let source = lookup(&filtered, &spec.source).step(&step)?;
            let eligible = select_eligible(source, spec).step(&step)?;
            let expanded = expand_rows(&eligible, spec).step(&step)?;
            let path = self.config.output_path(&spec.output_file);
            info!("{}: writing {}", spec.name, path.display());
            write_csv(&path, &expanded).step(&step)?;
            summary.outputs.push(OutputSummary {
                name: spec.name.clone(),
                file: path.clone(),
                rows: expanded.len(),
                dropped_rows: 0,
                orphan_rows: 0,
            });
            written.push(WrittenTable {
                name: spec.name.clone(),
                path,
                table: expanded,
            });
        }

        info!("[END] join_data ({} files written)", written.len());
        Ok(RunOutput { summary, written })
    }

    /// Write a table's subset as an audit file. Tables with an audit
    /// projection are projected, sorted and re-indexed first.
    fn write_audit(&self, spec: &TableSchema, table: &Table) -> Result<WrittenTable> {
        let mut audit = match &spec.audit_columns {
            Some(columns) => table.project(columns)?,
            None => table.clone(),
        };
        if !spec.audit_sort.is_empty() {
            audit.sort_by_columns(&spec.audit_sort)?;
            audit.relabel();
        }
        let path = self.config.output_path(&spec.audit_file);
        info!("{}: writing {}", spec.name, path.display());
        write_csv(&path, &audit)?;
        Ok(WrittenTable {
            name: spec.audit_file.clone(),
            path,
            table: audit,
        })
    }
}

fn lookup<'a>(tables: &'a HashMap<String, Table>, name: &str) -> Result<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| PipelineError::config(format!("table '{name}' was not loaded")))
}
