//! Repair, subset and join the eDNA field survey exports into
//! analysis-ready CSV tables.
//!
//! Raw exports are repaired so quoted free text no longer spans lines, each
//! source table is subset and normalized per a versioned [`SurveySchema`],
//! child tables are left-joined onto their parents, rows without substantive
//! data are dropped, sub-core rows are expanded, and every result is written
//! as CSV.

pub mod config;
pub mod error;
pub mod expand;
pub mod join;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod repair;
pub mod schema;
pub mod survey_v14;
pub mod types;
pub mod util;
pub mod validity;

pub use config::{PipelineConfig, ProjectCode};
pub use error::{PipelineError, Result, StepContext};
pub use pipeline::{Pipeline, RunOutput, RunSummary};
pub use schema::SurveySchema;
pub use types::{Row, Table, Value};
