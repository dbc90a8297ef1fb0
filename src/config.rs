use crate::error::{PipelineError, Result};
use crate::schema::SurveySchema;
use crate::survey_v14;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One project-code substitution. `pattern` is a regular expression matched
/// anywhere in the cell, so a multi-select cell like `prj_a,prj_b` gets
/// every code replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCode {
    pub pattern: String,
    pub label: String,
}

/// Everything a pipeline run needs, passed in explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw CSVs as downloaded from the survey platform.
    pub raw_dir: PathBuf,
    /// Repaired CSVs, read by the subset step.
    pub repaired_dir: PathBuf,
    /// Subset and joined CSVs.
    pub output_dir: PathBuf,
    #[serde(default = "default_true")]
    pub write_intermediate: bool,
    #[serde(default)]
    pub strict_join_keys: bool,
    #[serde(default)]
    pub projects: Vec<ProjectCode>,
    #[serde(default = "survey_v14::schema")]
    pub schema: SurveySchema,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            repaired_dir: PathBuf::from("data/strip"),
            output_dir: PathBuf::from("data/output"),
            write_intermediate: true,
            strict_join_keys: false,
            projects: Vec::new(),
            schema: survey_v14::schema(),
        }
    }
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config: PipelineConfig =
            serde_json::from_str(&text).map_err(|source| PipelineError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;
        self.substitutions().map(|_| ())
    }

    /// Compile the project-code patterns in declaration order.
    pub fn substitutions(&self) -> Result<Vec<(Regex, String)>> {
        self.projects
            .iter()
            .map(|p| {
                Regex::new(&p.pattern)
                    .map(|re| (re, p.label.clone()))
                    .map_err(|e| {
                        PipelineError::config(format!("bad project pattern '{}': {e}", p.pattern))
                    })
            })
            .collect()
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.repaired_dir.join(file_name)
    }

    /// Output CSV path for a file stem.
    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{stem}.csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn minimal_json_gets_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "raw_dir": "raw",
                "repaired_dir": "strip",
                "output_dir": "out",
                "projects": [{"pattern": "prj_medna", "label": "Maine-eDNA"}]
            }"#,
        )
        .unwrap();
        let config = PipelineConfig::from_path(&path).unwrap();
        assert!(config.write_intermediate);
        assert!(!config.strict_join_keys);
        assert_eq!(config.schema.version, survey_v14::VERSION);
        assert_eq!(config.output_path("survey_sub"), PathBuf::from("out/survey_sub.csv"));
    }

    #[test]
    fn bad_pattern_is_config_error() {
        let config = PipelineConfig {
            projects: vec![ProjectCode {
                pattern: "prj_(".to_string(),
                label: "x".to_string(),
            }],
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config { .. })));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_path(&path),
            Err(PipelineError::ConfigParse { .. })
        ));
    }
}
