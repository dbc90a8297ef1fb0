//! Text repair for survey CSV exports.
//!
//! Free-text survey fields keep the carriage returns typed in the field app,
//! so an exported record can span several physical lines. Repair flattens
//! every newline inside a quoted span to a single space, leaving record
//! separators alone.

use crate::error::{PipelineError, Result};
use crate::output::write_atomic;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// A quoted span: opening quote, then text where `""` is an escaped quote,
/// then the closing quote.
static QUOTED_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*(?:""[^"]*)*""#).expect("quoted span pattern"));

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|\r|\n").expect("line break pattern"));

/// Replace newlines inside quoted fields with a space.
///
/// Works on the whole text at once; a line-by-line pass could not join the
/// pieces of a broken record. A CR LF pair counts as one newline. Text with
/// no line break inside any quoted span is returned borrowed.
pub fn repair_quoted_newlines(content: &str) -> Cow<'_, str> {
    let broken = QUOTED_SPAN
        .find_iter(content)
        .any(|m| LINE_BREAK.is_match(m.as_str()));
    if !broken {
        return Cow::Borrowed(content);
    }
    QUOTED_SPAN.replace_all(content, |caps: &regex::Captures| {
        LINE_BREAK.replace_all(&caps[0], " ").into_owned()
    })
}

/// Repair one file into `output`. Nothing is written unless the whole input
/// was read and transformed.
pub fn repair_file(input: &Path, output: &Path) -> Result<()> {
    let content = fs::read_to_string(input).map_err(|e| PipelineError::io(input, e))?;
    let repaired = repair_quoted_newlines(&content);
    if let Cow::Owned(_) = &repaired {
        debug!("repair: rewrote quoted line breaks in {}", input.display());
    }
    write_atomic(output, repaired.as_bytes())
}

/// Repair every `*.csv` file of `raw_dir` into `repaired_dir`, keeping file
/// names. Returns the written paths in name order.
pub fn repair_dir(raw_dir: &Path, repaired_dir: &Path) -> Result<Vec<PathBuf>> {
    info!(
        "[START] repair {} -> {}",
        raw_dir.display(),
        repaired_dir.display()
    );
    let entries = fs::read_dir(raw_dir).map_err(|e| PipelineError::io(raw_dir, e))?;
    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::io(raw_dir, e))?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            inputs.push(path);
        }
    }
    inputs.sort();

    fs::create_dir_all(repaired_dir).map_err(|e| PipelineError::io(repaired_dir, e))?;
    let mut written = Vec::with_capacity(inputs.len());
    for input in inputs {
        let Some(file_name) = input.file_name() else {
            continue;
        };
        let output = repaired_dir.join(file_name);
        info!("repair: cleaning {}", input.display());
        repair_file(&input, &output)?;
        written.push(output);
    }
    info!("[END] repair ({} files)", written.len());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn newline_inside_quotes_becomes_space() {
        let input = "name,notes\n1,\"line one\nline two\"\n2,\"no break\"\n";
        assert_eq!(
            repair_quoted_newlines(input),
            "name,notes\n1,\"line one line two\"\n2,\"no break\"\n"
        );
    }

    #[test]
    fn doubled_quotes_are_part_of_the_span() {
        let input = "\"she said \"\"hi\"\"\nto me\"";
        assert_eq!(repair_quoted_newlines(input), "\"she said \"\"hi\"\" to me\"");
    }

    #[test]
    fn crlf_inside_quotes_is_one_space_and_outside_is_kept() {
        let input = "a,b\r\n1,\"x\r\ny\"\r\n";
        assert_eq!(repair_quoted_newlines(input), "a,b\r\n1,\"x y\"\r\n");
    }

    #[test]
    fn untouched_text_is_borrowed() {
        let input = "a,b\n1,2\n";
        assert!(matches!(repair_quoted_newlines(input), Cow::Borrowed(_)));
    }

    #[test]
    fn quoted_text_without_breaks_is_borrowed() {
        let input = "id,notes\nS1,\"a, b\"\nS2,\"say \"\"hi\"\"\"\n";
        assert!(matches!(repair_quoted_newlines(input), Cow::Borrowed(_)));
        assert!(matches!(
            repair_quoted_newlines("id,notes\nS1,\"a\nb\"\n"),
            Cow::Owned(ref s) if s == "id,notes\nS1,\"a b\"\n"
        ));
    }

    #[test]
    fn repairs_only_csv_files_in_directory() {
        let raw = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(raw.path().join("b.csv"), "n\n\"x\ny\"\n").unwrap();
        fs::write(raw.path().join("a.CSV"), "n\n1\n").unwrap();
        fs::write(raw.path().join("notes.txt"), "\"x\ny\"").unwrap();

        let written = repair_dir(raw.path(), &out.path().join("strip")).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.CSV", "b.csv"]);
        assert_eq!(fs::read_to_string(&written[1]).unwrap(), "n\n\"x y\"\n");
    }

    #[test]
    fn missing_input_is_io_error_and_writes_nothing() {
        let out = TempDir::new().unwrap();
        let target = out.path().join("x.csv");
        let err = repair_file(Path::new("/nonexistent/x.csv"), &target).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(!target.exists());
    }
}
