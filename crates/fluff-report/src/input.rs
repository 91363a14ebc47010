//! Loading classification records from disk.

use std::io::BufRead;
use std::path::Path;

use aggregation::{ClassificationRecord, RawClassification, TaskIndex};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Read a JSON array of already-parsed records.
pub fn load_records(path: &Path) -> Result<Vec<ClassificationRecord>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<ClassificationRecord> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse records in {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "Loaded records");
    Ok(records)
}

/// Read JSON lines of decoded export rows and adapt them to records.
///
/// Rows whose object name or timestamp cannot be resolved are skipped with a
/// warning unless `strict` is set.
pub fn load_export_rows(
    path: &Path,
    tasks: &[TaskIndex],
    strict: bool,
) -> Result<Vec<ClassificationRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    parse_export_rows(std::io::BufReader::new(file), tasks, strict)
        .with_context(|| format!("Failed to load export rows from {}", path.display()))
}

fn parse_export_rows(
    reader: impl BufRead,
    tasks: &[TaskIndex],
    strict: bool,
) -> Result<Vec<ClassificationRecord>> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let raw: RawClassification = serde_json::from_str(&line)
            .with_context(|| format!("Line {line_no}: malformed export row"))?;

        match raw.into_record(tasks) {
            Ok(record) => records.push(record),
            Err(e) if strict => return Err(e).context(format!("Line {line_no}")),
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping export row");
                skipped += 1;
            }
        }
    }

    info!(records = records.len(), skipped, "Adapted export rows");
    Ok(records)
}
