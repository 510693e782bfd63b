//! JSON-lines datasets: one `{"id", "vector", "payload"}` object per line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{AnnError, Result};
use crate::record::Record;

/// Read every record from a JSON-lines stream. Blank lines are skipped.
///
/// Parse failures report the 1-based line number.
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(trimmed).map_err(|e| {
            AnnError::Serialization(format!("line {}: {}", line_no + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Read a JSON-lines file.
pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let records = read_jsonl(BufReader::new(File::open(path)?))?;
    tracing::debug!(path = %path.display(), records = records.len(), "dataset read");
    Ok(records)
}
