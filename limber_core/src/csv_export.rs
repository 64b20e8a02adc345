//! CSV export and import of the history log.
//!
//! Fixed column order: `item,ordinal,durationSeconds,weight,reps,timestamp`.
//! Duration rows leave `weight`/`reps` empty and weighted rows leave
//! `durationSeconds` empty.

use crate::{Error, HistoryEntry, Measurement, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: [&str; 6] = [
    "item",
    "ordinal",
    "durationSeconds",
    "weight",
    "reps",
    "timestamp",
];

/// A row in the CSV output
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow {
    item: String,
    ordinal: u32,
    duration_seconds: Option<u32>,
    weight: Option<f64>,
    reps: Option<u32>,
    timestamp: String,
}

impl From<&HistoryEntry> for CsvRow {
    fn from(entry: &HistoryEntry) -> Self {
        let (duration_seconds, weight, reps) = match entry.measurement {
            Measurement::Duration { duration_seconds } => (Some(duration_seconds), None, None),
            Measurement::Load { weight, reps } => (None, Some(weight), Some(reps)),
        };
        CsvRow {
            item: entry.item.clone(),
            ordinal: entry.ordinal,
            duration_seconds,
            weight,
            reps,
            timestamp: entry.timestamp.clone(),
        }
    }
}

impl TryFrom<CsvRow> for HistoryEntry {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let measurement = match (row.duration_seconds, row.weight, row.reps) {
            (Some(seconds), None, None) => Measurement::duration(seconds),
            (None, Some(weight), Some(reps)) => Measurement::load(weight, reps),
            _ => {
                return Err(Error::InvalidEntry(format!(
                    "CSV row for \"{}\" at {} needs either durationSeconds or weight and reps",
                    row.item, row.timestamp
                )))
            }
        };
        Ok(HistoryEntry {
            item: row.item,
            ordinal: row.ordinal,
            measurement,
            timestamp: row.timestamp,
        })
    }
}

/// Write entries as CSV (header always included). Returns the row count.
pub fn write_csv<W: Write>(entries: &[HistoryEntry], writer: W) -> Result<usize> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(CSV_HEADER)?;
    for entry in entries {
        writer.serialize(CsvRow::from(entry))?;
    }
    writer.flush()?;
    Ok(entries.len())
}

/// Export entries to a CSV file, replacing it atomically
pub fn export_to_path(entries: &[HistoryEntry], path: &Path) -> Result<usize> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = tempfile::NamedTempFile::new_in(parent)?;
    let count = write_csv(entries, temp.as_file())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} history entries to {:?}", count, path);
    Ok(count)
}

/// Read a CSV export back into entries.
///
/// Unlike the JSONL reader this is strict: a bad row fails the whole read,
/// because imports replace the log wholesale.
pub fn read_csv(path: &Path) -> Result<Vec<HistoryEntry>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut entries = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        entries.push(HistoryEntry::try_from(result?)?);
    }

    tracing::debug!("Read {} history entries from CSV {:?}", entries.len(), path);
    Ok(entries)
}
