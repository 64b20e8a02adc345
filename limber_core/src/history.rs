//! History log storage.
//!
//! The log is append-only, keyed by `(item, ordinal, timestamp)`. Stores
//! reject duplicate keys instead of overwriting, and each `append` or
//! `replace_all` either lands in full or not at all.

use crate::session::parse_timestamp;
use crate::{EntryKey, Error, HistoryEntry, Result, SessionDate};
use chrono::{FixedOffset, Local, Offset};
use fs2::FileExt;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Key-addressed history log
pub trait HistoryStore {
    /// All entries, newest first
    fn read(&self) -> Result<Vec<HistoryEntry>>;

    /// Add entries atomically. Any key already present, or repeated within
    /// the batch, fails the whole call with [`Error::Conflict`].
    fn append(&mut self, entries: &[HistoryEntry]) -> Result<()>;

    /// Remove the entry with exactly this key, returning how many were removed
    fn delete_by_key(&mut self, key: &EntryKey) -> Result<usize>;

    /// Overwrite the whole log (import/restore)
    fn replace_all(&mut self, entries: &[HistoryEntry]) -> Result<()>;
}

/// Entries whose timestamp falls on `day`
pub fn entries_on<'a>(history: &'a [HistoryEntry], day: &SessionDate) -> Vec<&'a HistoryEntry> {
    history
        .iter()
        .filter(|entry| day.contains(&entry.timestamp))
        .collect()
}

/// Basic shape checks applied before anything is written
pub fn validate_entry(entry: &HistoryEntry) -> Result<()> {
    if entry.item.trim().is_empty() {
        return Err(Error::InvalidEntry("item name is empty".into()));
    }
    if entry.ordinal == 0 {
        return Err(Error::InvalidEntry(format!(
            "ordinal for \"{}\" must be at least 1",
            entry.item
        )));
    }
    if entry.timestamp.trim().is_empty() {
        return Err(Error::InvalidEntry(format!(
            "timestamp for \"{}\" is empty",
            entry.item
        )));
    }
    Ok(())
}

/// Ensure `incoming` has no key collisions with `existing` or with itself
fn check_conflicts(existing: &[HistoryEntry], incoming: &[HistoryEntry]) -> Result<()> {
    let mut keys: HashSet<EntryKey> = existing.iter().map(HistoryEntry::key).collect();
    for entry in incoming {
        validate_entry(entry)?;
        let key = entry.key();
        if !keys.insert(key.clone()) {
            return Err(Error::Conflict(format!(
                "history entry {} already exists",
                key
            )));
        }
    }
    Ok(())
}

/// Order newest first. Zone-less timestamps are read at the local offset,
/// unparseable ones go last, and ties keep the later write first.
fn sort_newest_first(entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    sort_newest_first_at(entries, Local::now().offset().fix())
}

fn sort_newest_first_at(mut entries: Vec<HistoryEntry>, offset: FixedOffset) -> Vec<HistoryEntry> {
    entries.reverse();
    entries.sort_by_cached_key(|entry| Reverse(parse_timestamp(&entry.timestamp, offset)));
    entries
}

// ============================================================================
// In-memory store
// ============================================================================

/// `Vec`-backed store, mainly for tests and embedding
#[derive(Clone, Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: Vec<HistoryEntry>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn read(&self) -> Result<Vec<HistoryEntry>> {
        Ok(sort_newest_first(self.entries.clone()))
    }

    fn append(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        check_conflicts(&self.entries, entries)?;
        self.entries.extend_from_slice(entries);
        Ok(())
    }

    fn delete_by_key(&mut self, key: &EntryKey) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.matches_key(key));
        Ok(before - self.entries.len())
    }

    fn replace_all(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        check_conflicts(&[], entries)?;
        self.entries = entries.to_vec();
        Ok(())
    }
}

// ============================================================================
// JSON Lines store
// ============================================================================

/// History stored as JSON Lines with file locking.
///
/// A sidecar `<file>.lock` is held shared while reading and exclusive while
/// writing. Appends go to the end of the file in one write; deletes and
/// replacements rewrite through a temp file and an atomic rename.
pub struct JsonlHistoryStore {
    path: PathBuf,
}

impl JsonlHistoryStore {
    /// Create a store for the given path. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Acquire the sidecar lock. It is released when the returned file drops.
    fn lock(&self, exclusive: bool) -> Result<File> {
        self.ensure_parent_dir()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        if exclusive {
            file.lock_exclusive()?;
        } else {
            file.lock_shared()?;
        }
        Ok(file)
    }

    /// Raw file contents; empty if the file does not exist yet
    fn read_raw(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the whole file atomically
    fn rewrite(&self, entries: &[HistoryEntry]) -> Result<()> {
        self.ensure_parent_dir()?;
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "history path missing parent")
        })?;
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for entry in entries {
                serde_json::to_writer(&mut writer, entry)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Parse JSON lines, skipping blank and malformed ones
fn parse_lines(text: &str) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    for (line_num, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse history entry at line {}: {}", line_num + 1, e);
            }
        }
    }
    entries
}

impl HistoryStore for JsonlHistoryStore {
    fn read(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let _lock = self.lock(false)?;
        let entries = parse_lines(&self.read_raw()?);
        tracing::debug!("Read {} history entries from {:?}", entries.len(), self.path);
        Ok(sort_newest_first(entries))
    }

    fn append(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let _lock = self.lock(true)?;
        let raw = self.read_raw()?;
        check_conflicts(&parse_lines(&raw), entries)?;

        let mut buf = Vec::new();
        // Terminate a partial last line left by an interrupted write
        if !raw.is_empty() && !raw.ends_with('\n') {
            buf.push(b'\n');
        }
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buf)?;
        file.sync_all()?;

        tracing::debug!("Appended {} history entries to {:?}", entries.len(), self.path);
        Ok(())
    }

    fn delete_by_key(&mut self, key: &EntryKey) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let _lock = self.lock(true)?;
        let mut entries = parse_lines(&self.read_raw()?);
        let before = entries.len();
        entries.retain(|entry| !entry.matches_key(key));
        let removed = before - entries.len();

        if removed > 0 {
            self.rewrite(&entries)?;
            tracing::debug!("Deleted history entry {}", key);
        } else {
            tracing::debug!("No history entry matched {}", key);
        }
        Ok(removed)
    }

    fn replace_all(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        check_conflicts(&[], entries)?;
        let _lock = self.lock(true)?;
        self.rewrite(entries)?;
        tracing::info!("Replaced history with {} entries", entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Measurement;
    use chrono::NaiveDate;

    fn hold(item: &str, ordinal: u32, seconds: u32, timestamp: &str) -> HistoryEntry {
        HistoryEntry {
            item: item.into(),
            ordinal,
            measurement: Measurement::duration(seconds),
            timestamp: timestamp.into(),
        }
    }

    /// Behaviour shared by every store implementation
    fn check_store_contract(store: &mut dyn HistoryStore) {
        assert!(store.read().unwrap().is_empty());

        let first = hold("Calf Stretch", 1, 30, "2024-03-01T10:00:00Z");
        let second = hold("Calf Stretch", 2, 35, "2024-03-02T10:00:00Z");
        store.append(&[first.clone(), second.clone()]).unwrap();

        // Newest first
        assert_eq!(store.read().unwrap(), vec![second.clone(), first.clone()]);

        // Duplicate key rejected, nothing from the batch written
        let fresh = hold("Cat-Cow", 1, 60, "2024-03-02T11:00:00Z");
        let result = store.append(&[fresh.clone(), first.clone()]);
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(store.read().unwrap().len(), 2);

        // Duplicate within a single batch is also a conflict
        let result = store.append(&[fresh.clone(), fresh.clone()]);
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(store.read().unwrap().len(), 2);

        // Same item and ordinal at a different time is a different key
        let again = hold("Calf Stretch", 1, 40, "2024-03-03T10:00:00Z");
        store.append(&[again.clone()]).unwrap();
        assert_eq!(store.read().unwrap()[0], again);

        assert_eq!(store.delete_by_key(&first.key()).unwrap(), 1);
        assert_eq!(store.delete_by_key(&first.key()).unwrap(), 0);
        assert_eq!(store.read().unwrap(), vec![again.clone(), second.clone()]);

        store.replace_all(&[fresh.clone()]).unwrap();
        assert_eq!(store.read().unwrap(), vec![fresh.clone()]);

        assert!(matches!(
            store.replace_all(&[fresh.clone(), fresh.clone()]),
            Err(Error::Conflict(_))
        ));
        assert_eq!(store.read().unwrap(), vec![fresh]);

        store.replace_all(&[]).unwrap();
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn test_in_memory_store_contract() {
        let mut store = InMemoryHistoryStore::new();
        check_store_contract(&mut store);
    }

    #[test]
    fn test_jsonl_store_contract() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlHistoryStore::new(temp_dir.path().join("history.jsonl"));
        check_store_contract(&mut store);
    }

    #[test]
    fn test_rejects_invalid_entries() {
        let mut store = InMemoryHistoryStore::new();
        assert!(matches!(
            store.append(&[hold("Calf Stretch", 0, 30, "2024-03-01T10:00:00Z")]),
            Err(Error::InvalidEntry(_))
        ));
        assert!(matches!(
            store.append(&[hold("  ", 1, 30, "2024-03-01T10:00:00Z")]),
            Err(Error::InvalidEntry(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_jsonl_persists_across_instances() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/history.jsonl");

        let mut store = JsonlHistoryStore::new(&path);
        store
            .append(&[hold("Calf Stretch", 1, 30, "2024-03-01T10:00:00Z")])
            .unwrap();

        let reopened = JsonlHistoryStore::new(&path);
        assert_eq!(reopened.read().unwrap().len(), 1);
    }

    #[test]
    fn test_jsonl_skips_malformed_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        std::fs::write(
            &path,
            "{ invalid json }\n\n{\"item\":\"Calf Stretch\",\"ordinal\":1,\"durationSeconds\":30,\"timestamp\":\"2024-03-01T10:00:00Z\"}\n",
        )
        .unwrap();

        let store = JsonlHistoryStore::new(&path);
        let entries = store.read().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].measurement, Measurement::duration(30));
    }

    #[test]
    fn test_jsonl_reads_legacy_field_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"stretch\":\"Calf Stretch\",\"holdNumber\":2,\"durationSeconds\":45,\"timestamp\":\"2024-03-01T10:00:00Z\"}\n",
                "{\"exercise\":\"Deadlifts\",\"setNumber\":1,\"weight\":92.5,\"reps\":5,\"timestamp\":\"2024-03-01T09:00:00Z\"}\n",
            ),
        )
        .unwrap();

        let entries = JsonlHistoryStore::new(&path).read().unwrap();
        assert_eq!(entries[0].item, "Calf Stretch");
        assert_eq!(entries[0].ordinal, 2);
        assert_eq!(entries[1].measurement, Measurement::load(92.5, 5));
    }

    #[test]
    fn test_jsonl_append_after_partial_line() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        std::fs::write(&path, "{\"item\":\"Calf Str").unwrap();

        let mut store = JsonlHistoryStore::new(&path);
        store
            .append(&[hold("Cat-Cow", 1, 60, "2024-03-01T10:00:00Z")])
            .unwrap();

        let entries = store.read().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item, "Cat-Cow");
    }

    #[test]
    fn test_jsonl_conflict_leaves_file_untouched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        let mut store = JsonlHistoryStore::new(&path);
        let entry = hold("Calf Stretch", 1, 30, "2024-03-01T10:00:00Z");
        store.append(&[entry.clone()]).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(store.append(&[entry]).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_jsonl_rewrite_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        let mut store = JsonlHistoryStore::new(&path);
        store
            .replace_all(&[hold("Calf Stretch", 1, 30, "2024-03-01T10:00:00Z")])
            .unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "history.jsonl" && name != "history.jsonl.lock")
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }

    #[test]
    fn test_delete_on_missing_file_is_zero() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlHistoryStore::new(temp_dir.path().join("history.jsonl"));
        let key = hold("Calf Stretch", 1, 30, "2024-03-01T10:00:00Z").key();
        assert_eq!(store.delete_by_key(&key).unwrap(), 0);
    }

    #[test]
    fn test_unparseable_timestamps_sort_last() {
        let entries = sort_newest_first(vec![
            hold("A", 1, 1, "not a time"),
            hold("B", 1, 1, "2024-03-01T10:00:00Z"),
            hold("C", 1, 1, "2024-03-02T10:00:00+09:00"),
        ]);
        let names: Vec<_> = entries.iter().map(|e| e.item.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_zone_less_timestamps_sort_by_time() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let entries = sort_newest_first_at(
            vec![
                hold("Old", 1, 30, "2024-01-01T10:00:00Z"),
                hold("New", 1, 90, "2024-03-01T10:00:00"),
                hold("Mid", 1, 60, "2024-02-01 10:00:00"),
            ],
            utc,
        );
        let names: Vec<_> = entries.iter().map(|e| e.item.as_str()).collect();
        assert_eq!(names, vec!["New", "Mid", "Old"]);
    }

    #[test]
    fn test_jsonl_read_orders_zone_less_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlHistoryStore::new(temp_dir.path().join("history.jsonl"));
        store
            .append(&[
                hold("Calf Stretch", 1, 30, "2024-01-01T10:00:00Z"),
                hold("Calf Stretch", 1, 90, "2024-03-01T10:00:00"),
            ])
            .unwrap();

        let read = store.read().unwrap();
        assert_eq!(read[0].timestamp, "2024-03-01T10:00:00");
        assert_eq!(read[1].timestamp, "2024-01-01T10:00:00Z");
    }

    #[test]
    fn test_entries_on_filters_by_day() {
        let history = vec![
            hold("A", 1, 1, "2024-03-01T10:00:00Z"),
            hold("B", 1, 1, "2024-02-29T10:00:00Z"),
        ];
        let day = SessionDate::utc(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let today = entries_on(&history, &day);
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].item, "A");
    }
}
