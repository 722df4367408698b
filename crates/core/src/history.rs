use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::json_store::{read_document, write_document, JsonStoreError};
use crate::settings::{default_config_dir, SettingsError};

pub const HISTORY_FILE_NAME: &str = "history.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub query: String,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(query: impl Into<String>, executed_at: DateTime<Utc>) -> Self {
        Self {
            query: query.into(),
            executed_at,
            database: None,
            row_count: None,
            elapsed_ms: None,
        }
    }

    /// One-line label for list views: timestamp plus the first line of SQL.
    #[must_use]
    pub fn summary(&self, max_chars: usize) -> String {
        let first_line = self.query.lines().next().unwrap_or_default().trim();
        let mut preview = first_line.chars().take(max_chars).collect::<String>();
        if first_line.chars().count() > max_chars || self.query.trim().lines().count() > 1 {
            preview.push_str("...");
        }
        format!(
            "{} {}",
            self.executed_at.format("%Y-%m-%d %H:%M:%S"),
            preview
        )
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to resolve config directory: {0}")]
    Config(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] JsonStoreError),
}

#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
    limit: Option<usize>,
    entries: Vec<HistoryEntry>,
}

impl FileHistoryStore {
    pub fn load_default(limit: Option<usize>) -> Result<Self, HistoryError> {
        Self::load_from_path(default_config_dir()?.join(HISTORY_FILE_NAME), limit)
    }

    pub fn load_from_path(
        path: impl Into<PathBuf>,
        limit: Option<usize>,
    ) -> Result<Self, HistoryError> {
        let path = path.into();
        let entries: Vec<HistoryEntry> = read_document(&path)?;
        let mut store = Self {
            path,
            limit,
            entries,
        };
        store.enforce_limit();
        tracing::debug!(
            path = %store.path.display(),
            entries = store.entries.len(),
            "history loaded"
        );
        Ok(store)
    }

    /// A store bound to `path` that starts empty, used when the file on disk
    /// could not be read.
    #[must_use]
    pub fn empty_at(path: impl Into<PathBuf>, limit: Option<usize>) -> Self {
        Self {
            path: path.into(),
            limit,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries oldest first.
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        self.enforce_limit();
    }

    pub fn remove(&mut self, index: usize) -> Option<HistoryEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn persist(&self) -> Result<(), HistoryError> {
        write_document(&self.path, &self.entries)?;
        tracing::debug!(path = %self.path.display(), "history persisted");
        Ok(())
    }

    fn enforce_limit(&mut self) {
        if let Some(limit) = self.limit {
            let excess = self.entries.len().saturating_sub(limit);
            if excess > 0 {
                self.entries.drain(..excess);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::{FileHistoryStore, HistoryEntry, HistoryError};
    use crate::json_store::JsonStoreError;

    fn entry(query: &str, second: u32) -> HistoryEntry {
        let mut entry = HistoryEntry::new(
            query,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, second)
                .single()
                .expect("valid timestamp"),
        );
        entry.database = Some("app.db".to_string());
        entry.row_count = Some(3);
        entry.elapsed_ms = Some(4);
        entry
    }

    #[test]
    fn missing_history_file_loads_empty_store() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store = FileHistoryStore::load_from_path(temp_dir.path().join("history.json"), None)
            .expect("failed to load history");
        assert!(store.is_empty());
        assert!(store.latest().is_none());
    }

    #[test]
    fn record_persist_and_reload_preserves_entries_in_order() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("history.json");

        let mut store = FileHistoryStore::load_from_path(&path, None).expect("load");
        store.record(entry("SELECT 1", 1));
        store.record(entry("SELECT *\nFROM users", 2));
        store.persist().expect("failed to persist history");

        let reloaded = FileHistoryStore::load_from_path(&path, None).expect("reload");
        assert_eq!(reloaded.entries(), store.entries());
        assert_eq!(
            reloaded.latest().map(|entry| entry.query.as_str()),
            Some("SELECT *\nFROM users")
        );
    }

    #[test]
    fn limit_drops_oldest_entries() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut store =
            FileHistoryStore::load_from_path(temp_dir.path().join("history.json"), Some(2))
                .expect("load");

        store.record(entry("SELECT 1", 1));
        store.record(entry("SELECT 2", 2));
        store.record(entry("SELECT 3", 3));

        let queries = store
            .entries()
            .iter()
            .map(|entry| entry.query.as_str())
            .collect::<Vec<_>>();
        assert_eq!(queries, vec!["SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn remove_and_clear_entries() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut store =
            FileHistoryStore::load_from_path(temp_dir.path().join("history.json"), None)
                .expect("load");
        store.record(entry("SELECT 1", 1));
        store.record(entry("SELECT 2", 2));

        assert_eq!(
            store.remove(0).map(|entry| entry.query),
            Some("SELECT 1".to_string())
        );
        assert!(store.remove(5).is_none());
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_history_file_is_reported() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("history.json");
        std::fs::write(&path, "[{\"query\": 1").expect("failed to write file");

        let err = FileHistoryStore::load_from_path(&path, None).expect_err("should fail");
        assert!(matches!(
            err,
            HistoryError::Store(JsonStoreError::Parse { .. })
        ));
    }

    #[test]
    fn summary_truncates_long_and_multiline_queries() {
        let short = entry("SELECT 1", 5);
        assert_eq!(short.summary(40), "2026-03-01 12:00:05 SELECT 1");

        let multiline = entry("SELECT *\nFROM users", 6);
        assert_eq!(multiline.summary(40), "2026-03-01 12:00:06 SELECT *...");

        let long = entry("SELECT id, email, created_at FROM users", 7);
        assert_eq!(long.summary(9), "2026-03-01 12:00:07 SELECT id...");
    }
}
