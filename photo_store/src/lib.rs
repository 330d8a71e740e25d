//! Canonical collection of photo records and its persisted snapshot.

mod backing;

pub use backing::Snapshot;

use backing::Backing;
use lookup_client::PhotoRecord;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Photo not found: {0}")]
    NotFound(String),
    #[error("Duplicate photo id: {0}")]
    DuplicateId(String),
    #[error("Invalid record {0}: address or weather without coordinates")]
    InvalidRecord(String),
    #[error("Persistence Error: {0}")]
    PersistenceError(String),
    #[error("Serialization Error: {0}")]
    SerializationError(String),
    #[error("IO Error: {0}")]
    IoError(String),
    #[error("Other Error: {0}")]
    Other(String),
}

/// Outcome of a bulk delete. Missing ids are reported, not treated as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Single-writer photo store.
///
/// The in-memory collection is authoritative for the session. When a backing
/// file is attached, `load`/`persist` move whole snapshots in and out of it;
/// a failed persist leaves the store running memory-only until the next
/// successful one.
pub struct PhotoStore {
    records: Vec<PhotoRecord>,
    retired: HashSet<String>,
    backing: Option<Backing>,
    memory_only: bool,
}

impl PhotoStore {
    pub fn in_memory() -> Self {
        PhotoStore {
            records: Vec::new(),
            retired: HashSet::new(),
            backing: None,
            memory_only: true,
        }
    }

    /// Empty store bound to `db_path`; nothing is read until `load`.
    pub fn with_backing(db_path: &Path) -> Self {
        PhotoStore {
            records: Vec::new(),
            retired: HashSet::new(),
            backing: Some(Backing::new(db_path)),
            memory_only: false,
        }
    }

    /// Store bound to `db_path` with the persisted snapshot loaded.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let mut store = Self::with_backing(db_path);
        store.load()?;
        Ok(store)
    }

    pub fn backing_path(&self) -> Option<PathBuf> {
        self.backing.as_ref().map(|b| b.path().to_path_buf())
    }

    /// True when the last persistence attempt failed or there is no backing file.
    pub fn memory_only(&self) -> bool {
        self.memory_only
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub fn create(&mut self, record: PhotoRecord) -> Result<(), StoreError> {
        if self.contains(&record.id) || self.retired.contains(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        if !record.has_consistent_enrichment() {
            return Err(StoreError::InvalidRecord(record.id));
        }
        // SQLite reads a NaN REAL back as NULL, so only storable locations get in.
        if record.coordinates.is_some_and(|c| !c.is_valid()) {
            return Err(StoreError::InvalidRecord(record.id));
        }
        tracing::debug!(id = %record.id, "photo created");
        self.records.insert(0, record);
        Ok(())
    }

    /// Removes the record if present. Returns whether anything was removed.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub fn delete_one(&mut self, id: &str) -> bool {
        match self.records.iter().position(|r| r.id == id) {
            Some(idx) => {
                self.records.remove(idx);
                self.retired.insert(id.to_string());
                tracing::debug!(id, "photo deleted");
                true
            }
            None => false,
        }
    }

    /// Best-effort bulk delete, processed in ascending id order.
    pub fn delete_many<I, S>(&mut self, ids: I) -> DeleteReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ordered: BTreeSet<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mut report = DeleteReport::default();
        for id in ordered {
            if self.delete_one(&id) {
                report.deleted.push(id);
            } else {
                report.missing.push(id);
            }
        }
        tracing::info!(
            deleted = report.deleted.len(),
            missing = report.missing.len(),
            "bulk delete finished"
        );
        report
    }

    /// Current records. No ordering is promised.
    pub fn all(&self) -> &[PhotoRecord] {
        &self.records
    }

    pub fn by_id(&self, id: &str) -> Result<&PhotoRecord, StoreError> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Records with usable coordinates, for the map view.
    pub fn geotagged(&self) -> Vec<&PhotoRecord> {
        self.records.iter().filter(|r| r.is_geotagged()).collect()
    }

    /// Removes every record. Their ids stay retired.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        for record in self.records.drain(..) {
            self.retired.insert(record.id);
        }
        tracing::info!(removed, "store cleared");
        removed
    }

    /// URI handed to the export/share collaborator.
    pub fn export_source(&self, id: &str) -> Result<&str, StoreError> {
        self.by_id(id).map(|r| r.uri.as_str())
    }

    /// Reads the image bytes behind a record whose URI is a local path or a
    /// `file://` URI.
    pub async fn read_image_bytes(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let uri = self.export_source(id)?;
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::IoError(format!("Failed to read {}: {}", path, e)))
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut retired: Vec<String> = self.retired.iter().cloned().collect();
        retired.sort();
        Snapshot {
            records: self.records.clone(),
            retired,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.records = snapshot.records;
        self.retired = snapshot.retired.into_iter().collect();
    }

    fn require_backing(&self) -> Result<Backing, StoreError> {
        self.backing
            .clone()
            .ok_or_else(|| StoreError::PersistenceError("Store has no backing file".into()))
    }

    fn settle_load(&mut self, result: Result<Snapshot, StoreError>) -> Result<usize, StoreError> {
        match result {
            Ok(snapshot) => {
                self.restore(snapshot);
                self.memory_only = false;
                tracing::info!(records = self.records.len(), "library loaded");
                Ok(self.records.len())
            }
            Err(e) => {
                self.memory_only = true;
                tracing::warn!("Failed to load library, continuing in memory: {}", e);
                Err(e)
            }
        }
    }

    fn settle_persist(&mut self, result: Result<(), StoreError>) -> Result<(), StoreError> {
        match result {
            Ok(()) => {
                self.memory_only = false;
                tracing::info!(records = self.records.len(), "library persisted");
                Ok(())
            }
            Err(e) => {
                self.memory_only = true;
                tracing::warn!("Failed to persist library, continuing in memory: {}", e);
                Err(e)
            }
        }
    }

    /// Replaces the in-memory state with the persisted snapshot. On failure
    /// the in-memory state is left untouched.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub fn load(&mut self) -> Result<usize, StoreError> {
        let backing = self.require_backing()?;
        let result = backing.read();
        self.settle_load(result)
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub fn persist(&mut self) -> Result<(), StoreError> {
        let backing = self.require_backing()?;
        let result = backing.write(&self.snapshot());
        self.settle_persist(result)
    }

    pub async fn load_async(&mut self) -> Result<usize, StoreError> {
        let backing = self.require_backing()?;
        let result = tokio::task::spawn_blocking(move || backing.read())
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        self.settle_load(result)
    }

    /// Persists on the blocking pool. Taking `&mut self` keeps at most one
    /// write in flight.
    pub async fn persist_async(&mut self) -> Result<(), StoreError> {
        let backing = self.require_backing()?;
        let snapshot = self.snapshot();
        let result = tokio::task::spawn_blocking(move || backing.write(&snapshot))
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        self.settle_persist(result)
    }

    pub fn export_json(&self, path: &Path) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(&self.records)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        std::fs::write(path, data).map_err(|e| StoreError::IoError(e.to_string()))
    }

    /// Adds records from a JSON export. Records whose id is already known
    /// (live or retired) or that break the enrichment invariant are skipped.
    pub fn import_json(&mut self, path: &Path) -> Result<ImportReport, StoreError> {
        let data = std::fs::read_to_string(path).map_err(|e| StoreError::IoError(e.to_string()))?;
        let records: Vec<PhotoRecord> =
            serde_json::from_str(&data).map_err(|e| StoreError::SerializationError(e.to_string()))?;
        let mut report = ImportReport::default();
        // Oldest first so the export's head ends up at the head again.
        for record in records.into_iter().rev() {
            let id = record.id.clone();
            match self.create(record) {
                Ok(()) => report.imported += 1,
                Err(e) => {
                    tracing::debug!(id = %id, "skipping imported record: {}", e);
                    report.skipped += 1;
                }
            }
        }
        Ok(report)
    }
}
