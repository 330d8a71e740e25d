//! SQLite snapshot file behind the in-memory store.
//!
//! A snapshot is always written to a fresh staging database next to the live
//! file and renamed over it once complete, so the live file is either the old
//! snapshot or the new one, never a mix.

use crate::StoreError;
use lookup_client::{Coordinates, PhotoRecord};
use rusqlite::{params, Connection};
use rusqlite_migration::{Migrations, M};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Records in store order (head first).
    pub records: Vec<PhotoRecord>,
    /// Every id that was deleted and may never be handed out again.
    pub retired: Vec<String>,
}

fn apply_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let migrations = Migrations::new(vec![
        M::up(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);\
             INSERT INTO schema_version (version) VALUES (1);\
             CREATE TABLE IF NOT EXISTS photos (\
                 id TEXT PRIMARY KEY,\
                 uri TEXT NOT NULL,\
                 timestamp INTEGER NOT NULL,\
                 latitude REAL,\
                 longitude REAL,\
                 address TEXT,\
                 weather TEXT,\
                 position INTEGER NOT NULL\
             );",
        ),
        M::up(
            "CREATE TABLE IF NOT EXISTS retired_ids (id TEXT PRIMARY KEY);\
             CREATE INDEX IF NOT EXISTS idx_photos_timestamp ON photos (timestamp);\
             UPDATE schema_version SET version = 2;",
        ),
    ]);
    migrations
        .to_latest(conn)
        .map_err(|e| StoreError::PersistenceError(format!("Failed to apply migrations: {}", e)))?;
    Ok(())
}

/// Removes the staging file on drop unless the swap went through.
struct StagedFile {
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        StagedFile { path, committed: false }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed && self.path.is_file() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Failed to remove staging file {:?}: {}", self.path, e);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Backing {
    path: PathBuf,
}

impl Backing {
    pub fn new(path: &Path) -> Self {
        Backing { path: path.to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "photos.sqlite".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Reads the persisted snapshot. A missing file is an empty library.
    pub fn read(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }
        let mut conn = Connection::open(&self.path)
            .map_err(|e| StoreError::PersistenceError(format!("Failed to open database: {}", e)))?;
        apply_migrations(&mut conn)?;

        let records = {
            let mut stmt = conn
                .prepare(
                    "SELECT id, uri, timestamp, latitude, longitude, address, weather
                     FROM photos ORDER BY position",
                )
                .map_err(|e| StoreError::PersistenceError(format!("Failed to prepare statement: {}", e)))?;
            let rows = stmt
                .query_map([], |row| {
                    let latitude: Option<f64> = row.get(3)?;
                    let longitude: Option<f64> = row.get(4)?;
                    Ok(PhotoRecord {
                        id: row.get(0)?,
                        uri: row.get(1)?,
                        timestamp: row.get(2)?,
                        coordinates: match (latitude, longitude) {
                            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
                            _ => None,
                        },
                        address: row.get(5)?,
                        weather: row.get(6)?,
                    })
                })
                .map_err(|e| StoreError::PersistenceError(format!("Failed to query photos: {}", e)))?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row.map_err(|e| {
                    StoreError::PersistenceError(format!("Failed to read photo row: {}", e))
                })?);
            }
            records
        };

        let retired = {
            let mut stmt = conn
                .prepare("SELECT id FROM retired_ids ORDER BY id")
                .map_err(|e| StoreError::PersistenceError(format!("Failed to prepare statement: {}", e)))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::PersistenceError(format!("Failed to query retired ids: {}", e)))?;
            let mut retired = Vec::new();
            for row in rows {
                retired.push(row.map_err(|e| {
                    StoreError::PersistenceError(format!("Failed to read retired id: {}", e))
                })?);
            }
            retired
        };

        conn.close()
            .map_err(|(_, e)| StoreError::PersistenceError(format!("Failed to close database: {}", e)))?;
        Ok(Snapshot { records, retired })
    }

    /// Writes `snapshot` to a staging file and swaps it in for the live file.
    pub fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let staging = self.staging_path();
        if staging.exists() {
            std::fs::remove_file(&staging).map_err(|e| {
                StoreError::PersistenceError(format!("Failed to clear stale staging file: {}", e))
            })?;
        }
        let mut guard = StagedFile::new(staging.clone());

        let mut conn = Connection::open(&staging)
            .map_err(|e| StoreError::PersistenceError(format!("Failed to open staging database: {}", e)))?;
        apply_migrations(&mut conn)?;
        {
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::PersistenceError(format!("Failed to begin transaction: {}", e)))?;
            {
                let mut insert = tx
                    .prepare(
                        "INSERT INTO photos (id, uri, timestamp, latitude, longitude, address, weather, position)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )
                    .map_err(|e| StoreError::PersistenceError(format!("Failed to prepare insert: {}", e)))?;
                for (position, record) in snapshot.records.iter().enumerate() {
                    insert
                        .execute(params![
                            record.id,
                            record.uri,
                            record.timestamp,
                            record.coordinates.map(|c| c.latitude),
                            record.coordinates.map(|c| c.longitude),
                            record.address,
                            record.weather,
                            position as i64,
                        ])
                        .map_err(|e| StoreError::PersistenceError(format!("Failed to insert photo: {}", e)))?;
                }
                let mut retire = tx
                    .prepare("INSERT OR IGNORE INTO retired_ids (id) VALUES (?1)")
                    .map_err(|e| StoreError::PersistenceError(format!("Failed to prepare insert: {}", e)))?;
                for id in &snapshot.retired {
                    retire
                        .execute(params![id])
                        .map_err(|e| StoreError::PersistenceError(format!("Failed to insert retired id: {}", e)))?;
                }
            }
            tx.commit()
                .map_err(|e| StoreError::PersistenceError(format!("Failed to commit snapshot: {}", e)))?;
        }
        conn.close()
            .map_err(|(_, e)| StoreError::PersistenceError(format!("Failed to close staging database: {}", e)))?;

        std::fs::rename(&staging, &self.path)
            .map_err(|e| StoreError::PersistenceError(format!("Failed to swap in snapshot: {}", e)))?;
        guard.committed = true;
        Ok(())
    }
}
