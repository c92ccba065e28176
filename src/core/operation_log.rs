//! Durable operation log.
//!
//! Records are append-then-finalize: the executor appends an open record,
//! checkpoints it while running and closes it once. Finalized records are
//! never rewritten.

use crate::models::operation::OperationRecord;
use crate::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Storage for operation records.
pub trait OperationLog: Send + Sync {
    /// Store a new record. Fails if the id is already present.
    fn append(&self, record: &OperationRecord) -> Result<()>;

    /// Look up a record by id.
    fn get(&self, operation_id: &str) -> Result<Option<OperationRecord>>;

    /// Replace a stored record that has not been finalized yet.
    fn update(&self, record: &OperationRecord) -> Result<()>;

    /// All records, oldest first.
    fn list(&self) -> Result<Vec<OperationRecord>>;

    /// Rollback records that reverse `operation_id`.
    fn find_rollback_of(&self, operation_id: &str) -> Result<Vec<OperationRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.rollback_of.as_deref() == Some(operation_id))
            .collect())
    }
}

/// One pretty-printed JSON file per record.
#[derive(Debug, Clone)]
pub struct JsonOperationLog {
    dir: PathBuf,
}

impl JsonOperationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, operation_id: &str) -> Result<PathBuf> {
        let valid = !operation_id.is_empty()
            && operation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(crate::Error::OperationNotFound(operation_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", operation_id)))
    }

    /// Write through a temp file so a crash never leaves a torn record.
    fn write_record(&self, record: &OperationRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.record_path(&record.id)?;
        let tmp = self.dir.join(format!("{}.json.tmp", record.id));

        let json = serde_json::to_string_pretty(record)?;
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &path)?;

        tracing::debug!("Operation record {} saved to {:?}", record.id, path);
        Ok(())
    }
}

impl OperationLog for JsonOperationLog {
    fn append(&self, record: &OperationRecord) -> Result<()> {
        if self.record_path(&record.id)?.exists() {
            return Err(crate::Error::InvalidState(format!(
                "operation {} already recorded",
                record.id
            )));
        }
        self.write_record(record)
    }

    fn get(&self, operation_id: &str) -> Result<Option<OperationRecord>> {
        let path = match self.record_path(operation_id) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn update(&self, record: &OperationRecord) -> Result<()> {
        match self.get(&record.id)? {
            None => Err(crate::Error::OperationNotFound(record.id.clone())),
            Some(existing) if existing.is_finalized() => Err(crate::Error::InvalidState(format!(
                "operation {} is already finalized",
                record.id
            ))),
            Some(_) => self.write_record(record),
        }
    }

    fn list(&self) -> Result<Vec<OperationRecord>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(crate::Error::from)
                .and_then(|content| Ok(serde_json::from_str::<OperationRecord>(&content)?));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable operation record {:?}: {}", path, e),
            }
        }

        records.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(records)
    }
}
