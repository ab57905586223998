//! Persistence layer for SOH state
//!
//! The SOH estimator only sees the [`SohStore`] interface. The production
//! store keeps a JSON document with one object per namespace, so other
//! state can share the file without being clobbered.

use crate::error::{BmsError, Result};
use crate::logging::get_logger;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Flat key-value record persisted for the SOH estimator.
///
/// Every field is optional on read so a partially written or older record
/// falls back to defaults key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SohRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cycles: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equivalent_full_cycles: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_capacity: Option<f64>,
}

/// Durable storage for [`SohRecord`]s
pub trait SohStore: Send {
    /// `Ok(None)` when nothing has been stored yet
    fn load(&mut self) -> Result<Option<SohRecord>>;

    fn save(&mut self, record: &SohRecord) -> Result<()>;
}

/// JSON file store: `{ "<namespace>": { "soh": .., "totalCycles": .. } }`
pub struct JsonFileStore {
    path: PathBuf,
    namespace: String,
    logger: crate::logging::StructuredLogger,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P, namespace: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            namespace: namespace.to_string(),
            logger: get_logger("persistence"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn read_document(&self) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<serde_json::Value>(&contents)? {
            serde_json::Value::Object(map) => Ok(Some(map)),
            _ => Err(BmsError::storage(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl SohStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<SohRecord>> {
        let Some(doc) = self.read_document()? else {
            self.logger
                .info("No persistent SOH state found, using defaults");
            return Ok(None);
        };
        let Some(section) = doc.get(&self.namespace) else {
            return Ok(None);
        };
        let record: SohRecord = serde_json::from_value(section.clone())?;
        self.logger.info(&format!(
            "Loaded SOH state from {} [{}]",
            self.path.display(),
            self.namespace
        ));
        Ok(Some(record))
    }

    fn save(&mut self, record: &SohRecord) -> Result<()> {
        // A corrupt document is replaced rather than blocking saves forever
        let mut doc = match self.read_document() {
            Ok(doc) => doc.unwrap_or_default(),
            Err(e) => {
                self.logger
                    .warn(&format!("Replacing unreadable state file: {}", e));
                serde_json::Map::new()
            }
        };
        doc.insert(self.namespace.clone(), serde_json::to_value(record)?);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&serde_json::Value::Object(doc))?;
        // Write a sibling file and rename it over the target so a power cut
        // leaves either the old document or the new one
        let tmp = self.temp_path();
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        self.logger.debug("Saved SOH state to disk");
        Ok(())
    }
}

/// In-memory store; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<SohRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: SohRecord) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(record))),
        }
    }

    /// Last saved record, if any
    pub fn record(&self) -> Option<SohRecord> {
        self.slot.lock().ok().and_then(|g| g.clone())
    }
}

impl SohStore for MemoryStore {
    fn load(&mut self) -> Result<Option<SohRecord>> {
        self.slot
            .lock()
            .map(|g| g.clone())
            .map_err(|_| BmsError::storage("memory store lock poisoned"))
    }

    fn save(&mut self, record: &SohRecord) -> Result<()> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| BmsError::storage("memory store lock poisoned"))?;
        *guard = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_camel_case_keys() {
        let record = SohRecord {
            soh: Some(99.5),
            total_cycles: Some(50.0),
            equivalent_full_cycles: Some(50.0),
            current_capacity: Some(5.97),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["totalCycles"], 50.0);
        assert_eq!(json["equivalentFullCycles"], 50.0);
        assert_eq!(json["currentCapacity"], 5.97);
    }

    #[test]
    fn partial_record_leaves_missing_keys_empty() {
        let record: SohRecord = serde_json::from_str(r#"{"soh": 90.0}"#).unwrap();
        assert_eq!(record.soh, Some(90.0));
        assert_eq!(record.total_cycles, None);
    }

    #[test]
    fn memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let mut writer = store.clone();
        writer
            .save(&SohRecord {
                soh: Some(95.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.record().and_then(|r| r.soh), Some(95.0));
    }
}
