use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub number: String,
    pub direction: CallDirection,
    pub accepted: bool,
    pub at: DateTime<Utc>,
}

/// Log of placed and received calls, newest first, optionally backed by
/// a JSON file.
#[derive(Default)]
pub struct CallHistory {
    entries: Mutex<Vec<HistoryEntry>>,
    file_path: Option<PathBuf>,
}

impl CallHistory {
    /// History that is never written to disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// History persisted to `<data_dir>/call_history.json`.
    pub fn persistent(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("call_history.json");
        let entries = Self::load(&file_path);
        Self {
            entries: Mutex::new(entries),
            file_path: Some(file_path),
        }
    }

    pub fn add(&self, number: &str, direction: CallDirection, accepted: bool) {
        tracing::debug!("call history: {number} {direction:?} accepted={accepted}");
        let entry = HistoryEntry {
            number: number.to_string(),
            direction,
            accepted,
            at: Utc::now(),
        };
        self.lock().insert(0, entry);
        self.save();
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.save();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn save(&self) {
        let Some(path) = &self.file_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("cannot create history dir: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(&self.entries()) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::warn!("cannot write call history: {e}");
                }
            }
            Err(e) => tracing::warn!("cannot serialize call history: {e}"),
        }
    }

    fn load(path: &Path) -> Vec<HistoryEntry> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("corrupt call history file, starting empty: {e}");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }
}
