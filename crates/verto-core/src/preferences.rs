use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Connecting,
    Connected,
}

/// Persisted user preferences and call bookkeeping.
///
/// Shared between the session and the controller; last writer wins.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub ui_connected: bool,
    #[serde(default)]
    pub ws_connected: bool,

    #[serde(default)]
    pub muted_mic: bool,
    #[serde(default)]
    pub muted_video: bool,
    #[serde(default)]
    pub call_start: Option<DateTime<Utc>>,
    /// Set once the current call went active.
    #[serde(default)]
    pub cur_call: bool,
    #[serde(default)]
    pub user_status: Option<UserStatus>,
    #[serde(default)]
    pub calling: bool,
    #[serde(default)]
    pub video_call: bool,
    #[serde(default)]
    pub on_hold: bool,
    #[serde(default)]
    pub called_number: Option<String>,
    #[serde(default)]
    pub ask_recover_call: bool,

    #[serde(default = "default_true")]
    pub use_video: bool,
    #[serde(default = "default_true")]
    pub use_stereo: bool,
    #[serde(default = "default_true")]
    pub use_stun: bool,
    #[serde(default)]
    pub use_dedenc: bool,
    #[serde(default)]
    pub mirror_input: bool,
    #[serde(default)]
    pub selected_video: Option<String>,
    #[serde(default)]
    pub selected_audio: Option<String>,
    #[serde(default = "default_bandwidth")]
    pub outgoing_bandwidth: String,
    #[serde(default = "default_bandwidth")]
    pub incoming_bandwidth: String,
    #[serde(default)]
    pub vid_qual: Option<String>,
    #[serde(default)]
    pub echo_cancellation: bool,
    #[serde(default)]
    pub noise_suppression: bool,
    #[serde(default)]
    pub highpass_filter: bool,
}

fn default_true() -> bool {
    true
}

fn default_bandwidth() -> String {
    "default".to_string()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            login: None,
            password: None,
            name: None,
            email: None,
            ui_connected: false,
            ws_connected: false,
            muted_mic: false,
            muted_video: false,
            call_start: None,
            cur_call: false,
            user_status: None,
            calling: false,
            video_call: false,
            on_hold: false,
            called_number: None,
            ask_recover_call: false,
            use_video: true,
            use_stereo: true,
            use_stun: true,
            use_dedenc: false,
            mirror_input: false,
            selected_video: None,
            selected_audio: None,
            outgoing_bandwidth: default_bandwidth(),
            incoming_bandwidth: default_bandwidth(),
            vid_qual: None,
            echo_cancellation: false,
            noise_suppression: false,
            highpass_filter: false,
        }
    }
}

/// Key-value preference record, optionally backed by a JSON file.
pub struct PreferencesStore {
    prefs: Mutex<Preferences>,
    file_path: Option<PathBuf>,
}

impl PreferencesStore {
    pub fn new(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("preferences.json");
        let prefs = Self::load(&file_path);
        Self {
            prefs: Mutex::new(prefs),
            file_path: Some(file_path),
        }
    }

    /// Store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            prefs: Mutex::new(Preferences::default()),
            file_path: None,
        }
    }

    pub fn get(&self) -> Preferences {
        self.lock().clone()
    }

    /// Mutate the record and persist it.
    pub fn update<R>(&self, f: impl FnOnce(&mut Preferences) -> R) -> R {
        let result = f(&mut self.lock());
        self.save();
        result
    }

    /// Drop every stored value.
    pub fn reset(&self) {
        *self.lock() = Preferences::default();
        self.save();
    }

    fn lock(&self) -> MutexGuard<'_, Preferences> {
        match self.prefs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn save(&self) {
        let Some(path) = &self.file_path else {
            return;
        };
        let prefs = self.get();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("cannot create preferences dir: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(&prefs) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::warn!("cannot write preferences: {e}");
                }
            }
            Err(e) => tracing::warn!("cannot serialize preferences: {e}"),
        }
    }

    fn load(path: &Path) -> Preferences {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("corrupt preferences file, using defaults: {e}");
                Preferences::default()
            }),
            Err(_) => Preferences::default(),
        }
    }
}
