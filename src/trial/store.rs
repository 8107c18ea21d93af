//! Client-side persisted state with atomic writes.
//!
//! One JSON document per installation under `dirs::data_dir()/<namespace>/`,
//! holding the device record, the trial record, and the device-history ring.
//! Writes go through temp file + rename so two tabs racing on the same
//! document are last-write-safe rather than interleaved.
//!
//! When the data directory is unavailable the store degrades to ephemeral
//! mode: loads return fresh state, saves are no-ops, and every session looks
//! like a new device. The abuse heuristic tolerates that; the host UI never
//! crashes over it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::device::fingerprint::DeviceRecord;
use crate::device::history::DeviceHistory;
use crate::trial::record::TrialRecord;
use crate::TrialgateError;

const STATE_FILE: &str = "state.json";

/// Everything the client persists locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientState {
    /// Device identity, created on first boot.
    pub device: Option<DeviceRecord>,
    /// Trial record, created on first `start_trial`.
    pub trial: Option<TrialRecord>,
    /// Bounded device-history ring for the abuse heuristic.
    pub history: DeviceHistory,
}

impl ClientState {
    /// Fresh state with an empty history ring.
    pub fn new(retention: usize) -> Self {
        Self {
            device: None,
            trial: None,
            history: DeviceHistory::new(retention),
        }
    }
}

/// File-backed client store, or an ephemeral stand-in when persistence
/// is unavailable.
pub struct ClientStore {
    path: Option<PathBuf>,
    retention: usize,
}

impl ClientStore {
    /// Open the store under `dirs::data_dir()/<namespace>/`.
    ///
    /// Falls back to ephemeral mode (with a warning) if the directory
    /// cannot be located or created. Never errors.
    pub fn open(namespace: &str, retention: usize) -> Self {
        let dir = match dirs::data_dir() {
            Some(base) => base.join(namespace),
            None => {
                warn!("no data directory available, using ephemeral trial state");
                return Self::ephemeral(retention);
            }
        };

        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(error = %e, "could not create client store dir, using ephemeral trial state");
            return Self::ephemeral(retention);
        }

        Self {
            path: Some(dir.join(STATE_FILE)),
            retention,
        }
    }

    /// Open a store rooted at a specific directory (tests).
    pub fn with_dir(dir: PathBuf, retention: usize) -> Result<Self, TrialgateError> {
        fs::create_dir_all(&dir)
            .map_err(|e| TrialgateError::StorageUnavailable(format!("create store dir: {e}")))?;
        Ok(Self {
            path: Some(dir.join(STATE_FILE)),
            retention,
        })
    }

    /// In-memory store that persists nothing.
    pub fn ephemeral(retention: usize) -> Self {
        Self {
            path: None,
            retention,
        }
    }

    /// Whether this store persists across sessions.
    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    /// Load persisted state, or fresh state if none exists.
    ///
    /// A corrupt document is treated as missing: the trial restarts rather
    /// than the host crashing. The server-held record is what actually
    /// gates downloads, so local tampering buys nothing durable.
    pub fn load(&self) -> ClientState {
        let Some(path) = &self.path else {
            return ClientState::new(self.retention);
        };
        if !path.exists() {
            return ClientState::new(self.retention);
        }

        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "client state corrupt, starting fresh");
                    ClientState::new(self.retention)
                }
            },
            Err(e) => {
                warn!(error = %e, "client state unreadable, starting fresh");
                ClientState::new(self.retention)
            }
        }
    }

    /// Persist state atomically. A no-op in ephemeral mode.
    pub fn save(&self, state: &ClientState) -> Result<(), TrialgateError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| TrialgateError::StoreIO(format!("serialize state: {e}")))?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .map_err(|e| TrialgateError::StoreIO(format!("write temp file: {e}")))?;
        fs::rename(&temp_path, path)
            .map_err(|e| TrialgateError::StoreIO(format!("rename state file: {e}")))?;

        Ok(())
    }

}
