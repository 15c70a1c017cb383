//! Workspace persistence.
//!
//! Two layers:
//!
//! - [`KeyValueStore`]: a string-keyed slot store (`get`/`set`). The file
//!   backed [`FileStore`] keeps one `<key>.json` per slot; [`MemoryStore`]
//!   serves tests.
//! - [`WorkspaceRepository`]: loads and saves a whole [`WorkspaceState`].
//!   [`StoreRepository`] maps it onto two slots:
//!
//! | Slot | Contents |
//! |------|----------|
//! | `configs` | JSON array of `{project, feeds}` |
//! | `openedConfigNum` | JSON integer (or `null`) |
//!
//! ## Degraded loads
//!
//! Loading never fails. A missing slot takes its default (empty list, index
//! `0`) and so does a slot that fails to parse, with a warning logged. The
//! unreadable data stays on disk until the next save overwrites it.
//!
//! Saving writes the two slots one after the other. There is only ever one
//! writer, so the pair is never observed half-written by another reader.

use crate::types::ProjectConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

pub const CONFIGS_KEY: &str = "configs";
pub const OPENED_KEY: &str = "openedConfigNum";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// String slots addressed by key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store; contents vanish with the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per slot inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.slot_path(key), value)?;
        Ok(())
    }
}

/// Everything the workspace persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    pub configs: Vec<ProjectConfig>,
    /// Project being edited, if any.
    pub opened_config_num: Option<usize>,
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self {
            configs: Vec::new(),
            opened_config_num: Some(0),
        }
    }
}

/// Loads and saves a whole workspace.
pub trait WorkspaceRepository {
    /// Never fails; unreadable data degrades to defaults.
    fn load(&self) -> WorkspaceState;

    fn save(&mut self, state: &WorkspaceState) -> Result<(), StoreError>;
}

/// [`WorkspaceRepository`] on top of a [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreRepository<S> {
    store: S,
}

impl<S: KeyValueStore> StoreRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read_slot<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "could not read workspace slot, using default");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "workspace slot is not valid JSON, using default");
                None
            }
        }
    }
}

impl<S: KeyValueStore> WorkspaceRepository for StoreRepository<S> {
    fn load(&self) -> WorkspaceState {
        let defaults = WorkspaceState::default();
        let state = WorkspaceState {
            configs: self.read_slot(CONFIGS_KEY).unwrap_or(defaults.configs),
            opened_config_num: self
                .read_slot(OPENED_KEY)
                .unwrap_or(defaults.opened_config_num),
        };
        debug!(
            projects = state.configs.len(),
            opened = ?state.opened_config_num,
            "loaded workspace"
        );
        state
    }

    fn save(&mut self, state: &WorkspaceState) -> Result<(), StoreError> {
        self.store
            .set(CONFIGS_KEY, &serde_json::to_string(&state.configs)?)?;
        self.store
            .set(OPENED_KEY, &serde_json::to_string(&state.opened_config_num)?)?;
        Ok(())
    }
}
