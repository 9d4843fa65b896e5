//! Persistence adapter: one JSON document in one durable slot.

use crate::types::AppState;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the durable slot.
pub const SLOT_NAME: &str = "arcanum-app-state.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A durable slot holding the whole state graph.
///
/// `load` returns `None` both for an empty slot and for corrupt contents;
/// the caller falls back to defaults either way. Saves are fire-and-forget
/// from the caller's perspective; a failure loses at most the latest
/// mutation.
pub trait SlotStorage {
    fn load(&self) -> Option<AppState>;
    fn save(&self, state: &AppState) -> Result<(), StorageError>;
}

/// Slot backed by a JSON file in a data directory.
pub struct JsonSlotStorage {
    path: PathBuf,
}

impl JsonSlotStorage {
    /// Use `SLOT_NAME` inside `data_dir`, creating the directory as
    /// needed.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        fs::create_dir_all(data_dir.as_ref())?;
        Ok(Self {
            path: data_dir.as_ref().join(SLOT_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SlotStorage for JsonSlotStorage {
    fn load(&self) -> Option<AppState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                log::warn!("failed to read state slot {}: {err}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(err) => {
                log::warn!(
                    "corrupt state slot {}, falling back to defaults: {err}",
                    self.path.display()
                );
                None
            }
        }
    }

    fn save(&self, state: &AppState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-memory slot for tests and headless embedding.
#[derive(Default)]
pub struct MemorySlotStorage {
    slot: std::cell::RefCell<Option<AppState>>,
}

impl SlotStorage for MemorySlotStorage {
    fn load(&self) -> Option<AppState> {
        self.slot.borrow().clone()
    }

    fn save(&self, state: &AppState) -> Result<(), StorageError> {
        *self.slot.borrow_mut() = Some(state.clone());
        Ok(())
    }
}
