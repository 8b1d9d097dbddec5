//! Persistent storage for the session's token slots.
//!
//! `SessionStore` is the seam the manager depends on. `MemoryStore` backs
//! tests and embedded use; `FileStore` persists to a JSON document next to the
//! rest of the application data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::tokens::{TokenPair, TokenSlot};

/// Session file name in the data directory
pub const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode session file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Synchronous get/set/remove over the two token slots.
///
/// Writes must be visible to the next read on the same store.
pub trait SessionStore: Send + Sync {
    fn get(&self, slot: TokenSlot) -> Option<String>;

    fn set(&self, slot: TokenSlot, value: &str) -> Result<(), StoreError>;

    fn remove(&self, slot: TokenSlot) -> Result<(), StoreError>;

    /// Remove both slots. Idempotent.
    fn clear(&self) -> Result<(), StoreError> {
        for slot in TokenSlot::ALL {
            self.remove(slot)?;
        }
        Ok(())
    }

    fn pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.get(TokenSlot::Access),
            refresh_token: self.get(TokenSlot::Refresh),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<TokenSlot, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        let mut slots = HashMap::new();
        if let Some(access) = pair.access_token {
            slots.insert(TokenSlot::Access, access);
        }
        if let Some(refresh) = pair.refresh_token {
            slots.insert(TokenSlot::Refresh, refresh);
        }
        Self {
            slots: Mutex::new(slots),
        }
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, slot: TokenSlot) -> Option<String> {
        lock(&self.slots).get(&slot).cloned()
    }

    fn set(&self, slot: TokenSlot, value: &str) -> Result<(), StoreError> {
        lock(&self.slots).insert(slot, value.to_string());
        Ok(())
    }

    fn remove(&self, slot: TokenSlot) -> Result<(), StoreError> {
        lock(&self.slots).remove(&slot);
        Ok(())
    }
}

/// On-disk layout of the session file. Field names must serialize to
/// `TokenSlot::key()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    /// Written by the OTP flow; carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl SessionDocument {
    fn slot_mut(&mut self, slot: TokenSlot) -> &mut Option<String> {
        match slot {
            TokenSlot::Access => &mut self.auth_token,
            TokenSlot::Refresh => &mut self.refresh_token,
        }
    }

    fn slot(&self, slot: TokenSlot) -> Option<&String> {
        match slot {
            TokenSlot::Access => self.auth_token.as_ref(),
            TokenSlot::Refresh => self.refresh_token.as_ref(),
        }
    }

    fn is_empty(&self) -> bool {
        self.auth_token.is_none() && self.refresh_token.is_none() && self.reset_token.is_none()
    }
}

/// JSON-file backed store. The file is read once on open; every write goes
/// to the in-memory copy first and is then flushed to disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    doc: Mutex<SessionDocument>,
}

impl FileStore {
    /// Open (or lazily create) the session file at `path`.
    ///
    /// An unreadable or corrupt file is treated as an empty session.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = Self::read_document(&path).unwrap_or_default();
        Self {
            path,
            doc: Mutex::new(doc),
        }
    }

    /// Open `session.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::open(dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(path: &Path) -> Option<SessionDocument> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(doc) => Some(doc),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn persist(&self, doc: &SessionDocument) -> Result<(), StoreError> {
        if doc.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_error(e)),
            };
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let contents = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, contents).map_err(|e| self.io_error(e))
    }

    /// Write `next` to disk, then make it the visible state. A failed write
    /// leaves both the file and the in-memory copy as they were.
    fn commit(&self, doc: &mut SessionDocument, mut next: SessionDocument) -> Result<(), StoreError> {
        next.updated_at = Some(Utc::now());
        self.persist(&next)?;
        *doc = next;
        Ok(())
    }

    fn update(&self, slot: TokenSlot, value: Option<&str>) -> Result<(), StoreError> {
        let mut doc = lock(&self.doc);
        if doc.slot(slot).map(String::as_str) == value {
            return Ok(());
        }
        let mut next = doc.clone();
        *next.slot_mut(slot) = value.map(str::to_string);
        self.commit(&mut doc, next)?;
        debug!(key = slot.key(), present = value.is_some(), "Session slot written");
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, slot: TokenSlot) -> Option<String> {
        lock(&self.doc).slot(slot).cloned()
    }

    fn set(&self, slot: TokenSlot, value: &str) -> Result<(), StoreError> {
        self.update(slot, Some(value))
    }

    fn remove(&self, slot: TokenSlot) -> Result<(), StoreError> {
        self.update(slot, None)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut doc = lock(&self.doc);
        if doc.auth_token.is_none() && doc.refresh_token.is_none() {
            return Ok(());
        }
        let next = SessionDocument {
            auth_token: None,
            refresh_token: None,
            ..doc.clone()
        };
        self.commit(&mut doc, next)
    }
}
