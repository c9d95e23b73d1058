//! Session Store: the bearer token's lifecycle plus the small amount of
//! state that rides along with it (cached profile, post-login redirect).
//!
//! Every read goes back to the backend and re-checks expiry; nothing is
//! trusted from an earlier call.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
}

/// What gets persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub profile: Option<Profile>,
    /// Last protected destination reached while signed out.
    #[serde(default)]
    pub return_to: Option<String>,
}

pub trait SessionBackend: Send + Sync {
    fn load(&self) -> Result<SessionRecord, ApiError>;
    fn store(&self, record: &SessionRecord) -> Result<(), ApiError>;
}

/// JSON file on disk; survives restarts.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionBackend for FileBackend {
    fn load(&self) -> Result<SessionRecord, ApiError> {
        if !self.path.exists() {
            return Ok(SessionRecord::default());
        }
        let s = fs::read_to_string(&self.path)
            .map_err(|e| ApiError::Session(format!("read {}: {e}", self.path.display())))?;
        match serde_json::from_str(&s) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable session file: {e}");
                Ok(SessionRecord::default())
            }
        }
    }

    fn store(&self, record: &SessionRecord) -> Result<(), ApiError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| ApiError::Session(format!("create {}: {e}", dir.display())))?;
        }
        let s = serde_json::to_string_pretty(record)
            .map_err(|e| ApiError::Session(e.to_string()))?;
        fs::write(&self.path, s)
            .map_err(|e| ApiError::Session(format!("write {}: {e}", self.path.display())))
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    record: Mutex<SessionRecord>,
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<SessionRecord, ApiError> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, record: &SessionRecord) -> Result<(), ApiError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = record.clone();
        Ok(())
    }
}

/// Shared handle; clones see the same storage.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(backend: impl SessionBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(path))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    /// Persist a token, replacing any previous one. The cached profile
    /// belonged to the old token and is dropped.
    pub fn save(&self, token: &str) -> Result<(), ApiError> {
        let mut record = self.backend.load()?;
        record.token = Some(token.to_string());
        record.profile = None;
        self.backend.store(&record)?;
        tracing::info!("session token saved");
        Ok(())
    }

    /// Sign-in in a single write: token and profile land together and the
    /// pending post-login destination is consumed. Nothing changes if the
    /// write fails.
    pub fn establish(&self, token: &str, profile: &Profile) -> Result<Option<String>, ApiError> {
        let mut record = self.backend.load()?;
        let redirect = record.return_to.take();
        record.token = Some(token.to_string());
        record.profile = Some(profile.clone());
        self.backend.store(&record)?;
        tracing::info!("session established");
        Ok(redirect)
    }

    /// The stored token if it is still valid.
    pub fn current(&self) -> Result<Option<String>, ApiError> {
        self.current_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn current_at(&self, now_millis: i64) -> Result<Option<String>, ApiError> {
        let record = self.backend.load()?;
        let Some(token) = record.token else {
            return Ok(None);
        };
        if taskmate_core::is_expired_at(&token, now_millis) {
            tracing::debug!("stored token is expired or undecodable");
            return Ok(None);
        }
        Ok(Some(token))
    }

    /// Remove the token and the cached profile.
    pub fn clear(&self) -> Result<(), ApiError> {
        let mut record = self.backend.load()?;
        if record.token.is_none() && record.profile.is_none() {
            return Ok(());
        }
        record.token = None;
        record.profile = None;
        self.backend.store(&record)?;
        tracing::info!("session cleared");
        Ok(())
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<(), ApiError> {
        let mut record = self.backend.load()?;
        record.profile = Some(profile.clone());
        self.backend.store(&record)
    }

    /// Cached profile, only while the token is still valid.
    pub fn profile(&self) -> Result<Option<Profile>, ApiError> {
        if self.current()?.is_none() {
            return Ok(None);
        }
        Ok(self.backend.load()?.profile)
    }

    pub fn set_return_to(&self, destination: &str) -> Result<(), ApiError> {
        let mut record = self.backend.load()?;
        record.return_to = Some(destination.to_string());
        self.backend.store(&record)
    }

    /// Read and forget the post-login destination.
    pub fn take_return_to(&self) -> Result<Option<String>, ApiError> {
        let mut record = self.backend.load()?;
        let out = record.return_to.take();
        if out.is_some() {
            self.backend.store(&record)?;
        }
        Ok(out)
    }
}
