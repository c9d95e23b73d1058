use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use taskmate_client::SessionStore;

/// `$TASKMATE_HOME`, else `~/.taskmate`.
pub fn taskmate_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TASKMATE_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".taskmate"))
}

pub fn ensure_taskmate_home() -> Result<PathBuf> {
    let dir = taskmate_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn session_path() -> Result<PathBuf> {
    Ok(ensure_taskmate_home()?.join("session.json"))
}

pub fn open_session() -> Result<SessionStore> {
    Ok(SessionStore::file(session_path()?))
}
