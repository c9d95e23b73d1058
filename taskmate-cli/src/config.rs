use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::ensure_taskmate_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// tracing-subscriber EnvFilter directive; RUST_LOG wins when set.
    pub filter: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: taskmate_client::DEFAULT_BASE_URL.to_string(),
            timeout_secs: taskmate_client::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// `TASKMATE_API_URL` overrides the file.
    pub fn base_url(&self) -> String {
        self.base_url_with(std::env::var("TASKMATE_API_URL").ok())
    }

    /// A blank override counts as unset.
    fn base_url_with(&self, env_override: Option<String>) -> String {
        let raw = env_override
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.api.base_url.clone());
        normalize_base_url(&raw)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_taskmate_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    println!("# {}", config_path()?.display());
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    println!("# effective base_url: {}", cfg.base_url());
    Ok(())
}

/// Trim whitespace and trailing slashes so paths can be appended directly.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
