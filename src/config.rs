//! Configuration for taskboard, read from `.taskboard/taskboard.toml`.
//!
//! Layering is file → environment → CLI flags. Every field has a default,
//! so a missing file or a partial one is fine.
//!
//! ```toml
//! [server]
//! port = 3141
//! db_path = ".taskboard/board.db"
//! dev = false
//!
//! [board]
//! reorder_policy = "swap"
//!
//! [sync]
//! server_url = "http://127.0.0.1:3141"
//! poll_interval_ms = 5000
//! edit_debounce_ms = 500
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskboard_common::ReorderPolicy;

use crate::board::server::ServerConfig;
use crate::client::SyncSettings;

pub const CONFIG_DIR: &str = ".taskboard";
pub const CONFIG_FILE: &str = "taskboard.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Bind on all interfaces and allow any CORS origin.
    #[serde(default)]
    pub dev: bool,
}

fn default_port() -> u16 {
    3141
}

fn default_db_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("board.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: default_db_path(),
            dev: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardSection {
    #[serde(default)]
    pub reorder_policy: ReorderPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_edit_debounce_ms")]
    pub edit_debounce_ms: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:3141".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_edit_debounce_ms() -> u64 {
    500
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_ms: default_poll_interval_ms(),
            edit_debounce_ms: default_edit_debounce_ms(),
        }
    }
}

impl SyncSection {
    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            edit_debounce: Duration::from_millis(self.edit_debounce_ms),
        }
    }
}

/// Contents of `taskboard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskboardToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub sync: SyncSection,
}

impl TaskboardToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse taskboard.toml")
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize taskboard.toml")?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `TASKBOARD_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("TASKBOARD_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid TASKBOARD_PORT '{}'", port))?;
        }
        if let Some(path) = lookup("TASKBOARD_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(policy) = lookup("TASKBOARD_REORDER_POLICY") {
            self.board.reorder_policy = policy
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid TASKBOARD_REORDER_POLICY")?;
        }
        if let Some(url) = lookup("TASKBOARD_SERVER_URL") {
            self.sync.server_url = url;
        }
        Ok(())
    }

    /// Check the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; the OS will pick a random port".to_string());
        }
        if self.sync.poll_interval_ms == 0 {
            warnings.push("sync.poll_interval_ms must be greater than 0".to_string());
        }
        if self.sync.edit_debounce_ms == 0 {
            warnings.push(
                "sync.edit_debounce_ms is 0; every keystroke will be written".to_string(),
            );
        }
        if self.sync.edit_debounce_ms >= self.sync.poll_interval_ms {
            warnings.push(format!(
                "sync.edit_debounce_ms ({}) is not shorter than sync.poll_interval_ms ({})",
                self.sync.edit_debounce_ms, self.sync.poll_interval_ms
            ));
        }
        match reqwest::Url::parse(&self.sync.server_url) {
            Ok(url) if url.cannot_be_a_base() => warnings.push(format!(
                "sync.server_url '{}' is not an http(s) base URL",
                self.sync.server_url
            )),
            Ok(_) => {}
            Err(e) => warnings.push(format!(
                "Invalid sync.server_url '{}': {}",
                self.sync.server_url, e
            )),
        }

        warnings
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.server.port,
            db_path: self.server.db_path.clone(),
            dev_mode: self.server.dev,
            reorder_policy: self.board.reorder_policy,
        }
    }
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct TaskboardConfig {
    pub config_path: PathBuf,
    pub toml: TaskboardToml,
}

impl TaskboardConfig {
    /// Default config location under `project_dir`.
    pub fn default_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load from `path` (or the default location) and apply the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path(Path::new(".")),
        };
        let mut toml = TaskboardToml::load_or_default(&config_path)?;
        toml.apply_env()?;
        Ok(Self { config_path, toml })
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
