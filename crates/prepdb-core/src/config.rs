use crate::error::{PrepError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Location of the state cache database, relative to the project root.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// Key under which the last-applied operation id is stored.
    #[serde(default = "default_cache_key")]
    pub key: String,
    /// How long a remembered operation id stays valid.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_CACHE_FILE)
}

fn default_cache_key() -> String {
    "last_operation".to_string()
}

fn default_ttl_secs() -> u64 {
    60 * 60 * 24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            key: default_cache_key(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandsConfig
// ---------------------------------------------------------------------------

/// Argv vectors for the external database tooling. `migrate` and `flush`
/// are required; the rest are optional capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    pub migrate: Vec<String>,
    pub flush: Vec<String>,
    /// Extra init step run after migrate (e.g. creating a cache table).
    #[serde(default)]
    pub create_cache_table: Option<Vec<String>>,
    /// Writes the store's current data to stdout.
    #[serde(default)]
    pub dump: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// On-disk artifact of the persistent store, relative to the project root.
    pub artifact: PathBuf,
    #[serde(default)]
    pub cache: CacheConfig,
    pub commands: CommandsConfig,
    /// Named data-loading operations: identifier to argv.
    #[serde(default)]
    pub operations: HashMap<String, Vec<String>>,
    /// Opaque settings profile appended to every external command as
    /// `--settings=<profile>`. Overridable via `PREPDB_PROFILE`.
    #[serde(default)]
    pub profile: Option<String>,
}

impl Config {
    /// Load `.prepdb/config.yaml` from `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(PrepError::NotConfigured(path));
        }
        let data = std::fs::read_to_string(&path)?;
        let mut cfg: Config = serde_yaml::from_str(&data)?;
        if let Ok(profile) = std::env::var("PREPDB_PROFILE") {
            if !profile.is_empty() {
                cfg.profile = Some(profile);
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let mut argvs: Vec<(&str, &Vec<String>)> = vec![
            ("commands.migrate", &self.commands.migrate),
            ("commands.flush", &self.commands.flush),
        ];
        if let Some(argv) = &self.commands.create_cache_table {
            argvs.push(("commands.create_cache_table", argv));
        }
        if let Some(argv) = &self.commands.dump {
            argvs.push(("commands.dump", argv));
        }
        for (name, argv) in argvs {
            if argv.is_empty() {
                return Err(PrepError::InvalidConfig(format!("{name} is empty")));
            }
        }
        for (id, argv) in &self.operations {
            if argv.is_empty() {
                return Err(PrepError::InvalidConfig(format!(
                    "operation '{id}' has an empty command"
                )));
            }
        }
        Ok(())
    }

    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        root.join(&self.artifact)
    }

    pub fn cache_path(&self, root: &Path) -> PathBuf {
        root.join(&self.cache.path)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
