use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PREPDB_DIR: &str = ".prepdb";
pub const CONFIG_FILE: &str = ".prepdb/config.yaml";
pub const DEFAULT_CACHE_FILE: &str = ".prepdb/state.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn prepdb_dir(root: &Path) -> PathBuf {
    root.join(PREPDB_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn default_cache_path(root: &Path) -> PathBuf {
    root.join(DEFAULT_CACHE_FILE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
