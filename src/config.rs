//! Configuration for the workspace index.
//!
//! Layered configuration: defaults, then a TOML file under the workspace's
//! `.groovy-lsp` directory, then environment variable overrides.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `GROOVY_INDEX_` and use double underscores
//! to separate nested levels:
//! - `GROOVY_INDEX_INDEXING__PARALLEL_THREADS=8` sets `indexing.parallel_threads`
//! - `GROOVY_INDEX_MEMORY__MAX_MEMORY_MB=4096` sets `memory.max_memory_mb`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory created under the workspace root for all persistent state.
pub const WORKSPACE_STATE_DIR: &str = ".groovy-lsp";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Index directory, relative to the workspace root.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of worker threads for parse jobs.
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Also index `.java` sources found in the workspace.
    #[serde(default = "default_true")]
    pub include_java: bool,

    /// Glob patterns excluded from the workspace walk.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    /// Maximum size of the store's memory map, in bytes.
    #[serde(default = "default_map_size")]
    pub map_size_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemoryConfig {
    /// Memory budget for the process, in mebibytes.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,

    /// Eviction triggers above this percentage of the budget.
    #[serde(default = "default_target_percent")]
    pub target_percent: u8,

    /// Seconds between memory-pressure checks.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level filter (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_index_dir() -> PathBuf {
    PathBuf::from(WORKSPACE_STATE_DIR).join("index")
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_true() -> bool {
    true
}
fn default_map_size() -> usize {
    crate::store::DEFAULT_MAP_SIZE
}
fn default_max_memory_mb() -> u64 {
    2048
}
fn default_target_percent() -> u8 {
    70
}
fn default_check_interval() -> u64 {
    300
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_dir: default_index_dir(),
            indexing: IndexingConfig::default(),
            store: StoreConfig::default(),
            memory: MemoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            include_java: true,
            ignore_patterns: vec![
                "build/**".to_string(),
                ".gradle/**".to_string(),
                "target/**".to_string(),
                "out/**".to_string(),
            ],
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            map_size_bytes: default_map_size(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: default_max_memory_mb(),
            target_percent: default_target_percent(),
            check_interval_secs: default_check_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration for a workspace: defaults, then
    /// `<root>/.groovy-lsp/settings.toml` if present, then environment.
    pub fn load_for_workspace(workspace_root: &Path) -> Result<Self, figment::Error> {
        let config_path = workspace_root.join(WORKSPACE_STATE_DIR).join("settings.toml");
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GROOVY_INDEX_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
    }

    /// Save the current configuration.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Absolute index directory for a workspace root.
    pub fn index_path(&self, workspace_root: &Path) -> PathBuf {
        if self.index_dir.is_absolute() {
            self.index_dir.clone()
        } else {
            workspace_root.join(&self.index_dir)
        }
    }

    /// Eviction threshold derived from the memory budget.
    pub fn memory_target_mb(&self) -> u64 {
        self.memory.max_memory_mb * u64::from(self.memory.target_percent) / 100
    }
}
