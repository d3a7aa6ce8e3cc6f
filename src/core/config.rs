use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};

/// Smallest accepted `partial` bound.
pub const MIN_PARTIAL: usize = 2;
/// Largest accepted `full` bound.
pub const MAX_FULL: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_path: PathBuf,

    // Tokenizer bounds
    pub partial: usize,                 // Shortest n-gram (and shortest indexable word)
    pub full: usize,                    // Longest n-gram; longer words are also kept whole

    // Writer pool
    pub max_threads: usize,             // Live worker slots
    pub batch_size: usize,              // Documents handed to one worker

    // Admission control
    pub low_memory_floor_mb: u64,       // 0 disables the gate

    // Search
    pub page_size: usize,
    pub search_limit: Option<usize>,

    pub verbose: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./fts"),
            partial: 3,
            full: 20,
            max_threads: num_cpus::get().max(1),
            batch_size: 16,
            low_memory_floor_mb: 300,
            page_size: 100,
            search_limit: None,
            verbose: 0,
        }
    }
}

impl Config {
    pub fn with_path(storage_path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: storage_path.into(),
            ..Config::default()
        }
    }

    /// Parse settings carried by the host as JSON; missing keys keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.partial < MIN_PARTIAL {
            return Err(Error::config(format!(
                "partial={} is below the minimum of {}", self.partial, MIN_PARTIAL
            )));
        }
        if self.full < self.partial {
            return Err(Error::config(format!(
                "full={} must not be smaller than partial={}", self.full, self.partial
            )));
        }
        if self.full > MAX_FULL {
            return Err(Error::config(format!(
                "full={} exceeds the maximum of {}", self.full, MAX_FULL
            )));
        }
        if self.max_threads == 0 {
            return Err(Error::config("max_threads must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(Error::config("page_size must be at least 1"));
        }
        Ok(())
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose > 0
    }
}
