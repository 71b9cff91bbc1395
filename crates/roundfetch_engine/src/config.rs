use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use engine_logging::engine_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reactor::DEFAULT_POLL_WAIT;
use crate::{FetchSettings, RetryPolicy};

pub const DEFAULT_MAX_JOBS: usize = 12;
pub const DEFAULT_CHUNK_SIZE: usize = 50;
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Tuning of a [`crate::BatchDownloader`].
///
/// Missing fields in a config file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub settings: FetchSettings,
    /// Concurrency cap: started jobs never exceed this.
    pub max_jobs: usize,
    /// Politeness limit: URLs per chunk, independent of `max_jobs`.
    pub chunk_size: usize,
    /// Pause between consecutive chunks.
    pub chunk_pause: Duration,
    /// Upper bound of one reactor wait.
    pub poll_wait: Duration,
    pub retry: RetryPolicy,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            settings: FetchSettings::default(),
            max_jobs: DEFAULT_MAX_JOBS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
            poll_wait: DEFAULT_POLL_WAIT,
            retry: RetryPolicy::default(),
        }
    }
}

impl DownloaderConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_ron_str(&text)?;
        engine_info!("Loaded downloader config from {:?}", path);
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = Some(user_agent.into());
        self
    }
}
