use std::path::Path;

use scriptroom_rhai::ScriptConfig;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    streamer::{DEFAULT_FENCE_LEN, MIN_FENCE_LEN},
};

/// Configuration for a [`ScriptSession`](crate::ScriptSession).
///
/// Loaded from JSON; every field is optional:
///
/// ```json
/// { "script": { "dpi": 100, "default_size": [6.4, 4.8] }, "fence_len": 6 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Engine and rendering settings.
    pub script: ScriptConfig,
    /// Number of back-ticks in the code fence.
    pub fence_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            script: ScriptConfig::default(),
            fence_len: DEFAULT_FENCE_LEN,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&text)
    }

    /// Set the fence length.
    pub fn with_fence_len(mut self, fence_len: usize) -> Self {
        self.fence_len = fence_len;
        self
    }

    /// Set the engine configuration.
    pub fn with_script(mut self, script: ScriptConfig) -> Self {
        self.script = script;
        self
    }

    /// Check every setting.
    pub fn validate(&self) -> Result<()> {
        self.script.validate().map_err(Error::InvalidConfiguration)?;
        if self.fence_len < MIN_FENCE_LEN {
            return Err(Error::InvalidConfiguration(format!(
                "fence_len must be at least {MIN_FENCE_LEN}, got {}",
                self.fence_len
            )));
        }
        Ok(())
    }
}
