//! # Pipeline Configuration
//!
//! `PipelineConfig` holds the tunables of the processing pipeline. Values are
//! layered, later sources winning:
//!
//! 1.  **Defaults** from the `defaults` module.
//! 2.  **A YAML file**, either given explicitly or found at the platform
//!     configuration path. Missing keys keep their defaults.
//! 3.  **Environment variables** (`PACKAGE_STORE_WORKERS`,
//!     `PACKAGE_STORE_QUEUE_DEPTH`, `PACKAGE_STORE_PARALLEL_PRESENTERS`).
//!
//! ```yaml
//! workers: 16
//! queue_depth: 128
//! parallel_presenters: true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    default_config_path, DEFAULT_IMAGE_URL, DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS,
    PARALLEL_PRESENTERS_ENV, QUEUE_DEPTH_ENV, WORKERS_ENV,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Worker-pool width of every stage.
    pub workers: usize,
    /// Buffer depth of the channels between stages.
    pub queue_depth: usize,
    /// Consult presenters concurrently. The first presenter in registration
    /// order still wins.
    pub parallel_presenters: bool,
    /// Avatar used by the generic fallback presentation.
    pub generic_image_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            parallel_presenters: false,
            generic_image_url: DEFAULT_IMAGE_URL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Parses a YAML document. Missing keys keep their defaults.
    pub fn parse(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            hint: Some(
                "Known keys are workers, queue_depth, parallel_presenters and generic_image_url"
                    .to_string(),
            ),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Loads the layered configuration.
    ///
    /// An explicit `path` must exist. Without one, the default configuration
    /// file is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides, looking variables up with `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var(WORKERS_ENV) {
            self.workers = parse_env(WORKERS_ENV, &value)?;
        }
        if let Some(value) = var(QUEUE_DEPTH_ENV) {
            self.queue_depth = parse_env(QUEUE_DEPTH_ENV, &value)?;
        }
        if let Some(value) = var(PARALLEL_PRESENTERS_ENV) {
            self.parallel_presenters = parse_env(PARALLEL_PRESENTERS_ENV, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::ConfigParse {
                message: "workers must be at least 1".to_string(),
                hint: Some(format!("Remove the setting to use the default of {}", DEFAULT_WORKERS)),
            });
        }
        if self.queue_depth == 0 {
            return Err(Error::ConfigParse {
                message: "queue_depth must be at least 1".to_string(),
                hint: Some(format!(
                    "Remove the setting to use the default of {}",
                    DEFAULT_QUEUE_DEPTH
                )),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::ConfigParse {
        message: format!("invalid value {:?} for {}", value, name),
        hint: None,
    })
}
