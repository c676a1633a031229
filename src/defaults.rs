//! Default values for package-store configuration.
//!
//! This module provides centralized default values used by the pipeline and
//! the command line, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Worker-pool width of every pipeline stage.
pub const DEFAULT_WORKERS: usize = 8;

/// Buffer depth of the channels between pipeline stages.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Placeholder avatar for repositories no presenter recognises.
pub const DEFAULT_IMAGE_URL: &str = "https://github.com/images/gravatars/gravatar-user-420.png";

/// Environment variable overriding `PipelineConfig::workers`.
pub const WORKERS_ENV: &str = "PACKAGE_STORE_WORKERS";

/// Environment variable overriding `PipelineConfig::queue_depth`.
pub const QUEUE_DEPTH_ENV: &str = "PACKAGE_STORE_QUEUE_DEPTH";

/// Environment variable overriding `PipelineConfig::parallel_presenters`.
pub const PARALLEL_PRESENTERS_ENV: &str = "PACKAGE_STORE_PARALLEL_PRESENTERS";

/// Returns the default configuration file path.
///
/// Uses the platform-appropriate configuration directory:
/// - Linux: `~/.config/package-store/config.yaml` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/package-store/config.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\package-store\config.yaml`
///
/// Returns `None` if the platform configuration directory cannot be
/// determined. This can be overridden by the `--config` CLI flag.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("package-store").join("config.yaml"))
}
