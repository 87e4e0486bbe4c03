use serde::Deserialize;

use std::path::PathBuf;

/// Tracker settings, read from the same figment as Rocket's own
/// configuration (`Rocket.toml` or `ROCKET_*` environment variables).
#[derive(Deserialize, Debug, Clone)]
pub struct TrackerConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    #[serde(default = "default_max_media_kib")]
    pub max_media_kib: u64,
    /// Attempts made for a multi-entity update before it is reported as partial.
    #[serde(default = "default_update_retries")]
    pub update_retries: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("rtracker.db")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_media_kib() -> u64 {
    8192
}

fn default_update_retries() -> u32 {
    3
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            database_path: default_database_path(),
            media_dir: default_media_dir(),
            max_media_kib: default_max_media_kib(),
            update_retries: default_update_retries(),
        }
    }
}
