//! Data directory layout.

use std::path::{Path, PathBuf};

/// Resolve the gistgate data directory.
///
/// Priority: `GISTGATE_DATA_DIR`, then `~/.gistgate`, then `./.gistgate`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GISTGATE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".gistgate");
    }

    PathBuf::from(".gistgate")
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

pub fn credentials_path(data_dir: &Path) -> PathBuf {
    data_dir.join("credentials.toml")
}
