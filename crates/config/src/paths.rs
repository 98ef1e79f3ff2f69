//! Path helpers for the CryptoPulse home directory.

use std::path::PathBuf;

/// Data directory (~/.cryptopulse). Falls back to a relative directory when
/// the home directory cannot be resolved.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".cryptopulse"))
        .unwrap_or_else(|| PathBuf::from(".cryptopulse"))
}

/// Configuration file location.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Ensure a directory exists.
pub async fn ensure_dir(path: &PathBuf) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}
