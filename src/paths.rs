//! Path utilities and file system helpers

use std::path::PathBuf;

/// Environment variable overriding the application data directory
pub const DATA_DIR_ENV: &str = "CATS_DATA_DIR";

/// Gets the application data directory
pub fn get_app_data_dir() -> Result<PathBuf, String> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|p| p.join("com.cats.client"))
        .ok_or_else(|| "Could not find app data directory".to_string())
}

/// Gets the database file path
pub fn get_db_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join("cats.db"))
}

/// Gets the client configuration file path
pub fn get_config_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join("config.json"))
}

/// Gets the directory where downloaded images are written
pub fn get_downloads_dir() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join("Downloads"))
}
