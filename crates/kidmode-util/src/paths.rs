//! Default paths for kidmode components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/kidmode/kidmoded.sock` or `/tmp/kidmode-$USER/kidmoded.sock`
//! - Config: `$XDG_CONFIG_HOME/kidmode/config.toml` or `~/.config/kidmode/config.toml`
//! - Data: `$XDG_DATA_HOME/kidmode` or `~/.local/share/kidmode`
//! - Logs: `$XDG_STATE_HOME/kidmode` or `~/.local/state/kidmode`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const KIDMODE_SOCKET_ENV: &str = "KIDMODE_SOCKET";

/// Environment variable for overriding the data directory
pub const KIDMODE_DATA_DIR_ENV: &str = "KIDMODE_DATA_DIR";

const SOCKET_FILENAME: &str = "kidmoded.sock";
const CONFIG_FILENAME: &str = "config.toml";

/// Application subdirectory name
const APP_DIR: &str = "kidmode";

/// Socket path, honouring `$KIDMODE_SOCKET` first.
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(KIDMODE_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Socket path without checking the `KIDMODE_SOCKET` override.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Data directory, honouring `$KIDMODE_DATA_DIR` first.
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(KIDMODE_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Data directory without checking the `KIDMODE_DATA_DIR` override.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Default log directory.
pub fn default_log_dir() -> PathBuf {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(state_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("logs")
}
