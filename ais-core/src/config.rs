//! Configuration file for ais-kml.
//!
//! Reads `~/.ais-kml/config.yaml` with the snapshot server port and the
//! identity store directory. The listen address is always loopback.

use std::path::{Path, PathBuf};

use crate::types::{AisError, Result};

/// Default snapshot server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default identity store directory.
pub const DEFAULT_STORE_PATH: &str = "db_env";

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig { port: DEFAULT_PORT },
            store: StoreConfig {
                path: DEFAULT_STORE_PATH.into(),
            },
        }
    }
}

/// Get the config directory path (`~/.ais-kml/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".ais-kml")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.ais-kml/config.yaml`.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_file())
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Parse simple YAML-like config text.
///
/// Unknown sections and keys are ignored. `null`/`~` leave the default in
/// place. A value that cannot be used is an error naming the key.
pub fn parse_config(text: &str) -> Result<Config> {
    let mut config = Config::default();
    let mut current_section: Option<&str> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = if val.is_empty() { Some(key) } else { None };
            continue;
        }

        match (current_section, key) {
            (Some("server"), "port") => {
                if let Some(v) = parse_string_value(val) {
                    config.server.port = v
                        .parse()
                        .map_err(|_| AisError::Config(format!("server.port: invalid port {v:?}")))?;
                }
            }
            (Some("store"), "path") => {
                if let Some(v) = parse_string_value(val) {
                    config.store.path = v;
                }
            }
            _ => {}
        }
    }

    Ok(config)
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
