use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use strongbox_core::Accessibility;

use crate::cli::AccessibilityArg;

pub const DEFAULT_SERVICE: &str = "strongbox";

/// User-level configuration loaded from `~/.config/strongbox/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for data directory (encrypted items).
    pub data_dir: Option<PathBuf>,
    /// Service scope used when `--service` is not given.
    pub service: Option<String>,
    /// Policy for `set` when `--accessibility` is not given.
    pub accessibility: Option<AccessibilityArg>,
    pub synchronizable: Option<bool>,
    /// Where the master key lives in the OS keyring.
    pub keyring: Option<KeyringConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct KeyringConfig {
    pub service: Option<String>,
    pub account: Option<String>,
}

impl Config {
    /// Service scope, preferring the command-line override.
    pub fn service_name(&self, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| self.service.clone())
            .unwrap_or_else(|| DEFAULT_SERVICE.to_string())
    }

    /// Accessibility for a write, falling back to config and then `WhenUnlocked`.
    ///
    /// An explicit `synchronizable` always wins; the configured default only
    /// applies to policies that can synchronize.
    pub fn accessibility(
        &self,
        requested: Option<AccessibilityArg>,
        synchronizable: Option<bool>,
    ) -> Result<Accessibility> {
        let arg = requested
            .or(self.accessibility)
            .unwrap_or(AccessibilityArg::WhenUnlocked);
        let synchronizable = synchronizable.unwrap_or_else(|| {
            !arg.is_device_only() && self.synchronizable.unwrap_or(false)
        });
        arg.resolve(synchronizable)
    }

    pub fn keyring_entry(&self) -> (String, String) {
        let keyring = self.keyring.clone().unwrap_or_default();
        (
            keyring.service.unwrap_or_else(|| "strongbox-cli".to_string()),
            keyring.account.unwrap_or_else(|| "master-key".to_string()),
        )
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("strongbox").join("config.toml"))
}

/// Write the given config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_if_missing(config, &default_path()?)
}

fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
