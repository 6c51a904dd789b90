//! User configuration for apm-state.
//!
//! An optional `config.toml` supplies defaults the command line does not:
//!
//! ```toml
//! # Directories searched for apm before $PATH
//! path = "~/.atom/bin:/usr/local/bin"
//!
//! # Behave as if --check were always passed
//! check_mode = false
//! ```
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `APM_STATE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/apm-state` (if set)
//! 3. Platform config dir (`~/.config/apm-state` on Linux)

use anyhow::{Context, Result};
use apmkit::{DEFAULT_SEARCH_DIR, SearchPath};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "APM_STATE_CONFIG_DIR";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the apm-state config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = expand(&xdg).join("apm-state");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let path = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("apm-state");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Settings read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Colon-separated directories searched for apm
    pub path: Option<String>,
    /// Default to check mode
    pub check_mode: bool,
}

impl Settings {
    /// Load settings from the config directory; a missing file means defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join(CONFIG_FILE))
    }

    /// Load settings from a specific file; a missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    /// Resolve the apm search path.
    ///
    /// An explicit value (flag or `APM_STATE_PATH`) wins over the config file,
    /// which wins over the built-in default. An empty value counts as unset. Only config-file entries get `~`
    /// expanded; explicit values are validated exactly as given.
    pub fn search_path(&self, explicit: Option<&str>) -> SearchPath {
        if let Some(path) = explicit.filter(|p| !p.is_empty()) {
            return SearchPath::new(path);
        }
        match &self.path {
            Some(path) => SearchPath::from_dirs(path.split(':').map(expand)),
            None => SearchPath::new(DEFAULT_SEARCH_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILE);
        fs::write(&file, "path = \"/opt/atom/bin:/usr/local/bin\"\ncheck_mode = true\n").unwrap();

        let settings = Settings::load_from(&file).unwrap();
        assert_eq!(settings.path.as_deref(), Some("/opt/atom/bin:/usr/local/bin"));
        assert!(settings.check_mode);
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILE);
        fs::write(&file, "paths = \"/usr/bin\"\n").unwrap();

        assert!(Settings::load_from(&file).is_err());
    }

    #[test]
    fn test_search_path_precedence() {
        let settings = Settings {
            path: Some("/opt/atom/bin".into()),
            check_mode: false,
        };
        assert_eq!(settings.search_path(Some("/explicit")).as_str(), "/explicit");
        assert_eq!(settings.search_path(None).as_str(), "/opt/atom/bin");
        assert_eq!(
            Settings::default().search_path(None).as_str(),
            DEFAULT_SEARCH_DIR
        );
    }

    #[test]
    fn test_empty_explicit_path_is_unset() {
        assert_eq!(
            Settings::default().search_path(Some("")).as_str(),
            DEFAULT_SEARCH_DIR
        );

        let settings = Settings {
            path: Some("/opt/atom/bin".into()),
            check_mode: false,
        };
        assert_eq!(settings.search_path(Some("")).as_str(), "/opt/atom/bin");
    }

    #[test]
    fn test_search_path_expands_tilde_from_config() {
        let home = dirs::home_dir().unwrap();
        let settings = Settings {
            path: Some("~/.atom/bin".into()),
            check_mode: false,
        };
        assert_eq!(
            settings.search_path(None).dirs(),
            vec![home.join(".atom").join("bin")]
        );
    }
}
