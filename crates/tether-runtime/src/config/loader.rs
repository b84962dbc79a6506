//! Layered configuration loading.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. [`TetherConfig::default`]
//! 2. `tether.<profile>.toml` next to the main file
//! 3. `tether.toml` (or `tether.yaml` / `tether.yml` with `yaml-config`)
//! 4. `TETHER_*` variables, nested with `__`
//!    (`TETHER_LOGGING__LEVEL=debug`, `TETHER_PLUGINS__GREETER=false`)
//! 5. Values passed to [`ConfigLoader::set`]
//!
//! The first search directory holding a given file name wins. Without
//! explicit search paths the current directory is searched, then the
//! user configuration directory.

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TetherConfig;
use super::validation::validate_config;

/// File names searched for, by enabled format.
const FILE_NAMES: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "tether.toml",
    #[cfg(feature = "yaml-config")]
    "tether.yaml",
    #[cfg(feature = "yaml-config")]
    "tether.yml",
];

/// Selects the `tether.<profile>.*` overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; unknown names become [`Profile::Custom`].
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// Reads `TETHER_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("TETHER_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }

    /// `tether.toml` becomes `tether.<profile>.toml`.
    fn overlay(&self, file_name: &str) -> Option<String> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        Some(format!("{stem}.{}.{ext}", self.as_str()))
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collects configuration sources and extracts a validated [`TetherConfig`].
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    env: bool,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            file: None,
            env: true,
            overrides: Figment::new(),
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Pins one key above every other source, e.g.
    /// `set("logging.level", "debug")`.
    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    pub fn load(self) -> ConfigResult<TetherConfig> {
        let profile = self.profile.clone();
        let config: TetherConfig = self.figment()?.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;
        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            plugins = config.plugins.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(self) -> ConfigResult<Figment> {
        let defaults = Figment::from(Serialized::defaults(TetherConfig::default()));
        let mut figment = match &self.file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                merge_file(defaults, path)?
            }
            None => self.search(defaults)?,
        };
        if self.env {
            trace!("Merging TETHER_ environment variables");
            figment = figment.merge(Env::prefixed("TETHER_").ignore(&["PROFILE"]).split("__"));
        }
        Ok(figment.merge(self.overrides))
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("tether")))
            .collect()
    }

    fn search(&self, mut figment: Figment) -> ConfigResult<Figment> {
        let dirs = self.search_dirs();
        let mut found = false;
        for name in FILE_NAMES {
            let Some(dir) = dirs.iter().find(|dir| dir.join(name).is_file()) else {
                continue;
            };
            if let Some(overlay) = self.profile.overlay(name).map(|n| dir.join(n))
                && overlay.is_file()
            {
                debug!(path = %overlay.display(), "Loading profile configuration");
                figment = merge_file(figment, &overlay)?;
            }
            let path = dir.join(name);
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_file(figment, &path)?;
            found = true;
        }
        if !found {
            warn!(dirs = dirs.len(), "No configuration file found, using defaults");
        }
        Ok(figment)
    }
}

/// Merges one file, picking the format from its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}
