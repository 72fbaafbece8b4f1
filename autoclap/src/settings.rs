//! Process-wide defaults for the common options
//!
//! Settings are layered with figment, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. An optional TOML or JSON settings file
//! 3. `AUTOCLAP_*` environment variables (for example
//!    `AUTOCLAP_KEEP_UNDERSCORES=true`)

use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Prefix of the environment variables read by [`Settings::load`]
pub const ENV_PREFIX: &str = "AUTOCLAP_";

/// Default values for options that are not set on a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Keep underscores in long option names instead of using hyphens
    pub keep_underscores: bool,
    /// Infer short option names from parameter names
    pub infer_short_names: bool,
    /// Prefix composite member options with the parameter name
    pub add_composite_prefixes: bool,
    /// Show default values in option help
    pub show_defaults: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keep_underscores: false,
            infer_short_names: true,
            add_composite_prefixes: true,
            show_defaults: false,
        }
    }
}

impl Settings {
    /// Load settings from the defaults and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Load settings from the defaults, a settings file and the environment
    ///
    /// The file format is chosen by extension: `.json` is read as JSON,
    /// anything else as TOML.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Figment::from(Json::file(path)),
            _ => Figment::from(Toml::file(path)),
        };
        let figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX));
        debug!("Loading settings from {}", path.display());
        Self::from_figment(figment)
    }

    /// Extract settings from a caller-provided figment
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract::<Settings>()?)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Env::prefixed(ENV_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::load().unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.infer_short_names);
        assert!(!settings.keep_underscores);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_defaults() {
        std::env::set_var("AUTOCLAP_KEEP_UNDERSCORES", "true");
        let settings = Settings::load();
        std::env::remove_var("AUTOCLAP_KEEP_UNDERSCORES");
        assert!(settings.unwrap().keep_underscores);
    }

    #[test]
    #[serial]
    fn test_file_then_environment() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "show_defaults = true\ninfer_short_names = false").unwrap();

        std::env::set_var("AUTOCLAP_INFER_SHORT_NAMES", "true");
        let settings = Settings::load_from(file.path());
        std::env::remove_var("AUTOCLAP_INFER_SHORT_NAMES");

        let settings = settings.unwrap();
        assert!(settings.show_defaults);
        assert!(settings.infer_short_names);
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load_from(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
