//! Logging options as a composite parameter
//!
//! Adding a [`LogSettings`] parameter to a signature gives a command
//! `--log-level` and `--log-file` options (plus a hidden `--log-name`), and
//! [`LogSettings::init`] installs a `tracing` subscriber from the parsed
//! values.

use autoclap::{CompositeDefinition, ParamSpec, Signature, TypeExpr};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, registry, util::TryInitError, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const NAMES: [&'static str; 5] = ["error", "warn", "info", "debug", "trace"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("Failed to open log file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Parsed logging options
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogSettings {
    /// Target the level applies to; every target when unset
    pub log_name: Option<String>,
    pub log_level: LogLevel,
    /// Write to this file instead of stderr
    pub log_file: Option<PathBuf>,
}

impl LogSettings {
    /// Member signature of the composite
    pub fn signature() -> Signature {
        Signature::new("log_settings")
            .doc(
                "Logging options.\n\n\
                 Args:\n    \
                 log_name: Target the log level applies to\n    \
                 log_level: Minimum level of recorded events\n    \
                 log_file: File to write log events to",
            )
            .param(
                ParamSpec::new("log_name")
                    .typed(TypeExpr::optional(TypeExpr::string()))
                    .default(Value::Null),
            )
            .param(
                ParamSpec::new("log_level")
                    .typed(TypeExpr::enumeration::<LogLevel, _, _>(LogLevel::NAMES))
                    .default(LogLevel::default().as_str()),
            )
            .param(
                ParamSpec::new("log_file")
                    .typed(TypeExpr::optional(TypeExpr::path()))
                    .default(Value::Null),
            )
    }

    /// Composite definition to register with a registry
    pub fn composite() -> CompositeDefinition {
        CompositeDefinition::for_type::<LogSettings>(Self::signature())
            .with_options(|options| options.hidden("log_name"))
    }

    /// Filter directive for the configured level and target
    pub fn directive(&self) -> String {
        match &self.log_name {
            Some(target) => format!("{}={}", target, self.log_level.as_str()),
            None => self.log_level.as_str().to_string(),
        }
    }

    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        let directive = self.directive();
        EnvFilter::try_new(&directive).map_err(|source| LoggingError::Filter { directive, source })
    }

    /// Install a global subscriber for these settings
    pub fn init(&self) -> Result<(), LoggingError> {
        let filter = self.filter()?;
        match &self.log_file {
            Some(path) => {
                let file: File = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LoggingError::File {
                        path: path.clone(),
                        source,
                    })?;
                registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .with_writer(Mutex::new(file))
                            .with_ansi(false),
                    )
                    .try_init()?;
            }
            None => {
                registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .try_init()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive() {
        let mut settings = LogSettings::default();
        assert_eq!(settings.directive(), "warn");
        settings.log_name = Some("my_app".to_string());
        settings.log_level = LogLevel::Debug;
        assert_eq!(settings.directive(), "my_app=debug");
        assert!(settings.filter().is_ok());
    }

    #[test]
    fn test_unopenable_log_file_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = LogSettings {
            log_file: Some(dir.path().join("missing").join("app.log")),
            ..Default::default()
        };
        assert!(matches!(settings.init(), Err(LoggingError::File { .. })));
    }

    #[test]
    fn test_settings_deserialize_from_members() {
        let settings: LogSettings = serde_json::from_value(serde_json::json!({
            "log_name": null,
            "log_level": "info",
            "log_file": "/tmp/app.log"
        }))
        .unwrap();
        assert_eq!(settings.log_level, LogLevel::Info);
        assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/app.log")));
    }
}
