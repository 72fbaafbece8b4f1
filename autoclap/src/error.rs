//! Error types for autoclap
//!
//! Build-time failures (unsupported signatures, name collisions) are reported
//! as [`BuildError`] values from every build operation. Failures that happen
//! while a command line is being processed are reported as
//! [`InvocationError`], which knows whether it should be shown to the user as
//! a usage error.

use std::path::PathBuf;
use thiserror::Error;

/// Severity levels for error classification
///
/// - **Warning**: Potential issue but the operation can proceed.
/// - **Error**: The operation failed, usually because of user input.
/// - **Critical**: The command definition itself is broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Potential issue but operation can proceed
    Warning,
    /// Operation failed but the program can report it and continue
    Error,
    /// The command definition cannot be used
    Critical,
}

/// Trait for error types that have severity levels
pub trait Severity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

/// Errors raised while turning signatures into commands
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    /// The signature uses a construct that cannot be rendered
    #[error("Unsupported signature: {message}")]
    Signature { message: String },

    /// Two primitives claim the same short name or key
    #[error("Parameter collision: {message}")]
    ParameterCollision { message: String },

    /// A composite was registered twice for the same type
    #[error("Type collision: {message}")]
    TypeCollision { message: String },

    /// Every letter of the short-name pool is already in use
    #[error("Could not infer a short name for parameter '{parameter}': all letters are in use")]
    ShortNameExhausted { parameter: String },
}

impl BuildError {
    pub fn signature(message: impl Into<String>) -> Self {
        Self::Signature {
            message: message.into(),
        }
    }

    pub fn parameter_collision(message: impl Into<String>) -> Self {
        Self::ParameterCollision {
            message: message.into(),
        }
    }

    pub fn type_collision(message: impl Into<String>) -> Self {
        Self::TypeCollision {
            message: message.into(),
        }
    }
}

impl Severity for BuildError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }
}

/// Error returned by validation and conditional functions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error returned by converters when a raw token cannot be converted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Standard message for a token that does not parse as `type_name`
    pub fn invalid(raw: &str, type_name: &str) -> Self {
        Self::new(format!("'{raw}' is not a valid {type_name}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while processing a command line
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Tokenizing or matching failed, or help/version was requested
    #[error(transparent)]
    Usage(#[from] clap::Error),

    /// A raw token could not be converted
    #[error("Invalid value for '{parameter}': {source}")]
    Conversion {
        parameter: String,
        source: ConversionError,
    },

    /// A conditional or validation function rejected the parsed values
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A composite constructor failed
    #[error("Invalid value for '{parameter}': {error}")]
    Construction {
        parameter: String,
        error: anyhow::Error,
    },

    /// A parsed value could not be read as the requested type
    #[error("Could not read parameter '{key}': {source}")]
    Deserialize {
        key: String,
        source: serde_json::Error,
    },

    /// The command callback failed
    #[error(transparent)]
    Callback(anyhow::Error),
}

impl InvocationError {
    /// Whether this error is reported as a usage error of the command line
    pub fn is_usage_error(&self) -> bool {
        match self {
            InvocationError::Usage(err) => err.use_stderr(),
            InvocationError::Conversion { .. }
            | InvocationError::Validation(_)
            | InvocationError::Construction { .. } => true,
            InvocationError::Deserialize { .. } | InvocationError::Callback(_) => false,
        }
    }

    /// Process exit code for this error, following clap's conventions
    pub fn exit_code(&self) -> i32 {
        match self {
            InvocationError::Usage(err) => err.exit_code(),
            _ if self.is_usage_error() => 2,
            _ => 1,
        }
    }
}

impl Severity for InvocationError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            InvocationError::Usage(err) if !err.use_stderr() => ErrorSeverity::Warning,
            InvocationError::Deserialize { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Settings loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file does not exist
    #[error("Settings file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Settings could not be extracted
    #[error("Failed to load settings: {source}")]
    ParseError { source: Box<figment::Error> },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::ParseError {
            source: Box::new(error),
        }
    }
}

impl Severity for ConfigError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_errors_are_critical() {
        let err = BuildError::signature("Union types are not supported");
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.to_string().contains("Union types"));
    }

    #[test]
    fn test_validation_error_is_usage_error() {
        let err = InvocationError::from(ValidationError::new("bad value"));
        assert!(err.is_usage_error());
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "bad value");
    }

    #[test]
    fn test_callback_error_exit_code() {
        let err = InvocationError::Callback(anyhow::anyhow!("boom"));
        assert!(!err.is_usage_error());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_conversion_error_message() {
        let err = InvocationError::Conversion {
            parameter: "count".to_string(),
            source: ConversionError::invalid("abc", "integer"),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for 'count': 'abc' is not a valid integer"
        );
    }
}
