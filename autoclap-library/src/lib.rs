//! # autoclap-library
//!
//! Ready-made types, converters and validations for autoclap commands.
//!
//! - [`paths`] - Path types that check existence, kind and writability
//! - [`converters`] - Delimited lists, bounded numbers, directories and patterns
//! - [`validators`] - Group checks such as mutually exclusive parameters
//! - [`logging`] - A composite carrying logging options
//!
//! Call [`install`] once on a registry before building commands that use
//! these types:
//!
//! ```no_run
//! use autoclap::{Command, CommandOptions, ParamSpec, Registry, Signature, TypeExpr};
//! use autoclap_library::logging::LogSettings;
//! use autoclap_library::paths::{PathType, ReadableFile};
//!
//! let mut registry = Registry::new();
//! autoclap_library::install(&mut registry).expect("library types register once");
//! let signature = Signature::new("cat")
//!     .param(ParamSpec::new("input").typed(ReadableFile::type_expr()))
//!     .param(ParamSpec::new("log").typed(TypeExpr::named::<LogSettings>()));
//! let command = Command::command(&registry, &signature, &CommandOptions::new())
//!     .expect("valid signature")
//!     .with_callback(|invocation| {
//!         let log: LogSettings = invocation.get_as("log")?;
//!         log.init()?;
//!         let input: String = invocation.get_as("input")?;
//!         print!("{}", std::fs::read_to_string(input)?);
//!         Ok(())
//!     });
//! command.run();
//! ```

pub mod converters;
pub mod logging;
pub mod paths;
pub mod validators;

use autoclap::{BuildError, Registry};
use tracing::debug;

/// Register the path validations and the logging composite
pub fn install(registry: &mut Registry) -> Result<(), BuildError> {
    paths::register(registry);
    registry.register_composite(logging::LogSettings::composite())?;
    debug!("Installed autoclap library types");
    Ok(())
}
