//! # autoclap
//!
//! Generate [clap] command-line interfaces from declarative parameter
//! signatures.
//!
//! A [`Signature`] lists the parameters of a callback with their type
//! annotations and defaults. autoclap resolves every annotation to a CLI
//! primitive (flag, option, multi-value option or positional argument),
//! expands composite parameters into their members, assigns collision-free
//! short names and runs a post-parse pipeline of conditionals, validations
//! and composite construction before calling the callback.
//!
//! ## Modules
//!
//! - [`types`] - Type annotations and their resolution
//! - [`registry`] - Conversions, validations and composites keyed by type
//! - [`parameter`] - Parameter descriptors and their rendering
//! - [`composite`] - Composite parameters built from several CLI values
//! - [`command`] - Commands and groups
//! - [`pipeline`] - Conditionals, validations and composite reassembly
//! - [`describe`] - Structured description of a built command
//! - [`settings`] - Process defaults loaded from files and the environment
//!
//! ## Example
//!
//! ```no_run
//! use autoclap::{Command, CommandOptions, ParamSpec, Registry, Signature, TypeExpr};
//!
//! let registry = Registry::new();
//! let signature = Signature::new("greet")
//!     .param(ParamSpec::new("name").typed(TypeExpr::string()))
//!     .param(ParamSpec::new("times").default(1));
//! let command = Command::command(&registry, &signature, &CommandOptions::new())
//!     .expect("valid signature")
//!     .with_callback(|invocation| {
//!         let name: String = invocation.get_as("name")?;
//!         for _ in 0..invocation.get_as::<u32>("times")? {
//!             println!("Hello, {name}!");
//!         }
//!         Ok(())
//!     });
//! command.run();
//! ```

pub mod assembler;
pub mod command;
pub mod composite;
pub mod conversion;
pub mod describe;
pub mod docs;
pub mod error;
pub mod invoke;
pub mod options;
pub mod parameter;
pub mod parsed;
pub mod pipeline;
pub mod primitive;
pub mod registry;
pub mod settings;
pub mod short_names;
pub mod signature;
pub mod types;
pub mod validation;

pub use command::{Callback, Command};
pub use composite::CompositeDefinition;
pub use conversion::{CaseFold, Converter, SharedConverter};
pub use describe::{describe, CommandDescription};
pub use error::{
    BuildError, ConfigError, ConversionError, ErrorSeverity, InvocationError, Severity,
    ValidationError,
};
pub use invoke::Invocation;
pub use options::{CommandOptions, CommonOptions, GroupOptions};
pub use parsed::ParsedValues;
pub use registry::{AutoConversion, Registry};
pub use settings::Settings;
pub use short_names::ShortNames;
pub use signature::{ParamKind, ParamSpec, Signature};
pub use types::{TypeExpr, TypeKey};
pub use validation::{GroupValues, ParamGroup, ValidationFn};
