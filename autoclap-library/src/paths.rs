//! Tagged path types
//!
//! Each type is a [`PathBuf`] newtype whose annotation is a path tagged with
//! the newtype, so values convert like any other path but pick up the
//! validations registered for the tag:
//!
//! | type | check |
//! |------|-------|
//! | [`ReadablePath`] | exists |
//! | [`ReadableFile`] | exists and is a file |
//! | [`ReadableDir`] | exists and is a directory |
//! | [`WritablePath`] | nearest existing ancestor is writable |
//! | [`WritableFile`] | writable and not an existing non-file |
//! | [`WritableDir`] | writable and not an existing non-directory |

use autoclap::validation::TypeValidation;
use autoclap::{Registry, TypeExpr, TypeKey, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A path newtype with its own validations
pub trait PathType: 'static {
    /// Name under which the type is declared for forward references
    const NAME: &'static str;

    fn key() -> TypeKey {
        TypeKey::of::<Self>()
    }

    /// Annotation for parameters of this type
    fn type_expr() -> TypeExpr {
        TypeExpr::tagged::<Self>(TypeExpr::path())
    }
}

macro_rules! path_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub PathBuf);

        impl $name {
            pub fn as_path(&self) -> &Path {
                &self.0
            }

            pub fn into_path_buf(self) -> PathBuf {
                self.0
            }
        }

        impl AsRef<Path> for $name {
            fn as_ref(&self) -> &Path {
                &self.0
            }
        }

        impl PathType for $name {
            const NAME: &'static str = stringify!($name);
        }
    };
}

path_type!(
    /// A path that must exist
    ReadablePath
);
path_type!(
    /// An existing file
    ReadableFile
);
path_type!(
    /// An existing directory
    ReadableDir
);
path_type!(
    /// A path that can be created or overwritten
    WritablePath
);
path_type!(
    /// A file that can be created or overwritten
    WritableFile
);
path_type!(
    /// A directory that can be created or written into
    WritableDir
);

fn path_of(value: &Value) -> Option<&Path> {
    value.as_str().map(Path::new)
}

/// Wrap a path check as a type validation; non-string values are ignored
fn check<F>(f: F) -> TypeValidation
where
    F: Fn(&str, &Path) -> Result<(), ValidationError> + Send + Sync + 'static,
{
    Arc::new(move |name: &str, value: &Value| match path_of(value) {
        Some(path) => f(name, path),
        None => Ok(()),
    })
}

pub fn readable_path(name: &str, path: &Path) -> Result<(), ValidationError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "Parameter {name} value {} does not exist.",
            path.display()
        )))
    }
}

pub fn readable_file(name: &str, path: &Path) -> Result<(), ValidationError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "Parameter {name} value {} is not a file.",
            path.display()
        )))
    }
}

pub fn readable_dir(name: &str, path: &Path) -> Result<(), ValidationError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "Parameter {name} value {} is not a directory.",
            path.display()
        )))
    }
}

/// The path itself if it exists, else its nearest existing ancestor
fn nearest_existing(path: &Path) -> PathBuf {
    let mut current = path;
    while !current.exists() {
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent,
            // Relative paths are resolved against the working directory
            _ => return PathBuf::from("."),
        }
    }
    current.to_path_buf()
}

pub fn writable_path(name: &str, path: &Path) -> Result<(), ValidationError> {
    let existing = nearest_existing(path);
    let writable = std::fs::metadata(&existing)
        .map(|metadata| !metadata.permissions().readonly())
        .unwrap_or(false);
    if writable {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "Parameter {name} value {} is not writable.",
            path.display()
        )))
    }
}

pub fn writable_file(name: &str, path: &Path) -> Result<(), ValidationError> {
    if path.exists() && !path.is_file() {
        Err(ValidationError::new(format!(
            "Parameter {name} value {} exists and is not a file.",
            path.display()
        )))
    } else {
        Ok(())
    }
}

pub fn writable_dir(name: &str, path: &Path) -> Result<(), ValidationError> {
    if path.exists() && !path.is_dir() {
        Err(ValidationError::new(format!(
            "Parameter {name} value {} exists and is not a directory.",
            path.display()
        )))
    } else {
        Ok(())
    }
}

fn register_type<T: PathType>(
    registry: &mut Registry,
    validation: TypeValidation,
    depends_on: Vec<TypeValidation>,
) {
    registry.register_validation(T::key(), validation, depends_on);
    registry.declare_type(T::NAME, T::type_expr());
}

/// Register the validations of every path type and declare their names
pub fn register(registry: &mut Registry) {
    let exists = check(readable_path);
    let writable = check(writable_path);

    register_type::<ReadablePath>(registry, exists.clone(), Vec::new());
    register_type::<ReadableFile>(registry, check(readable_file), vec![exists.clone()]);
    register_type::<ReadableDir>(registry, check(readable_dir), vec![exists]);
    register_type::<WritablePath>(registry, writable.clone(), Vec::new());
    register_type::<WritableFile>(registry, check(writable_file), vec![writable.clone()]);
    register_type::<WritableDir>(registry, check(writable_dir), vec![writable]);
    debug!("Registered path type validations");
}
