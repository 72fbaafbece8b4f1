//! Type model
//!
//! Parameters are described with [`TypeExpr`] annotations, the explicit
//! stand-in for a type annotation read from a callable. The
//! [`resolver`](resolver::TypeResolver) reduces an annotation to a
//! [`TypeDescriptor`]: the concrete [`ResolvedType`] used to pick a converter,
//! the [`TypeKey`] used for registry lookups, and the CLI shape (arity,
//! repetition, optionality).

pub mod resolver;

pub use resolver::TypeResolver;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Nominal identity of a type, used to key conversions, validations and
/// composites
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(Cow<'static, str>);

impl TypeKey {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Key for a Rust type, unique per type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<T>()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Last path segment of the key, without generic arguments
    pub fn short_name(&self) -> &str {
        let base = self.0.split('<').next().unwrap_or(&self.0);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scalar types every command line understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Str,
    Int,
    Float,
    Bool,
    Path,
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Str => "str",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::Path => "path",
        }
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::new(self.name())
    }
}

/// Kinds of homogeneous containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    List,
    Set,
    Sequence,
}

/// A raw type annotation
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Primitive(Primitive),
    /// A user-defined nominal type, such as a composite struct
    Named(TypeKey),
    /// An enumeration with the given variant names
    Enum { key: TypeKey, variants: Vec<String> },
    /// A distinct alias over a base type; lookups use the alias
    Tagged { alias: TypeKey, base: Box<TypeExpr> },
    /// A transparent wrapper layer that resolves to its target
    Alias { name: String, target: Box<TypeExpr> },
    Optional(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    NoneType,
    Tuple(Vec<TypeExpr>),
    Collection {
        kind: CollectionKind,
        element: Box<TypeExpr>,
    },
    Mapping {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    /// A reference by name, resolved through the registry's type namespace
    Forward(String),
}

impl TypeExpr {
    pub fn string() -> Self {
        Self::Primitive(Primitive::Str)
    }

    pub fn int() -> Self {
        Self::Primitive(Primitive::Int)
    }

    pub fn float() -> Self {
        Self::Primitive(Primitive::Float)
    }

    pub fn boolean() -> Self {
        Self::Primitive(Primitive::Bool)
    }

    pub fn path() -> Self {
        Self::Primitive(Primitive::Path)
    }

    pub fn named<T: ?Sized + 'static>() -> Self {
        Self::Named(TypeKey::of::<T>())
    }

    pub fn enumeration<T: ?Sized + 'static, I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            key: TypeKey::of::<T>(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tagged<T: ?Sized + 'static>(base: TypeExpr) -> Self {
        Self::Tagged {
            alias: TypeKey::of::<T>(),
            base: Box::new(base),
        }
    }

    pub fn alias(name: impl Into<String>, target: TypeExpr) -> Self {
        Self::Alias {
            name: name.into(),
            target: Box::new(target),
        }
    }

    pub fn optional(inner: TypeExpr) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::Union(members.into_iter().collect())
    }

    pub fn tuple(slots: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::Tuple(slots.into_iter().collect())
    }

    pub fn list(element: TypeExpr) -> Self {
        Self::collection(CollectionKind::List, element)
    }

    pub fn set(element: TypeExpr) -> Self {
        Self::collection(CollectionKind::Set, element)
    }

    pub fn sequence(element: TypeExpr) -> Self {
        Self::collection(CollectionKind::Sequence, element)
    }

    pub fn collection(kind: CollectionKind, element: TypeExpr) -> Self {
        Self::Collection {
            kind,
            element: Box::new(element),
        }
    }

    pub fn mapping(key: TypeExpr, value: TypeExpr) -> Self {
        Self::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn forward(name: impl Into<String>) -> Self {
        Self::Forward(name.into())
    }
}

/// The concrete representation of a parameter after unwrapping
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    Primitive(Primitive),
    Named(TypeKey),
    Enum { key: TypeKey, variants: Vec<String> },
    Tuple(Vec<ResolvedType>),
    Collection {
        kind: CollectionKind,
        element: Box<ResolvedType>,
    },
    Mapping {
        key: Box<ResolvedType>,
        value: Box<ResolvedType>,
    },
}

impl ResolvedType {
    /// Registry key of the concrete type
    pub fn key(&self) -> TypeKey {
        match self {
            ResolvedType::Primitive(p) => p.key(),
            ResolvedType::Named(key) | ResolvedType::Enum { key, .. } => key.clone(),
            ResolvedType::Tuple(_) => TypeKey::new("tuple"),
            ResolvedType::Collection { kind, .. } => TypeKey::new(match kind {
                CollectionKind::List => "list",
                CollectionKind::Set => "set",
                CollectionKind::Sequence => "sequence",
            }),
            ResolvedType::Mapping { .. } => TypeKey::new("mapping"),
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, ResolvedType::Primitive(Primitive::Bool))
    }

    /// Human readable name used in help and descriptions
    pub fn display_name(&self) -> String {
        match self {
            ResolvedType::Primitive(p) => p.name().to_string(),
            ResolvedType::Named(key) | ResolvedType::Enum { key, .. } => {
                key.short_name().to_string()
            }
            ResolvedType::Tuple(slots) => format!(
                "tuple[{}]",
                slots
                    .iter()
                    .map(ResolvedType::display_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ResolvedType::Collection { element, .. } => {
                format!("{}[{}]", self.key(), element.display_name())
            }
            ResolvedType::Mapping { key, value } => {
                format!("mapping[{}, {}]", key.display_name(), value.display_name())
            }
        }
    }
}

/// Everything the CLI needs to know about a parameter's type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Key used for conversion, validation and composite lookup
    pub match_type: TypeKey,
    /// Concrete representation after unwrapping
    pub resolved: ResolvedType,
    /// Type of each parsed token group: the element for repeatable types
    pub element: ResolvedType,
    /// Number of tokens consumed per occurrence
    pub arity: usize,
    /// Whether the primitive may occur more than once
    pub allows_multiple: bool,
    /// Whether the annotation admits an absent value
    pub is_optional: bool,
    /// Whether the parameter is a boolean flag
    pub is_flag: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Config;

    #[test]
    fn test_type_key_short_name() {
        let key = TypeKey::of::<Config>();
        assert_eq!(key.short_name(), "Config");
        assert!(key.name().ends_with("::Config"));
        assert_eq!(TypeKey::new("int").short_name(), "int");
    }

    #[test]
    fn test_resolved_display_name() {
        let resolved = ResolvedType::Collection {
            kind: CollectionKind::List,
            element: Box::new(ResolvedType::Primitive(Primitive::Int)),
        };
        assert_eq!(resolved.display_name(), "list[int]");
        assert_eq!(resolved.key(), TypeKey::new("list"));
    }

    #[test]
    fn test_tagged_constructor_uses_alias_key() {
        let expr = TypeExpr::tagged::<Config>(TypeExpr::path());
        match expr {
            TypeExpr::Tagged { alias, base } => {
                assert_eq!(alias, TypeKey::of::<Config>());
                assert_eq!(*base, TypeExpr::path());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
