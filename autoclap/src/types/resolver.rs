//! Reduces raw annotations to [`TypeDescriptor`]s

use super::{ResolvedType, TypeDescriptor, TypeExpr, TypeKey};
use crate::error::BuildError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Lookup table for [`TypeExpr::Forward`] references
pub trait TypeNamespace {
    fn lookup_type(&self, name: &str) -> Option<&TypeExpr>;
}

impl TypeNamespace for HashMap<String, TypeExpr> {
    fn lookup_type(&self, name: &str) -> Option<&TypeExpr> {
        self.get(name)
    }
}

/// An annotation with its wrapper layers removed
struct Unwrapped {
    expr: TypeExpr,
    alias: Option<TypeKey>,
    optional: bool,
}

/// Resolves annotations against a type namespace
pub struct TypeResolver<'a> {
    namespace: &'a dyn TypeNamespace,
}

impl<'a> TypeResolver<'a> {
    pub fn new(namespace: &'a dyn TypeNamespace) -> Self {
        Self { namespace }
    }

    /// Resolve the type of a parameter
    ///
    /// # Arguments
    /// * `param` - Parameter name, used in error messages
    /// * `annotation` - The declared annotation, if any
    /// * `default` - The declared default, used to infer a missing annotation
    ///
    /// # Returns
    /// The descriptor, or a signature error for unions of several concrete
    /// types, unknown forward references and nested containers
    pub fn resolve(
        &self,
        param: &str,
        annotation: Option<&TypeExpr>,
        default: Option<&Value>,
    ) -> Result<TypeDescriptor, BuildError> {
        let expr = match annotation {
            Some(expr) => expr.clone(),
            None => {
                let inferred = default.map(infer_from_value).unwrap_or_else(TypeExpr::string);
                debug!("Inferred type {:?} for parameter '{}' from its default", inferred, param);
                inferred
            }
        };

        let top = self.unwrap(param, expr)?;
        let (resolved, element, match_type) = match top.expr {
            TypeExpr::Collection { kind, element } => {
                let inner = self.unwrap(param, *element)?;
                let alias = inner.alias.clone();
                let element = self.resolve_element(param, inner.expr)?;
                let match_type = alias.unwrap_or_else(|| element.key());
                let resolved = ResolvedType::Collection {
                    kind,
                    element: Box::new(element.clone()),
                };
                (resolved, element, match_type)
            }
            TypeExpr::Mapping { key, value } => {
                let resolved = ResolvedType::Mapping {
                    key: Box::new(self.resolve_scalar(param, *key)?),
                    value: Box::new(self.resolve_scalar(param, *value)?),
                };
                (resolved.clone(), resolved.clone(), resolved.key())
            }
            other => {
                let resolved = self.resolve_element(param, other)?;
                let match_type = resolved.key();
                (resolved.clone(), resolved, match_type)
            }
        };

        let arity = match &element {
            ResolvedType::Tuple(slots) => slots.len(),
            _ => 1,
        };
        let allows_multiple = matches!(
            resolved,
            ResolvedType::Collection { .. } | ResolvedType::Mapping { .. }
        );
        let descriptor = TypeDescriptor {
            match_type: top.alias.unwrap_or(match_type),
            is_flag: resolved.is_bool(),
            resolved,
            element,
            arity,
            allows_multiple,
            is_optional: top.optional,
        };
        debug!(
            "Resolved parameter '{}' to {} (match type {}, arity {}, multiple {})",
            param,
            descriptor.resolved.display_name(),
            descriptor.match_type,
            descriptor.arity,
            descriptor.allows_multiple
        );
        Ok(descriptor)
    }

    /// Strip forward references, optional and union layers, and aliases
    fn unwrap(&self, param: &str, expr: TypeExpr) -> Result<Unwrapped, BuildError> {
        let mut current = expr;
        let mut alias = None;
        let mut optional = false;
        let mut visited = HashSet::new();
        loop {
            current = match current {
                TypeExpr::Forward(name) => {
                    let Some(found) = self.namespace.lookup_type(&name) else {
                        return Err(BuildError::signature(format!(
                            "Unknown type '{name}' for parameter '{param}'"
                        )));
                    };
                    if !visited.insert(name.clone()) {
                        return Err(BuildError::signature(format!(
                            "Type '{name}' of parameter '{param}' refers to itself"
                        )));
                    }
                    found.clone()
                }
                TypeExpr::Optional(inner) => {
                    optional = true;
                    *inner
                }
                TypeExpr::Union(members) => {
                    let (nones, mut concrete): (Vec<_>, Vec<_>) = members
                        .into_iter()
                        .partition(|member| matches!(member, TypeExpr::NoneType));
                    if !nones.is_empty() {
                        optional = true;
                    }
                    match (concrete.pop(), concrete.is_empty()) {
                        (Some(single), true) => single,
                        (None, _) => {
                            return Err(BuildError::signature(format!(
                                "Parameter '{param}' has a union without a concrete type"
                            )))
                        }
                        (Some(_), false) => {
                            return Err(BuildError::signature(format!(
                                "Union types are not supported (parameter '{param}')"
                            )))
                        }
                    }
                }
                TypeExpr::NoneType => {
                    return Err(BuildError::signature(format!(
                        "Parameter '{param}' cannot have type None"
                    )))
                }
                TypeExpr::Tagged { alias: tag, base } => {
                    alias.get_or_insert(tag);
                    *base
                }
                TypeExpr::Alias { target, .. } => *target,
                concrete => {
                    return Ok(Unwrapped {
                        expr: concrete,
                        alias,
                        optional,
                    })
                }
            };
        }
    }

    /// A scalar or a tuple of scalars
    fn resolve_element(&self, param: &str, expr: TypeExpr) -> Result<ResolvedType, BuildError> {
        match expr {
            TypeExpr::Tuple(slots) => Ok(ResolvedType::Tuple(
                slots
                    .into_iter()
                    .map(|slot| self.resolve_scalar(param, slot))
                    .collect::<Result<_, _>>()?,
            )),
            other => self.resolve_scalar(param, other),
        }
    }

    fn resolve_scalar(&self, param: &str, expr: TypeExpr) -> Result<ResolvedType, BuildError> {
        match self.unwrap(param, expr)?.expr {
            TypeExpr::Primitive(primitive) => Ok(ResolvedType::Primitive(primitive)),
            TypeExpr::Named(key) => Ok(ResolvedType::Named(key)),
            TypeExpr::Enum { key, variants } => Ok(ResolvedType::Enum { key, variants }),
            other => Err(BuildError::signature(format!(
                "Nested container type {other:?} is not supported (parameter '{param}')"
            ))),
        }
    }
}

/// Annotation implied by a default value
pub fn infer_from_value(value: &Value) -> TypeExpr {
    match value {
        Value::Bool(_) => TypeExpr::boolean(),
        Value::Number(n) if n.is_f64() => TypeExpr::float(),
        Value::Number(_) => TypeExpr::int(),
        Value::String(_) | Value::Null => TypeExpr::string(),
        Value::Array(items) => TypeExpr::list(
            items
                .first()
                .map(infer_from_value)
                .unwrap_or_else(TypeExpr::string),
        ),
        Value::Object(_) => TypeExpr::mapping(TypeExpr::string(), TypeExpr::string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionKind, Primitive};
    use serde_json::json;

    struct ReadableFile;
    struct Color;

    fn resolve(
        annotation: Option<TypeExpr>,
        default: Option<Value>,
    ) -> Result<TypeDescriptor, BuildError> {
        let namespace: HashMap<String, TypeExpr> = HashMap::new();
        TypeResolver::new(&namespace).resolve("param", annotation.as_ref(), default.as_ref())
    }

    #[test]
    fn test_optional_unwraps_to_inner_type() {
        let descriptor =
            resolve(Some(TypeExpr::optional(TypeExpr::float())), Some(Value::Null)).unwrap();
        assert!(descriptor.is_optional);
        assert_eq!(descriptor.resolved, ResolvedType::Primitive(Primitive::Float));
        assert_eq!(descriptor.arity, 1);
        assert!(!descriptor.allows_multiple);
    }

    #[test]
    fn test_union_with_none_is_optional() {
        let descriptor = resolve(
            Some(TypeExpr::union([TypeExpr::int(), TypeExpr::NoneType])),
            None,
        )
        .unwrap();
        assert!(descriptor.is_optional);
        assert_eq!(descriptor.match_type, TypeKey::new("int"));
    }

    #[test]
    fn test_union_of_two_types_is_rejected() {
        let err = resolve(Some(TypeExpr::union([TypeExpr::int(), TypeExpr::string()])), None)
            .unwrap_err();
        assert!(matches!(err, BuildError::Signature { .. }));
    }

    #[test]
    fn test_tagged_alias_sets_match_type() {
        let descriptor = resolve(
            Some(TypeExpr::optional(TypeExpr::tagged::<ReadableFile>(TypeExpr::path()))),
            None,
        )
        .unwrap();
        assert_eq!(descriptor.match_type, TypeKey::of::<ReadableFile>());
        assert_eq!(descriptor.resolved, ResolvedType::Primitive(Primitive::Path));
    }

    #[test]
    fn test_tuple_arity() {
        let descriptor = resolve(
            Some(TypeExpr::tuple([TypeExpr::int(), TypeExpr::string()])),
            None,
        )
        .unwrap();
        assert_eq!(descriptor.arity, 2);
        assert!(!descriptor.allows_multiple);
    }

    #[test]
    fn test_collection_is_multiple_and_keyed_by_element() {
        let descriptor = resolve(
            Some(TypeExpr::list(TypeExpr::tagged::<ReadableFile>(TypeExpr::path()))),
            None,
        )
        .unwrap();
        assert!(descriptor.allows_multiple);
        assert_eq!(descriptor.match_type, TypeKey::of::<ReadableFile>());
        assert_eq!(descriptor.element, ResolvedType::Primitive(Primitive::Path));
        assert!(matches!(
            descriptor.resolved,
            ResolvedType::Collection { kind: CollectionKind::List, .. }
        ));
    }

    #[test]
    fn test_mapping_is_multiple() {
        let descriptor = resolve(
            Some(TypeExpr::mapping(TypeExpr::string(), TypeExpr::int())),
            None,
        )
        .unwrap();
        assert!(descriptor.allows_multiple);
        assert_eq!(descriptor.match_type, TypeKey::new("mapping"));
    }

    #[test]
    fn test_nested_collection_is_rejected() {
        let err = resolve(Some(TypeExpr::list(TypeExpr::list(TypeExpr::int()))), None).unwrap_err();
        assert!(matches!(err, BuildError::Signature { .. }));
    }

    #[test]
    fn test_inference_from_default() {
        assert!(resolve(None, Some(json!(false))).unwrap().is_flag);
        assert_eq!(
            resolve(None, Some(json!(1))).unwrap().resolved,
            ResolvedType::Primitive(Primitive::Int)
        );
        assert_eq!(
            resolve(None, Some(json!(0.5))).unwrap().resolved,
            ResolvedType::Primitive(Primitive::Float)
        );
        assert_eq!(
            resolve(None, None).unwrap().resolved,
            ResolvedType::Primitive(Primitive::Str)
        );
        assert!(resolve(None, Some(json!(["a"]))).unwrap().allows_multiple);
    }

    #[test]
    fn test_forward_reference() {
        let mut namespace = HashMap::new();
        namespace.insert(
            "Color".to_string(),
            TypeExpr::enumeration::<Color, _, _>(["RED", "GREEN"]),
        );
        let resolver = TypeResolver::new(&namespace);
        let descriptor = resolver
            .resolve("color", Some(&TypeExpr::forward("Color")), None)
            .unwrap();
        assert_eq!(descriptor.match_type, TypeKey::of::<Color>());

        let err = resolver
            .resolve("color", Some(&TypeExpr::forward("Colour")), None)
            .unwrap_err();
        assert!(err.to_string().contains("Colour"));
    }

    #[test]
    fn test_cyclic_forward_reference_is_rejected() {
        let mut namespace = HashMap::new();
        namespace.insert("Loop".to_string(), TypeExpr::forward("Loop"));
        namespace.insert("Ping".to_string(), TypeExpr::optional(TypeExpr::forward("Pong")));
        namespace.insert("Pong".to_string(), TypeExpr::forward("Ping"));
        let resolver = TypeResolver::new(&namespace);

        let err = resolver
            .resolve("me", Some(&TypeExpr::forward("Loop")), None)
            .unwrap_err();
        assert!(matches!(err, BuildError::Signature { .. }));
        assert!(err.to_string().contains("refers to itself"));

        assert!(resolver
            .resolve("ping", Some(&TypeExpr::forward("Ping")), None)
            .is_err());
    }

    #[test]
    fn test_alias_is_transparent() {
        let descriptor = resolve(Some(TypeExpr::alias("Port", TypeExpr::int())), None).unwrap();
        assert_eq!(descriptor.match_type, TypeKey::new("int"));
    }
}
