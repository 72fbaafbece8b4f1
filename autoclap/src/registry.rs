//! The conversion, validation and composite registry
//!
//! A [`Registry`] is populated before any command is built and is borrowed
//! immutably by every build, so registrations cannot change while a build is
//! in progress.

use crate::composite::CompositeDefinition;
use crate::conversion::{
    primitive_converter, CaseFold, ConversionFn, EnumChoice, FnConverter, KeyValueConverter,
    SharedConverter, StringConverter,
};
use crate::error::{BuildError, ConversionError, ValidationError};
use crate::types::resolver::TypeNamespace;
use crate::types::{ResolvedType, TypeExpr, TypeKey};
use crate::validation::{with_dependencies, TypeValidation};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decides whether an auto-conversion applies to a resolved type
pub type AutoPredicate = Arc<dyn Fn(&ResolvedType) -> bool + Send + Sync>;

/// Builds the converter for a resolved type accepted by its predicate
pub type AutoFactory = Arc<dyn Fn(&ResolvedType, &Registry) -> SharedConverter + Send + Sync>;

/// A converter factory consulted when no exact conversion is registered
#[derive(Clone)]
pub struct AutoConversion {
    name: String,
    predicate: AutoPredicate,
    factory: AutoFactory,
}

impl AutoConversion {
    pub fn new<P, F>(name: impl Into<String>, predicate: P, factory: F) -> Self
    where
        P: Fn(&ResolvedType) -> bool + Send + Sync + 'static,
        F: Fn(&ResolvedType, &Registry) -> SharedConverter + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Registered conversions, validations, composites and type names
pub struct Registry {
    conversions: HashMap<TypeKey, SharedConverter>,
    autoconversions: Vec<AutoConversion>,
    validations: HashMap<TypeKey, Vec<TypeValidation>>,
    composites: HashMap<TypeKey, Arc<CompositeDefinition>>,
    namespace: HashMap<String, TypeExpr>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conversions: Vec<&str> = self.conversions.keys().map(TypeKey::name).collect();
        conversions.sort_unstable();
        let mut composites: Vec<&str> = self.composites.keys().map(TypeKey::name).collect();
        composites.sort_unstable();
        f.debug_struct("Registry")
            .field("conversions", &conversions)
            .field(
                "autoconversions",
                &self.autoconversions.iter().map(AutoConversion::name).collect::<Vec<_>>(),
            )
            .field("validations", &self.validations.len())
            .field("composites", &composites)
            .finish()
    }
}

impl Registry {
    /// A registry with the built-in enum and mapping auto-conversions
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_autoconversion(enum_autoconversion(CaseFold::Insensitive));
        registry.register_autoconversion(mapping_autoconversion());
        registry
    }

    /// A registry without any auto-conversions
    pub fn empty() -> Self {
        Self {
            conversions: HashMap::new(),
            autoconversions: Vec::new(),
            validations: HashMap::new(),
            composites: HashMap::new(),
            namespace: HashMap::new(),
        }
    }

    /// Register the converter for a type, replacing any previous one
    pub fn register_conversion(&mut self, key: TypeKey, converter: SharedConverter) {
        if self.conversions.insert(key.clone(), converter).is_some() {
            warn!("Replaced conversion registered for {}", key);
        } else {
            debug!("Registered conversion for {}", key);
        }
    }

    /// Register a conversion function for a type
    pub fn conversion<F>(&mut self, key: TypeKey, name: impl Into<String>, convert: F)
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.register_conversion(key, Arc::new(FnConverter::new(name, convert)));
    }

    /// Register a conversion function applied after `depends`, in order
    pub fn conversion_with<F>(
        &mut self,
        key: TypeKey,
        name: impl Into<String>,
        depends: Vec<ConversionFn>,
        convert: F,
    ) where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.register_conversion(
            key,
            Arc::new(FnConverter::new(name, convert).with_depends(depends)),
        );
    }

    pub fn has_conversion(&self, key: &TypeKey) -> bool {
        self.conversions.contains_key(key)
    }

    pub fn register_autoconversion(&mut self, autoconversion: AutoConversion) {
        debug!("Registered auto-conversion {}", autoconversion.name);
        self.autoconversions.push(autoconversion);
    }

    /// Find the converter for a type
    ///
    /// # Arguments
    /// * `match_type` - Key of the parameter's type
    /// * `fallback` - Concrete type used when nothing is registered for the key
    ///
    /// # Returns
    /// The exact conversion for `match_type`, else the exact conversion for
    /// `fallback`, else the first matching auto-conversion, else the built-in
    /// converter. Named types without any conversion are passed through as
    /// strings.
    pub fn get_conversion(&self, match_type: &TypeKey, fallback: &ResolvedType) -> SharedConverter {
        if let Some(converter) = self
            .conversions
            .get(match_type)
            .or_else(|| self.conversions.get(&fallback.key()))
        {
            return converter.clone();
        }
        if let Some(auto) = self.autoconversions.iter().find(|auto| (auto.predicate)(fallback)) {
            debug!("Using auto-conversion {} for {}", auto.name, match_type);
            return (auto.factory)(fallback, self);
        }
        match fallback {
            ResolvedType::Primitive(primitive) => primitive_converter(*primitive),
            other => {
                debug!(
                    "No conversion for {}, passing tokens through as text",
                    other.display_name()
                );
                Arc::new(StringConverter)
            }
        }
    }

    /// Register a validation for values of a type
    pub fn validation<F>(&mut self, key: TypeKey, validate: F)
    where
        F: Fn(&str, &Value) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.register_validation(key, Arc::new(validate), Vec::new());
    }

    /// Register a validation that runs after each of `depends_on`
    pub fn validation_with<F>(&mut self, key: TypeKey, depends_on: Vec<TypeValidation>, validate: F)
    where
        F: Fn(&str, &Value) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.register_validation(key, Arc::new(validate), depends_on);
    }

    pub fn register_validation(
        &mut self,
        key: TypeKey,
        validation: TypeValidation,
        depends_on: Vec<TypeValidation>,
    ) {
        debug!("Registered validation for {}", key);
        self.validations
            .entry(key)
            .or_default()
            .push(with_dependencies(validation, depends_on));
    }

    pub fn get_validations(&self, key: &TypeKey) -> &[TypeValidation] {
        self.validations.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Register a composite type
    ///
    /// The members are built against this registry now, so conversions and
    /// validations used by the members must be registered first.
    pub fn register_composite(
        &mut self,
        definition: CompositeDefinition,
    ) -> Result<Arc<CompositeDefinition>, BuildError> {
        let key = definition.match_type().clone();
        if self.composites.contains_key(&key) {
            return Err(BuildError::type_collision(format!(
                "A composite is already registered for {key}"
            )));
        }
        let prepared = Arc::new(definition.prepare(self)?);
        debug!(
            "Registered composite {} with {} members",
            key,
            prepared.members().len()
        );
        self.composites.insert(key, prepared.clone());
        Ok(prepared)
    }

    pub fn composite(&self, key: &TypeKey) -> Option<Arc<CompositeDefinition>> {
        self.composites.get(key).cloned()
    }

    pub fn has_composite(&self, key: &TypeKey) -> bool {
        self.composites.contains_key(key)
    }

    /// Make `expr` available to [`TypeExpr::Forward`] references as `name`
    pub fn declare_type(&mut self, name: impl Into<String>, expr: TypeExpr) {
        self.namespace.insert(name.into(), expr);
    }
}

impl TypeNamespace for Registry {
    fn lookup_type(&self, name: &str) -> Option<&TypeExpr> {
        self.namespace.get(name)
    }
}

/// Enum variants are matched with `fold` and stored by canonical name
pub fn enum_autoconversion(fold: CaseFold) -> AutoConversion {
    AutoConversion::new(
        "enum",
        |resolved| matches!(resolved, ResolvedType::Enum { .. }),
        move |resolved, _| match resolved {
            ResolvedType::Enum { key, variants } => {
                Arc::new(EnumChoice::new(key, variants.clone(), fold)) as SharedConverter
            }
            _ => Arc::new(StringConverter),
        },
    )
}

/// `key=value` tokens with keys and values converted by their own types
pub fn mapping_autoconversion() -> AutoConversion {
    AutoConversion::new(
        "mapping",
        |resolved| matches!(resolved, ResolvedType::Mapping { .. }),
        |resolved, registry| match resolved {
            ResolvedType::Mapping { key, value } => Arc::new(KeyValueConverter::new(
                registry.get_conversion(&key.key(), key),
                registry.get_conversion(&value.key(), value),
            )) as SharedConverter,
            _ => Arc::new(StringConverter),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;
    use serde_json::json;

    struct Color;
    struct Celsius;

    #[test]
    fn test_builtin_fallback() {
        let registry = Registry::new();
        let int = ResolvedType::Primitive(Primitive::Int);
        let converter = registry.get_conversion(&TypeKey::new("int"), &int);
        assert_eq!(converter.convert("7").unwrap(), json!(7));
    }

    #[test]
    fn test_exact_conversion_wins_and_overwrites() {
        let mut registry = Registry::new();
        let key = TypeKey::of::<Celsius>();
        registry.conversion(key.clone(), "celsius", |_| Ok(json!(1)));
        registry.conversion(key.clone(), "celsius", |_| Ok(json!(2)));
        let converter = registry.get_conversion(&key, &ResolvedType::Primitive(Primitive::Float));
        assert_eq!(converter.convert("x").unwrap(), json!(2));
        assert_eq!(converter.name(), "celsius");
    }

    #[test]
    fn test_enum_autoconversion() {
        let registry = Registry::new();
        let resolved = ResolvedType::Enum {
            key: TypeKey::of::<Color>(),
            variants: vec!["RED".into(), "GREEN".into()],
        };
        let converter = registry.get_conversion(&TypeKey::of::<Color>(), &resolved);
        assert_eq!(converter.convert("green").unwrap(), json!("GREEN"));
        assert_eq!(converter.choices(), Some(vec!["RED".to_string(), "GREEN".to_string()]));
    }

    #[test]
    fn test_mapping_autoconversion_uses_value_conversion() {
        let registry = Registry::new();
        let resolved = ResolvedType::Mapping {
            key: Box::new(ResolvedType::Primitive(Primitive::Str)),
            value: Box::new(ResolvedType::Primitive(Primitive::Int)),
        };
        let converter = registry.get_conversion(&TypeKey::new("mapping"), &resolved);
        let pair = converter.convert("retries=3").unwrap();
        assert_eq!(converter.aggregate(vec![pair]).unwrap(), json!({"retries": 3}));
    }

    #[test]
    fn test_validations_accumulate_in_order() {
        let mut registry = Registry::new();
        let key = TypeKey::new("int");
        registry.validation(key.clone(), |_, _| Ok(()));
        registry.validation(key.clone(), |name, _| {
            Err(ValidationError::new(format!("{name} bad")))
        });
        let validations = registry.get_validations(&key);
        assert_eq!(validations.len(), 2);
        assert!(validations[0]("n", &json!(1)).is_ok());
        assert_eq!(validations[1]("n", &json!(1)).unwrap_err().message(), "n bad");
        assert!(registry.get_validations(&TypeKey::new("float")).is_empty());
    }

    #[test]
    fn test_declared_types_resolve_forward_references() {
        let mut registry = Registry::new();
        registry.declare_type("Port", TypeExpr::int());
        assert_eq!(registry.lookup_type("Port"), Some(&TypeExpr::int()));
        assert_eq!(registry.lookup_type("Host"), None);
    }
}
