//! Composite parameters
//!
//! A composite is a parameter whose type is built from several CLI values:
//! the members of the type's constructor signature. By default each member is
//! rendered as its own primitive (prefixed with the parameter name) and the
//! object is constructed after validation. In packed mode all members share a
//! single option that takes one token per member.

use crate::error::{BuildError, InvocationError};
use crate::options::CommonOptions;
use crate::parameter::{ParameterBuilder, ParameterDescriptor, RenderContext};
use crate::parsed::ParsedValues;
use crate::pipeline::{apply_conditionals, apply_validations};
use crate::primitive::{CliPrimitive, OptionSpec, ValueSpec};
use crate::registry::Registry;
use crate::short_names::ShortNames;
use crate::signature::{ParamKind, Signature};
use crate::types::TypeKey;
use crate::validation::{ConditionalFn, GroupValues, RuleTable, ValidationFn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds the composite object from its member values
pub type Constructor = Arc<dyn Fn(&GroupValues) -> anyhow::Result<Value> + Send + Sync>;

/// A registered composite type
#[derive(Clone)]
pub struct CompositeDefinition {
    match_type: TypeKey,
    signature: Signature,
    constructor: Constructor,
    options: CommonOptions,
    force_create: bool,
    packed: bool,
    members: Vec<ParameterDescriptor>,
    validations: RuleTable<ValidationFn>,
}

impl fmt::Debug for CompositeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDefinition")
            .field("match_type", &self.match_type)
            .field(
                "members",
                &self.members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            )
            .field("force_create", &self.force_create)
            .field("packed", &self.packed)
            .finish()
    }
}

impl CompositeDefinition {
    /// A composite constructed by deserializing the member values into `T`
    pub fn for_type<T>(signature: Signature) -> Self
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        Self::factory(TypeKey::of::<T>(), signature, |members: &GroupValues| {
            let object: Map<String, Value> = members
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            let built: T = serde_json::from_value(Value::Object(object))?;
            Ok(serde_json::to_value(built)?)
        })
    }

    /// A composite for `match_type` built by an arbitrary function
    pub fn factory<F>(match_type: TypeKey, signature: Signature, constructor: F) -> Self
    where
        F: Fn(&GroupValues) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            match_type,
            signature,
            constructor: Arc::new(constructor),
            options: CommonOptions::default(),
            force_create: false,
            packed: false,
            members: Vec::new(),
            validations: RuleTable::new(),
        }
    }

    pub fn options(mut self, options: CommonOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_options(mut self, f: impl FnOnce(CommonOptions) -> CommonOptions) -> Self {
        self.options = f(self.options);
        self
    }

    /// Construct the object even when an optional parameter has no values
    pub fn force_create(mut self, force: bool) -> Self {
        self.force_create = force;
        self
    }

    /// Render all members as one multi-value option
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = packed;
        self
    }

    pub fn match_type(&self) -> &TypeKey {
        &self.match_type
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Member descriptors, in processing order
    pub fn members(&self) -> &[ParameterDescriptor] {
        &self.members
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Build the member descriptors against `registry`
    pub(crate) fn prepare(mut self, registry: &Registry) -> Result<Self, BuildError> {
        if let Some(variadic) = self
            .signature
            .params
            .iter()
            .find(|p| matches!(p.kind, ParamKind::VarPositional | ParamKind::VarKeyword))
        {
            return Err(BuildError::signature(format!(
                "Composite type {} cannot have variadic parameter '{}'",
                self.match_type, variadic.name
            )));
        }

        let mut members = Vec::new();
        let mut validations = RuleTable::new();
        {
            let builder = ParameterBuilder::new(registry, &self.options)
                .with_doc(self.signature.parsed_doc());
            for spec in builder.order(self.signature.regular().collect())? {
                let member = builder.build(spec)?;
                if registry.has_composite(&member.match_type) {
                    return Err(BuildError::signature(format!(
                        "Composite parameters cannot be nested: member '{}' of {} is a composite",
                        member.name, self.match_type
                    )));
                }
                if self.packed && (member.arity != 1 || member.allows_multiple) {
                    return Err(BuildError::signature(format!(
                        "Packed composite {} requires single-valued members, '{}' is not",
                        self.match_type, member.name
                    )));
                }
                validations.extend_group(
                    member.name.as_str(),
                    builder.type_validations(&member, &member.name),
                );
                members.push(member);
            }
        }
        validations.merge(&self.options.validations);
        self.members = members;
        self.validations = validations;
        Ok(self)
    }

    /// Render the primitives of `param` and the callback that rebuilds it
    ///
    /// # Arguments
    /// * `definition` - The registered composite
    /// * `registry` - Registry the command is built against
    /// * `param` - The parameter whose type is the composite
    /// * `ctx` - Command-level state: used short names and prefix handling
    pub fn expand(
        definition: &Arc<Self>,
        registry: &Registry,
        param: &ParameterDescriptor,
        ctx: ExpansionContext<'_>,
    ) -> Result<Expansion, BuildError> {
        if definition.packed {
            return Self::expand_packed(definition, param, ctx);
        }

        let prefix = ctx.add_prefix.then_some(param.name.as_str());
        let rename = |name: &str| match prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.to_string(),
        };
        let builder = ParameterBuilder::new(registry, &definition.options);
        let mut primitives = Vec::with_capacity(definition.members.len());
        let mut keys = Vec::with_capacity(definition.members.len());
        for member in &definition.members {
            let render = RenderContext {
                prefix,
                force_options: ctx.force_options || param.is_optional,
                force_not_required: param.is_optional,
                hidden: ctx.hidden,
                default_override: ctx.default_values.get(&rename(&member.name)).cloned(),
            };
            let primitive = builder.render(member, &render, ctx.shorts)?;
            keys.push((member.name.clone(), primitive.key().to_string()));
            primitives.push(primitive);
        }

        let member_keys = Arc::new(MemberKeys {
            pairs: keys.clone(),
            prefix: prefix.map(str::to_string),
        });
        Ok(Expansion {
            primitives,
            conditionals: member_keys.conditionals(&definition.options.conditionals),
            validations: member_keys.validations(&definition.validations),
            callback: CompositeCallback {
                definition: definition.clone(),
                parameter: param.name.clone(),
                optional: param.is_optional,
                layout: MemberLayout::Expanded(keys),
            },
        })
    }

    fn expand_packed(
        definition: &Arc<Self>,
        param: &ParameterDescriptor,
        ctx: ExpansionContext<'_>,
    ) -> Result<Expansion, BuildError> {
        let converters = definition
            .members
            .iter()
            .flat_map(|member| member.converters.iter().cloned())
            .collect();
        let default = definition
            .members
            .iter()
            .map(|member| {
                ctx.default_values
                    .get(&format!("{}_{}", param.name, member.name))
                    .cloned()
                    .or_else(|| member.default.clone())
                    .unwrap_or(Value::Null)
            })
            .collect();
        let short = ctx.shorts.assign(
            &param.name,
            ctx.parent.short_names.get(&param.name).copied(),
            ctx.parent.infer_short_names,
        )?;
        let option = OptionSpec {
            key: param.name.clone(),
            long: ctx.parent.long_name(None, &param.name),
            short,
            flag: None,
            value: ValueSpec::new(converters),
            multiple: false,
            required: !param.is_optional,
            default: Some(Value::Array(default)),
            hidden: ctx.hidden,
            help: param.help.clone(),
            show_default: ctx.parent.show_defaults,
        };
        Ok(Expansion {
            primitives: vec![CliPrimitive::Option(option)],
            conditionals: RuleTable::new(),
            validations: RuleTable::new(),
            callback: CompositeCallback {
                definition: definition.clone(),
                parameter: param.name.clone(),
                optional: param.is_optional,
                layout: MemberLayout::Packed(
                    definition.members.iter().map(|m| m.name.clone()).collect(),
                ),
            },
        })
    }

    /// Run the composite's own conditionals and validations on member values
    fn apply_rules(&self, members: &mut GroupValues) -> Result<(), InvocationError> {
        apply_conditionals(&self.options.conditionals, members)?;
        apply_validations(&self.validations, members)?;
        Ok(())
    }
}

/// Command-level state used while expanding a composite
pub struct ExpansionContext<'a> {
    /// Options of the command that owns the parameter
    pub parent: &'a CommonOptions,
    pub shorts: &'a mut ShortNames,
    pub add_prefix: bool,
    pub hidden: bool,
    pub force_options: bool,
    /// Member defaults that override the constructor signature
    pub default_values: &'a HashMap<String, Value>,
}

/// Result of expanding one composite parameter
#[derive(Debug)]
pub struct Expansion {
    pub primitives: Vec<CliPrimitive>,
    /// Member conditionals keyed by primitive keys
    pub conditionals: RuleTable<ConditionalFn>,
    /// Member validations keyed by primitive keys
    pub validations: RuleTable<ValidationFn>,
    pub callback: CompositeCallback,
}

#[derive(Debug, Clone)]
enum MemberLayout {
    /// Member name and primitive key of each member
    Expanded(Vec<(String, String)>),
    /// Member names, in slot order
    Packed(Vec<String>),
}

/// Rebuilds one composite parameter from its member values
#[derive(Debug, Clone)]
pub struct CompositeCallback {
    definition: Arc<CompositeDefinition>,
    parameter: String,
    optional: bool,
    layout: MemberLayout,
}

impl CompositeCallback {
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// Replace the member values with the constructed object
    ///
    /// The parameter is set to null without calling the constructor when it
    /// is optional, creation is not forced and every member is absent.
    pub fn reassemble(&self, values: &mut ParsedValues) -> Result<(), InvocationError> {
        let mut members = GroupValues::new();
        let supplied = match &self.layout {
            MemberLayout::Expanded(keys) => {
                let supplied = keys.iter().any(|(_, key)| values.is_supplied(key));
                for (member, key) in keys {
                    members.insert(member.clone(), values.remove(key).unwrap_or(Value::Null));
                }
                supplied
            }
            MemberLayout::Packed(names) => {
                let supplied = values.is_supplied(&self.parameter);
                let slots = match values.remove(&self.parameter) {
                    Some(Value::Array(slots)) => slots,
                    _ => Vec::new(),
                };
                for (index, member) in names.iter().enumerate() {
                    let slot = slots.get(index).cloned().unwrap_or(Value::Null);
                    members.insert(member.clone(), slot);
                }
                supplied
            }
        };

        if self.optional
            && !self.definition.force_create
            && (!supplied || members.values().all(is_absent))
        {
            values.insert(self.parameter.clone(), Value::Null);
            return Ok(());
        }
        if let MemberLayout::Packed(_) = self.layout {
            self.definition.apply_rules(&mut members)?;
        }

        let object = (self.definition.constructor)(&members).map_err(|error| {
            InvocationError::Construction {
                parameter: self.parameter.clone(),
                error,
            }
        })?;
        values.insert(self.parameter.clone(), object);
        Ok(())
    }
}

/// Member names paired with the primitive keys they were rendered under
///
/// Rules of an expanded composite are keyed by primitive keys in the command
/// pipeline but always see and return member names.
#[derive(Debug)]
struct MemberKeys {
    pairs: Vec<(String, String)>,
    prefix: Option<String>,
}

impl MemberKeys {
    fn member<'a>(&'a self, key: &'a str) -> &'a str {
        self.pairs
            .iter()
            .find(|(_, k)| k == key)
            .map_or(key, |(member, _)| member.as_str())
    }

    fn key(&self, member: &str) -> String {
        match self.pairs.iter().find(|(m, _)| m == member) {
            Some((_, key)) => key.clone(),
            None => match &self.prefix {
                Some(prefix) => format!("{prefix}_{member}"),
                None => member.to_string(),
            },
        }
    }

    fn by_member(&self, group: &GroupValues) -> GroupValues {
        group
            .iter()
            .map(|(key, value)| (self.member(key).to_string(), value.clone()))
            .collect()
    }

    fn by_key(&self, members: GroupValues) -> GroupValues {
        members
            .into_iter()
            .map(|(member, value)| (self.key(&member), value))
            .collect()
    }

    fn validations(self: &Arc<Self>, rules: &RuleTable<ValidationFn>) -> RuleTable<ValidationFn> {
        let mut table = RuleTable::new();
        for (group, functions) in rules.iter() {
            let wrapped = functions.iter().map(|function| {
                let keys = self.clone();
                let function = function.clone();
                Arc::new(move |group: &GroupValues| function(&keys.by_member(group)))
                    as ValidationFn
            });
            table.extend_group(group.map_names(|name| self.key(name)), wrapped);
        }
        table
    }

    fn conditionals(
        self: &Arc<Self>,
        rules: &RuleTable<ConditionalFn>,
    ) -> RuleTable<ConditionalFn> {
        let mut table = RuleTable::new();
        for (group, functions) in rules.iter() {
            let wrapped = functions.iter().map(|function| {
                let keys = self.clone();
                let function = function.clone();
                Arc::new(move |group: &GroupValues| {
                    let updates = function(&keys.by_member(group))?;
                    Ok(updates.map(|updates| keys.by_key(updates)))
                }) as ConditionalFn
            });
            table.extend_group(group.map_names(|name| self.key(name)), wrapped);
        }
        table
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::signature::ParamSpec;
    use crate::types::TypeExpr;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Endpoint {
        host: String,
        port: i64,
    }

    fn endpoint_signature() -> Signature {
        Signature::new("Endpoint")
            .param(ParamSpec::receiver())
            .param(ParamSpec::new("host").typed(TypeExpr::string()))
            .param(ParamSpec::new("port").typed(TypeExpr::int()).default(80))
    }

    fn param(name: &str, optional: bool) -> ParameterDescriptor {
        let registry = Registry::new();
        let options = CommonOptions::default();
        let mut spec = ParamSpec::new(name).typed(TypeExpr::named::<Endpoint>());
        if optional {
            spec = spec.default(Value::Null);
        }
        ParameterBuilder::new(&registry, &options).build(&spec).unwrap()
    }

    fn expand(
        registry: &Registry,
        definition: &Arc<CompositeDefinition>,
        param: &ParameterDescriptor,
        shorts: &mut ShortNames,
    ) -> Expansion {
        let parent = CommonOptions::default();
        let defaults = HashMap::new();
        CompositeDefinition::expand(
            definition,
            registry,
            param,
            ExpansionContext {
                parent: &parent,
                shorts,
                add_prefix: true,
                hidden: false,
                force_options: false,
                default_values: &defaults,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_registration_builds_members_without_receiver() {
        let mut registry = Registry::new();
        let definition = registry
            .register_composite(CompositeDefinition::for_type::<Endpoint>(endpoint_signature()))
            .unwrap();
        let names: Vec<&str> = definition.members().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["host", "port"]);
    }

    #[test]
    fn test_duplicate_registration_is_a_type_collision() {
        let mut registry = Registry::new();
        registry
            .register_composite(CompositeDefinition::for_type::<Endpoint>(endpoint_signature()))
            .unwrap();
        let err = registry
            .register_composite(CompositeDefinition::for_type::<Endpoint>(endpoint_signature()))
            .unwrap_err();
        assert!(matches!(err, BuildError::TypeCollision { .. }));
    }

    #[test]
    fn test_variadic_member_is_rejected() {
        let mut registry = Registry::new();
        let signature = endpoint_signature().param(ParamSpec::var_keyword("extra"));
        let err = registry
            .register_composite(CompositeDefinition::for_type::<Endpoint>(signature))
            .unwrap_err();
        assert!(matches!(err, BuildError::Signature { .. }));
    }

    #[test]
    fn test_nested_composite_is_rejected() {
        #[derive(Serialize, Deserialize)]
        struct Route {
            endpoint: Endpoint,
        }
        let mut registry = Registry::new();
        registry
            .register_composite(CompositeDefinition::for_type::<Endpoint>(endpoint_signature()))
            .unwrap();
        let err = registry
            .register_composite(CompositeDefinition::for_type::<Route>(
                Signature::new("Route")
                    .param(ParamSpec::new("endpoint").typed(TypeExpr::named::<Endpoint>())),
            ))
            .unwrap_err();
        assert!(err.to_string().contains("cannot be nested"));
    }

    #[test]
    fn test_expanded_members_are_prefixed_and_reassembled() {
        let mut registry = Registry::new();
        let definition = registry
            .register_composite(CompositeDefinition::for_type::<Endpoint>(endpoint_signature()))
            .unwrap();
        let mut shorts = ShortNames::new();
        let expansion = expand(&registry, &definition, &param("server", false), &mut shorts);

        let keys: Vec<&str> = expansion.primitives.iter().map(CliPrimitive::key).collect();
        assert_eq!(keys, vec!["server_host", "server_port"]);
        assert!(expansion.primitives[0].is_positional());
        assert!(!expansion.primitives[1].is_positional());

        let mut values: ParsedValues = [
            ("server_host".to_string(), json!("localhost")),
            ("server_port".to_string(), json!(8080)),
        ]
        .into_iter()
        .collect();
        expansion.callback.reassemble(&mut values).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(
            values.get_as::<Endpoint>("server").unwrap(),
            Endpoint {
                host: "localhost".to_string(),
                port: 8080
            }
        );
    }

    #[test]
    fn test_optional_composite_with_absent_members_is_null() {
        let mut registry = Registry::new();
        let definition = registry
            .register_composite(CompositeDefinition::for_type::<Endpoint>(
                Signature::new("Endpoint")
                    .param(ParamSpec::new("host").typed(TypeExpr::string()))
                    .param(ParamSpec::new("port").typed(TypeExpr::int())),
            ))
            .unwrap();
        let mut shorts = ShortNames::new();
        let expansion = expand(&registry, &definition, &param("proxy", true), &mut shorts);
        assert!(expansion.primitives.iter().all(|p| !p.is_positional()));

        let mut values: ParsedValues = [
            ("proxy_host".to_string(), Value::Null),
            ("proxy_port".to_string(), Value::Null),
        ]
        .into_iter()
        .collect();
        expansion.callback.reassemble(&mut values).unwrap();
        assert_eq!(values.get("proxy"), Some(&Value::Null));
    }

    #[test]
    fn test_packed_mode() {
        let mut registry = Registry::new();
        let definition = registry
            .register_composite(
                CompositeDefinition::for_type::<Endpoint>(endpoint_signature())
                    .packed(true)
                    .with_options(|o| {
                        o.validation("port", |group: &GroupValues| {
                            if group["port"].as_i64().unwrap_or(0) > 0 {
                                Ok(())
                            } else {
                                Err(ValidationError::new("port must be positive"))
                            }
                        })
                    }),
            )
            .unwrap();
        let mut shorts = ShortNames::new();
        let expansion = expand(&registry, &definition, &param("server", false), &mut shorts);
        assert_eq!(expansion.primitives.len(), 1);
        match &expansion.primitives[0] {
            CliPrimitive::Option(option) => {
                assert_eq!(option.value.arity(), 2);
                assert_eq!(option.default, Some(json!([null, 80])));
                assert_eq!(option.short, Some('s'));
            }
            other => panic!("expected an option, got {other:?}"),
        }

        let mut values: ParsedValues = [("server".to_string(), json!(["example.org", 443]))]
            .into_iter()
            .collect();
        expansion.callback.reassemble(&mut values).unwrap();
        assert_eq!(values.get("server"), Some(&json!({"host": "example.org", "port": 443})));

        let mut values: ParsedValues = [("server".to_string(), json!(["example.org", 0]))]
            .into_iter()
            .collect();
        let err = expansion.callback.reassemble(&mut values).unwrap_err();
        assert_eq!(err.to_string(), "port must be positive");
    }

    #[test]
    fn test_optional_packed_composite_needs_a_supplied_option() {
        let mut registry = Registry::new();
        let definition = registry
            .register_composite(
                CompositeDefinition::for_type::<Endpoint>(endpoint_signature()).packed(true),
            )
            .unwrap();
        let mut shorts = ShortNames::new();
        let expansion = expand(&registry, &definition, &param("proxy", true), &mut shorts);

        let mut values: ParsedValues = [("proxy".to_string(), json!([null, 80]))]
            .into_iter()
            .collect();
        expansion.callback.reassemble(&mut values).unwrap();
        assert_eq!(values.get("proxy"), Some(&Value::Null));

        let mut values: ParsedValues = [("proxy".to_string(), json!(["example.org", 80]))]
            .into_iter()
            .collect();
        values.mark_supplied("proxy");
        expansion.callback.reassemble(&mut values).unwrap();
        assert_eq!(values.get("proxy"), Some(&json!({"host": "example.org", "port": 80})));
    }

    #[test]
    fn test_constructor_failure_is_reported() {
        let mut registry = Registry::new();
        let definition = registry
            .register_composite(CompositeDefinition::for_type::<Endpoint>(endpoint_signature()))
            .unwrap();
        let mut shorts = ShortNames::new();
        let expansion = expand(&registry, &definition, &param("server", false), &mut shorts);
        let mut values: ParsedValues = [
            ("server_host".to_string(), json!(5)),
            ("server_port".to_string(), json!(80)),
        ]
        .into_iter()
        .collect();
        let err = expansion.callback.reassemble(&mut values).unwrap_err();
        assert!(matches!(err, InvocationError::Construction { .. }));
    }
}
