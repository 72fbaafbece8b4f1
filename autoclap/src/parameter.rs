//! Parameter descriptors and their rendering as CLI primitives
//!
//! [`ParameterBuilder`] is shared by commands, groups and composites: it turns
//! a [`ParamSpec`] into a [`ParameterDescriptor`] and renders descriptors as
//! options or positional arguments.

use crate::conversion::SharedConverter;
use crate::docs::DocString;
use crate::error::BuildError;
use crate::options::CommonOptions;
use crate::primitive::{ArgumentSpec, CliPrimitive, FlagSpec, OptionSpec, ValueSpec};
use crate::registry::Registry;
use crate::short_names::ShortNames;
use crate::signature::ParamSpec;
use crate::types::{ResolvedType, TypeExpr, TypeKey, TypeResolver};
use crate::validation::{for_parameter, ValidationFn};
use serde_json::Value;
use tracing::debug;

/// Everything known about one parameter after type resolution
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    /// The raw annotation, if one was declared
    pub annotation: Option<TypeExpr>,
    /// Key for conversion, validation and composite lookup
    pub match_type: TypeKey,
    pub resolved: ResolvedType,
    /// Whether the parameter may be absent from the command line
    pub is_optional: bool,
    pub default: Option<Value>,
    /// Tokens per occurrence
    pub arity: usize,
    pub allows_multiple: bool,
    pub is_flag: bool,
    /// One converter per value slot
    pub converters: Vec<SharedConverter>,
    pub help: Option<String>,
}

impl ParameterDescriptor {
    pub fn value_spec(&self) -> ValueSpec {
        ValueSpec::new(self.converters.clone())
    }

    pub fn type_name(&self) -> String {
        self.resolved.display_name()
    }
}

/// Per-call adjustments when rendering a descriptor
#[derive(Debug, Clone, Default)]
pub struct RenderContext<'p> {
    /// Prefix for the key and long name of composite members
    pub prefix: Option<&'p str>,
    /// Render as an option even when the parameter is required
    pub force_options: bool,
    /// Never mark the primitive required
    pub force_not_required: bool,
    pub hidden: bool,
    pub default_override: Option<Value>,
}

/// Builds descriptors and primitives with one set of common options
pub struct ParameterBuilder<'a> {
    registry: &'a Registry,
    options: &'a CommonOptions,
    doc: DocString,
}

impl<'a> ParameterBuilder<'a> {
    pub fn new(registry: &'a Registry, options: &'a CommonOptions) -> Self {
        Self {
            registry,
            options,
            doc: DocString::default(),
        }
    }

    /// Use parameter help from a parsed doc string
    pub fn with_doc(mut self, doc: DocString) -> Self {
        self.doc = doc;
        self
    }

    pub fn options(&self) -> &CommonOptions {
        self.options
    }

    /// Build the descriptor of a parameter
    ///
    /// # Arguments
    /// * `spec` - The parameter as declared
    ///
    /// # Returns
    /// The descriptor with its converters chosen: an explicit converter from
    /// the options applies to every value slot, otherwise each slot gets the
    /// registry's conversion for its type
    pub fn build(&self, spec: &ParamSpec) -> Result<ParameterDescriptor, BuildError> {
        let resolver = TypeResolver::new(self.registry);
        let resolved =
            resolver.resolve(&spec.name, spec.annotation.as_ref(), spec.default.as_ref())?;

        let explicitly_required = self.options.required.contains(&spec.name);
        let is_optional = !explicitly_required && (spec.has_default() || resolved.is_optional);

        let converters = match self.options.types.get(&spec.name) {
            Some(explicit) => vec![explicit.clone(); resolved.arity],
            None => match &resolved.element {
                ResolvedType::Tuple(slots) => slots
                    .iter()
                    .map(|slot| self.registry.get_conversion(&slot.key(), slot))
                    .collect(),
                element => vec![self.registry.get_conversion(&resolved.match_type, element)],
            },
        };

        let help = self
            .options
            .param_help
            .get(&spec.name)
            .cloned()
            .or_else(|| spec.help.clone())
            .or_else(|| self.doc.parameter(&spec.name).map(str::to_string));

        debug!(
            "Built parameter '{}' (optional: {}, converters: {:?})",
            spec.name,
            is_optional,
            converters.iter().map(|c| c.name()).collect::<Vec<_>>()
        );

        Ok(ParameterDescriptor {
            name: spec.name.clone(),
            annotation: spec.annotation.clone(),
            match_type: resolved.match_type,
            resolved: resolved.resolved,
            is_optional,
            default: spec.default.clone(),
            arity: resolved.arity,
            allows_multiple: resolved.allows_multiple,
            is_flag: resolved.is_flag,
            converters,
            help,
        })
    }

    /// Render a descriptor as an option or a positional argument
    ///
    /// Optional parameters become options, as do all parameters when
    /// positionals are rendered as options. Everything else is a required
    /// positional; repeatable positionals consume the remaining tokens.
    pub fn render(
        &self,
        descriptor: &ParameterDescriptor,
        ctx: &RenderContext<'_>,
        shorts: &mut ShortNames,
    ) -> Result<CliPrimitive, BuildError> {
        let name = &descriptor.name;
        let key = match ctx.prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.clone(),
        };
        let default = ctx.default_override.clone().or_else(|| descriptor.default.clone());
        let optional =
            descriptor.is_optional || ctx.force_not_required || ctx.default_override.is_some();
        let long = self.options.long_name(ctx.prefix, name);

        if !(optional || ctx.force_options || self.options.positionals_as_options) {
            return Ok(CliPrimitive::Argument(ArgumentSpec {
                key,
                name: long,
                value: descriptor.value_spec(),
                rest: descriptor.allows_multiple,
                required: true,
                default,
                help: descriptor.help.clone(),
            }));
        }

        let short = shorts.assign(
            name,
            self.options.short_names.get(name).copied(),
            self.options.infer_short_names,
        )?;
        let flag = (descriptor.is_flag && !descriptor.allows_multiple)
            .then(|| FlagSpec::for_long_name(&long));
        Ok(CliPrimitive::Option(OptionSpec {
            key,
            required: !optional && flag.is_none(),
            long,
            short,
            flag,
            value: descriptor.value_spec(),
            multiple: descriptor.allows_multiple,
            default,
            hidden: ctx.hidden || self.options.hidden.contains(name),
            help: descriptor.help.clone(),
            show_default: self.options.show_defaults,
        }))
    }

    /// Regular parameters in processing order
    ///
    /// Parameters named in `option_order` come first, in that order, followed
    /// by the rest in declaration order.
    pub fn order<'s>(&self, params: Vec<&'s ParamSpec>) -> Result<Vec<&'s ParamSpec>, BuildError> {
        let mut ordered = Vec::with_capacity(params.len());
        for name in &self.options.option_order {
            let spec = params.iter().find(|p| &p.name == name).ok_or_else(|| {
                BuildError::signature(format!("option_order names unknown parameter '{name}'"))
            })?;
            ordered.push(*spec);
        }
        ordered.extend(
            params
                .into_iter()
                .filter(|p| !self.options.option_order.contains(&p.name)),
        );
        Ok(ordered)
    }

    /// Registered type validations of a descriptor, bound to `key`
    pub fn type_validations(
        &self,
        descriptor: &ParameterDescriptor,
        key: &str,
    ) -> Vec<ValidationFn> {
        self.registry
            .get_validations(&descriptor.match_type)
            .iter()
            .map(|validation| for_parameter(key, validation.clone(), descriptor.allows_multiple))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::IntegerConverter;
    use crate::error::ValidationError;
    use serde_json::json;
    use std::sync::Arc;

    fn build(options: &CommonOptions, spec: ParamSpec) -> ParameterDescriptor {
        let registry = Registry::new();
        ParameterBuilder::new(&registry, options).build(&spec).unwrap()
    }

    fn render(options: &CommonOptions, spec: ParamSpec, shorts: &mut ShortNames) -> CliPrimitive {
        let registry = Registry::new();
        let builder = ParameterBuilder::new(&registry, options);
        let descriptor = builder.build(&spec).unwrap();
        builder.render(&descriptor, &RenderContext::default(), shorts).unwrap()
    }

    #[test]
    fn test_required_parameter_is_positional() {
        let mut shorts = ShortNames::new();
        let primitive = render(
            &CommonOptions::default(),
            ParamSpec::new("count").typed(TypeExpr::int()),
            &mut shorts,
        );
        match primitive {
            CliPrimitive::Argument(argument) => {
                assert!(argument.required);
                assert!(!argument.rest);
            }
            other => panic!("expected a positional, got {other:?}"),
        }
        assert_eq!(shorts.used().count(), 0);
    }

    #[test]
    fn test_optional_parameter_is_option() {
        let mut shorts = ShortNames::new();
        let primitive = render(
            &CommonOptions::default(),
            ParamSpec::new("max_size").default(10),
            &mut shorts,
        );
        match primitive {
            CliPrimitive::Option(option) => {
                assert_eq!(option.long, "max-size");
                assert_eq!(option.key, "max_size");
                assert_eq!(option.short, Some('m'));
                assert!(!option.required);
                assert_eq!(option.default, Some(json!(10)));
            }
            other => panic!("expected an option, got {other:?}"),
        }
    }

    #[test]
    fn test_positionals_as_options() {
        let options = CommonOptions::default().positionals_as_options(true);
        let mut shorts = ShortNames::new();
        match render(&options, ParamSpec::new("name"), &mut shorts) {
            CliPrimitive::Option(option) => assert!(option.required),
            other => panic!("expected an option, got {other:?}"),
        }
    }

    #[test]
    fn test_explicitly_required_overrides_default() {
        let options = CommonOptions::default().required("level");
        let descriptor = build(&options, ParamSpec::new("level").default(3));
        assert!(!descriptor.is_optional);
    }

    #[test]
    fn test_flag_rendering() {
        let mut shorts = ShortNames::new();
        let spec = ParamSpec::new("no_cache").default(false);
        match render(&CommonOptions::default(), spec, &mut shorts) {
            CliPrimitive::Option(option) => {
                let flag = option.flag.unwrap();
                assert_eq!(flag.positive, "cache");
                assert_eq!(flag.negative, "no-cache");
                assert!(flag.inverted);
            }
            other => panic!("expected a flag, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_converter_applies_to_every_slot() {
        let options = CommonOptions::default().converter("pair", Arc::new(IntegerConverter));
        let descriptor = build(
            &options,
            ParamSpec::new("pair").typed(TypeExpr::tuple([TypeExpr::string(), TypeExpr::string()])),
        );
        assert_eq!(descriptor.converters.len(), 2);
        assert!(descriptor.converters.iter().all(|c| c.name() == "integer"));
    }

    #[test]
    fn test_help_precedence() {
        let options = CommonOptions::default().param_help("a", "from options");
        let registry = Registry::new();
        let builder = ParameterBuilder::new(&registry, &options)
            .with_doc(DocString::parse("Args:\n    a: from doc\n    b: from doc\n"));
        let a = builder.build(&ParamSpec::new("a").help("from spec")).unwrap();
        let b = builder.build(&ParamSpec::new("b")).unwrap();
        let c = builder.build(&ParamSpec::new("c").help("from spec")).unwrap();
        assert_eq!(a.help.as_deref(), Some("from options"));
        assert_eq!(b.help.as_deref(), Some("from doc"));
        assert_eq!(c.help.as_deref(), Some("from spec"));
    }

    #[test]
    fn test_option_order() {
        let options = CommonOptions::default().option_order(["c", "a"]);
        let registry = Registry::new();
        let builder = ParameterBuilder::new(&registry, &options);
        let specs = [ParamSpec::new("a"), ParamSpec::new("b"), ParamSpec::new("c")];
        let ordered: Vec<&str> = builder
            .order(specs.iter().collect())
            .unwrap()
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(ordered, vec!["c", "a", "b"]);

        let options = CommonOptions::default().option_order(["missing"]);
        let builder = ParameterBuilder::new(&registry, &options);
        assert!(builder.order(specs.iter().collect()).is_err());
    }

    #[test]
    fn test_type_validations_are_bound_to_key() {
        let mut registry = Registry::new();
        registry.validation(TypeKey::new("int"), |name, _| {
            Err(ValidationError::new(format!("{name} rejected")))
        });
        let options = CommonOptions::default();
        let builder = ParameterBuilder::new(&registry, &options);
        let descriptor = builder.build(&ParamSpec::new("n").typed(TypeExpr::int())).unwrap();
        let validations = builder.type_validations(&descriptor, "outer_n");
        assert_eq!(validations.len(), 1);

        let mut values = crate::validation::GroupValues::new();
        values.insert("outer_n".to_string(), json!(1));
        assert_eq!(validations[0](&values).unwrap_err().message(), "outer_n rejected");
    }
}
