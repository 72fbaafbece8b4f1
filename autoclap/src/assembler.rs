//! Turns a signature into the primitives and pipeline of one command

use crate::composite::{CompositeDefinition, ExpansionContext};
use crate::error::BuildError;
use crate::options::CommandOptions;
use crate::parameter::{ParameterBuilder, RenderContext};
use crate::pipeline::PostParsePipeline;
use crate::primitive::CliPrimitive;
use crate::registry::Registry;
use crate::short_names::ShortNames;
use crate::signature::{ParamKind, Signature};
use crate::validation::{ConditionalFn, RuleTable, ValidationFn};
use std::collections::HashSet;
use tracing::debug;

/// Long names clap reserves for the built-in actions
const RESERVED_LONGS: [&str; 2] = ["help", "version"];

/// Everything needed to render and run one command
#[derive(Debug)]
pub struct Assembled {
    pub name: String,
    pub help: Option<String>,
    pub primitives: Vec<CliPrimitive>,
    pub pipeline: PostParsePipeline,
    pub accepts_extra_args: bool,
    pub ignores_unknown_options: bool,
    /// Short names in use after the build, inherited by subcommands
    pub short_names: ShortNames,
}

/// Builds the parameters of a command or group
pub struct CommandAssembler<'a> {
    registry: &'a Registry,
    options: &'a CommandOptions,
    shorts: ShortNames,
}

impl<'a> CommandAssembler<'a> {
    pub fn new(registry: &'a Registry, options: &'a CommandOptions) -> Self {
        Self {
            registry,
            options,
            shorts: ShortNames::new(),
        }
    }

    /// Start from short names already used by a parent group
    pub fn with_short_names(mut self, shorts: ShortNames) -> Self {
        self.shorts = shorts;
        self
    }

    pub fn assemble(mut self, signature: &Signature) -> Result<Assembled, BuildError> {
        let common = &self.options.common;
        let name = self
            .options
            .name
            .clone()
            .unwrap_or_else(|| command_name(&signature.name));
        let doc = signature.parsed_doc();
        let help = self
            .options
            .command_help
            .clone()
            .or_else(|| doc.description.clone());
        let builder = ParameterBuilder::new(self.registry, common).with_doc(doc);

        let mut primitives = Vec::new();
        let mut pipeline = PostParsePipeline::new();
        let mut conditionals: RuleTable<ConditionalFn> = RuleTable::new();
        let mut validations: RuleTable<ValidationFn> = RuleTable::new();

        for spec in builder.order(signature.regular().collect())? {
            let spec = match self.options.default_values.get(&spec.name) {
                Some(default) => spec.clone().default(default.clone()),
                None => spec.clone(),
            };
            let descriptor = builder.build(&spec)?;
            let composite = self
                .options
                .composite_types
                .get(&descriptor.name)
                .cloned()
                .or_else(|| self.registry.composite(&descriptor.match_type));

            match composite {
                Some(_) if descriptor.allows_multiple => {
                    return Err(BuildError::signature(format!(
                        "Parameter '{}' is a collection of composite type {}",
                        descriptor.name, descriptor.match_type
                    )));
                }
                Some(definition) => {
                    debug!(
                        "Expanding composite parameter '{}' of type {}",
                        descriptor.name,
                        definition.match_type()
                    );
                    let expansion = CompositeDefinition::expand(
                        &definition,
                        self.registry,
                        &descriptor,
                        ExpansionContext {
                            parent: common,
                            shorts: &mut self.shorts,
                            add_prefix: self.options.add_composite_prefixes,
                            hidden: common.hidden.contains(&descriptor.name),
                            force_options: common.positionals_as_options,
                            default_values: &self.options.default_values,
                        },
                    )?;
                    primitives.extend(expansion.primitives);
                    conditionals.merge(&expansion.conditionals);
                    validations.merge(&expansion.validations);
                    pipeline.add_composite(expansion.callback);
                }
                None => {
                    let primitive =
                        builder.render(&descriptor, &RenderContext::default(), &mut self.shorts)?;
                    let type_validations = builder.type_validations(&descriptor, primitive.key());
                    if !type_validations.is_empty() {
                        validations.extend_group(primitive.key(), type_validations);
                    }
                    primitives.push(primitive);
                }
            }
        }

        conditionals.merge(&common.conditionals);
        validations.merge(&common.validations);
        pipeline.add_conditionals(&conditionals);
        pipeline.add_validations(&validations);

        let accepts_extra_args = signature.has_kind(ParamKind::VarPositional);
        let ignores_unknown_options = signature.has_kind(ParamKind::VarKeyword);
        check_names(&primitives)?;
        check_positionals(&primitives, accepts_extra_args || ignores_unknown_options)?;

        debug!(
            "Assembled command '{}' with {} primitives",
            name,
            primitives.len()
        );
        Ok(Assembled {
            name,
            help,
            primitives,
            pipeline,
            accepts_extra_args,
            ignores_unknown_options,
            short_names: self.shorts,
        })
    }
}

/// Command name derived from a callable name
pub fn command_name(callable: &str) -> String {
    callable.to_lowercase().replace('_', "-")
}

fn check_names(primitives: &[CliPrimitive]) -> Result<(), BuildError> {
    let mut keys = HashSet::new();
    let mut longs: HashSet<&str> = RESERVED_LONGS.into_iter().collect();
    for primitive in primitives {
        if !keys.insert(primitive.key()) {
            return Err(BuildError::parameter_collision(format!(
                "Parameter '{}' is defined more than once",
                primitive.key()
            )));
        }
        let CliPrimitive::Option(option) = primitive else {
            continue;
        };
        let spellings = match &option.flag {
            Some(flag) => vec![flag.positive.as_str(), flag.negative.as_str()],
            None => vec![option.long.as_str()],
        };
        for long in spellings {
            if !longs.insert(long) {
                return Err(BuildError::parameter_collision(format!(
                    "Option '--{long}' of parameter '{}' is already in use",
                    option.key
                )));
            }
        }
    }
    Ok(())
}

fn check_positionals(primitives: &[CliPrimitive], collects_extra: bool) -> Result<(), BuildError> {
    let positionals: Vec<_> = primitives
        .iter()
        .filter_map(|primitive| match primitive {
            CliPrimitive::Argument(argument) => Some(argument),
            CliPrimitive::Option(_) => None,
        })
        .collect();
    let Some(rest) = positionals.iter().position(|argument| argument.rest) else {
        return Ok(());
    };
    if rest + 1 != positionals.len() {
        return Err(BuildError::signature(format!(
            "Repeatable positional '{}' must be the last positional argument",
            positionals[rest].key
        )));
    }
    if collects_extra {
        return Err(BuildError::signature(format!(
            "Repeatable positional '{}' cannot be combined with extra arguments",
            positionals[rest].key
        )));
    }
    Ok(())
}
