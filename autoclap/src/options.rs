//! Build options for commands, groups and composites

use crate::composite::CompositeDefinition;
use crate::conversion::SharedConverter;
use crate::error::ValidationError;
use crate::settings::Settings;
use crate::validation::{ConditionalFn, GroupValues, ParamGroup, RuleTable, ValidationFn};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Options shared by commands, groups and composites
#[derive(Clone, Debug)]
pub struct CommonOptions {
    /// Keep underscores in long names instead of converting them to hyphens
    pub keep_underscores: bool,
    /// Explicit short names; `None` disables the short name of a parameter
    pub short_names: HashMap<String, Option<char>>,
    /// Infer short names for parameters without an explicit one
    pub infer_short_names: bool,
    /// Parameters processed first, in this order
    pub option_order: Vec<String>,
    /// Explicit converters per parameter
    pub types: HashMap<String, SharedConverter>,
    /// Render positional parameters as required options
    pub positionals_as_options: bool,
    pub conditionals: RuleTable<ConditionalFn>,
    pub validations: RuleTable<ValidationFn>,
    /// Parameters that are required even when they have a default
    pub required: HashSet<String>,
    /// Parameters hidden from help
    pub hidden: HashSet<String>,
    pub show_defaults: bool,
    /// Help text per parameter, overriding doc strings
    pub param_help: HashMap<String, String>,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CommonOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            keep_underscores: settings.keep_underscores,
            short_names: HashMap::new(),
            infer_short_names: settings.infer_short_names,
            option_order: Vec::new(),
            types: HashMap::new(),
            positionals_as_options: false,
            conditionals: RuleTable::new(),
            validations: RuleTable::new(),
            required: HashSet::new(),
            hidden: HashSet::new(),
            show_defaults: settings.show_defaults,
            param_help: HashMap::new(),
        }
    }

    pub fn keep_underscores(mut self, keep: bool) -> Self {
        self.keep_underscores = keep;
        self
    }

    pub fn short_name(mut self, param: impl Into<String>, short: char) -> Self {
        self.short_names.insert(param.into(), Some(short));
        self
    }

    pub fn no_short_name(mut self, param: impl Into<String>) -> Self {
        self.short_names.insert(param.into(), None);
        self
    }

    pub fn infer_short_names(mut self, infer: bool) -> Self {
        self.infer_short_names = infer;
        self
    }

    pub fn option_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.option_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn converter(mut self, param: impl Into<String>, converter: SharedConverter) -> Self {
        self.types.insert(param.into(), converter);
        self
    }

    pub fn positionals_as_options(mut self, enabled: bool) -> Self {
        self.positionals_as_options = enabled;
        self
    }

    pub fn conditional<F>(mut self, group: impl Into<ParamGroup>, f: F) -> Self
    where
        F: Fn(&GroupValues) -> Result<Option<GroupValues>, ValidationError> + Send + Sync + 'static,
    {
        self.conditionals.add(group, Arc::new(f) as ConditionalFn);
        self
    }

    pub fn validation<F>(mut self, group: impl Into<ParamGroup>, f: F) -> Self
    where
        F: Fn(&GroupValues) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validations.add(group, Arc::new(f) as ValidationFn);
        self
    }

    pub fn validation_fn(mut self, group: impl Into<ParamGroup>, f: ValidationFn) -> Self {
        self.validations.add(group, f);
        self
    }

    pub fn required(mut self, param: impl Into<String>) -> Self {
        self.required.insert(param.into());
        self
    }

    pub fn hidden(mut self, param: impl Into<String>) -> Self {
        self.hidden.insert(param.into());
        self
    }

    pub fn show_defaults(mut self, show: bool) -> Self {
        self.show_defaults = show;
        self
    }

    pub fn param_help(mut self, param: impl Into<String>, help: impl Into<String>) -> Self {
        self.param_help.insert(param.into(), help.into());
        self
    }

    /// Long name for `name`, optionally prefixed
    pub fn long_name(&self, prefix: Option<&str>, name: &str) -> String {
        let long = match prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.to_string(),
        };
        if self.keep_underscores {
            long
        } else {
            long.replace('_', "-")
        }
    }
}

/// Options for commands and groups
#[derive(Clone, Debug)]
pub struct CommandOptions {
    pub common: CommonOptions,
    /// Command name; derived from the signature name when unset
    pub name: Option<String>,
    /// Composite to use per parameter, overriding type lookup
    pub composite_types: HashMap<String, Arc<CompositeDefinition>>,
    /// Prefix composite member keys and long names with the parameter name
    pub add_composite_prefixes: bool,
    /// Command description, overriding the signature doc string
    pub command_help: Option<String>,
    /// Defaults overriding the signature, keyed by parameter name
    ///
    /// Composite members are keyed as `{param}_{member}`, or by member name
    /// when composite prefixes are disabled.
    pub default_values: HashMap<String, Value>,
    pub version: Option<String>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            common: CommonOptions::from_settings(settings),
            name: None,
            composite_types: HashMap::new(),
            add_composite_prefixes: settings.add_composite_prefixes,
            command_help: None,
            default_values: HashMap::new(),
            version: None,
        }
    }

    pub fn common(mut self, common: CommonOptions) -> Self {
        self.common = common;
        self
    }

    /// Apply a change to the common options
    pub fn with_common(mut self, f: impl FnOnce(CommonOptions) -> CommonOptions) -> Self {
        self.common = f(self.common);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn composite_type(
        mut self,
        param: impl Into<String>,
        composite: Arc<CompositeDefinition>,
    ) -> Self {
        self.composite_types.insert(param.into(), composite);
        self
    }

    pub fn add_composite_prefixes(mut self, enabled: bool) -> Self {
        self.add_composite_prefixes = enabled;
        self
    }

    pub fn command_help(mut self, help: impl Into<String>) -> Self {
        self.command_help = Some(help.into());
        self
    }

    pub fn default_value(mut self, param: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_values.insert(param.into(), value.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Subcommand selection behaviour of a group
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupOptions {
    /// Select a subcommand by any unique prefix of its name
    pub match_prefix: bool,
    /// Subcommand receiving the tokens when the first one names no subcommand
    pub default_command: Option<String>,
    /// Run the default command when no subcommand is given
    pub default_if_no_args: bool,
    /// Run the group callback alone when no subcommand is given
    pub invoke_without_command: bool,
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_prefix(mut self, enabled: bool) -> Self {
        self.match_prefix = enabled;
        self
    }

    pub fn default_command(mut self, name: impl Into<String>) -> Self {
        self.default_command = Some(name.into());
        self
    }

    pub fn default_if_no_args(mut self, enabled: bool) -> Self {
        self.default_if_no_args = enabled;
        self
    }

    pub fn invoke_without_command(mut self, enabled: bool) -> Self {
        self.invoke_without_command = enabled;
        self
    }
}
