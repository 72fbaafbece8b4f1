//! Commands and command groups
//!
//! A [`Command`] owns the primitives and post-parse pipeline assembled from a
//! signature, an optional callback and, for groups, its subcommands. It is
//! rendered to a fresh [`clap::Command`] whenever a command line is parsed.
//!
//! # Architecture
//!
//! ```text
//! Signature ──► CommandAssembler ──► Command ──► clap::Command
//!                     │                 │
//!                     ▼                 ▼
//!            ParameterBuilder     PostParsePipeline
//!            CompositeDefinition  (conditionals, validations, composites)
//! ```

use crate::assembler::{Assembled, CommandAssembler};
use crate::error::BuildError;
use crate::invoke::Invocation;
use crate::options::{CommandOptions, GroupOptions};
use crate::pipeline::PostParsePipeline;
use crate::primitive::CliPrimitive;
use crate::registry::Registry;
use crate::short_names::ShortNames;
use crate::signature::Signature;
use clap::{Arg, ArgAction};
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Argument id collecting extra positional arguments and unknown options
pub const EXTRA_ARGS_ID: &str = "__extra_args";

/// Command callback, called after the post-parse pipeline succeeded
pub type Callback = Arc<dyn Fn(&Invocation) -> anyhow::Result<()> + Send + Sync>;

/// A built command or group
#[derive(Clone)]
pub struct Command {
    name: String,
    help: Option<String>,
    version: Option<String>,
    primitives: Vec<CliPrimitive>,
    pipeline: PostParsePipeline,
    accepts_extra_args: bool,
    ignores_unknown_options: bool,
    short_names: ShortNames,
    callback: Option<Callback>,
    group: Option<GroupState>,
}

#[derive(Clone, Debug)]
pub(crate) struct GroupState {
    pub(crate) options: GroupOptions,
    pub(crate) subcommands: IndexMap<String, Command>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("primitives", &self.primitives)
            .field("pipeline", &self.pipeline)
            .field("accepts_extra_args", &self.accepts_extra_args)
            .field("ignores_unknown_options", &self.ignores_unknown_options)
            .field("has_callback", &self.callback.is_some())
            .field("group", &self.group)
            .finish()
    }
}

impl Command {
    /// Build a leaf command from a signature
    pub fn command(
        registry: &Registry,
        signature: &Signature,
        options: &CommandOptions,
    ) -> Result<Self, BuildError> {
        let assembled = CommandAssembler::new(registry, options).assemble(signature)?;
        Ok(Self::from_assembled(assembled, options, None))
    }

    /// Build a group; subcommands are added with [`Command::add_command`]
    /// and [`Command::add_group`]
    pub fn group(
        registry: &Registry,
        signature: &Signature,
        options: &CommandOptions,
        group: GroupOptions,
    ) -> Result<Self, BuildError> {
        if group.default_if_no_args && group.default_command.is_none() {
            return Err(BuildError::signature(
                "default_if_no_args requires a default command",
            ));
        }
        let assembled = CommandAssembler::new(registry, options).assemble(signature)?;
        Ok(Self::from_assembled(
            assembled,
            options,
            Some(GroupState {
                options: group,
                subcommands: IndexMap::new(),
            }),
        ))
    }

    fn from_assembled(
        assembled: Assembled,
        options: &CommandOptions,
        group: Option<GroupState>,
    ) -> Self {
        Self {
            name: assembled.name,
            help: assembled.help,
            version: options.version.clone(),
            primitives: assembled.primitives,
            pipeline: assembled.pipeline,
            accepts_extra_args: assembled.accepts_extra_args,
            ignores_unknown_options: assembled.ignores_unknown_options,
            short_names: assembled.short_names,
            callback: None,
            group,
        }
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_callback(callback);
        self
    }

    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
    }

    /// Build a leaf command and add it to this group
    ///
    /// The subcommand starts with a copy of the group's used short names.
    pub fn add_command(
        &mut self,
        registry: &Registry,
        signature: &Signature,
        options: &CommandOptions,
    ) -> Result<&mut Command, BuildError> {
        let assembled = CommandAssembler::new(registry, options)
            .with_short_names(self.short_names.clone())
            .assemble(signature)?;
        self.insert_subcommand(Self::from_assembled(assembled, options, None))
    }

    /// Build a nested group and add it to this group
    pub fn add_group(
        &mut self,
        registry: &Registry,
        signature: &Signature,
        options: &CommandOptions,
        group: GroupOptions,
    ) -> Result<&mut Command, BuildError> {
        if group.default_if_no_args && group.default_command.is_none() {
            return Err(BuildError::signature(
                "default_if_no_args requires a default command",
            ));
        }
        let assembled = CommandAssembler::new(registry, options)
            .with_short_names(self.short_names.clone())
            .assemble(signature)?;
        self.insert_subcommand(Self::from_assembled(
            assembled,
            options,
            Some(GroupState {
                options: group,
                subcommands: IndexMap::new(),
            }),
        ))
    }

    fn insert_subcommand(&mut self, command: Command) -> Result<&mut Command, BuildError> {
        let parent = self.name.clone();
        let Some(group) = self.group.as_mut() else {
            return Err(BuildError::signature(format!(
                "Cannot add subcommand '{}' to '{parent}': it is not a group",
                command.name
            )));
        };
        match group.subcommands.entry(command.name.clone()) {
            Entry::Occupied(_) => Err(BuildError::parameter_collision(format!(
                "Group '{parent}' already has a subcommand named '{}'",
                command.name
            ))),
            Entry::Vacant(entry) => {
                debug!("Added subcommand '{}' to group '{parent}'", command.name);
                Ok(entry.insert(command))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn primitives(&self) -> &[CliPrimitive] {
        &self.primitives
    }

    pub fn pipeline(&self) -> &PostParsePipeline {
        &self.pipeline
    }

    pub fn accepts_extra_args(&self) -> bool {
        self.accepts_extra_args
    }

    pub fn ignores_unknown_options(&self) -> bool {
        self.ignores_unknown_options
    }

    pub fn short_names(&self) -> &ShortNames {
        &self.short_names
    }

    pub fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }

    pub fn is_group(&self) -> bool {
        self.group.is_some()
    }

    pub fn group_options(&self) -> Option<&GroupOptions> {
        self.group.as_ref().map(|group| &group.options)
    }

    pub fn subcommand(&self, name: &str) -> Option<&Command> {
        self.group.as_ref()?.subcommands.get(name)
    }

    pub fn subcommand_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.group.as_mut()?.subcommands.get_mut(name)
    }

    /// Subcommands in the order they were added
    pub fn subcommands(&self) -> impl Iterator<Item = &Command> {
        self.group
            .iter()
            .flat_map(|group| group.subcommands.values())
    }

    pub(crate) fn group_state(&self) -> Option<&GroupState> {
        self.group.as_ref()
    }

    /// Render as a clap command
    ///
    /// clap's help and version flags are replaced by long-only `--help` and
    /// `--version` so that every letter stays available for short names.
    pub fn to_clap(&self) -> clap::Command {
        let mut command = clap::Command::new(self.name.clone())
            .disable_help_flag(true)
            .disable_version_flag(true)
            .args_override_self(true)
            .arg(
                Arg::new("help")
                    .long("help")
                    .action(ArgAction::Help)
                    .help("Print help"),
            );
        if let Some(help) = &self.help {
            command = command.about(help.clone());
        }
        if let Some(version) = &self.version {
            command = command.version(version.clone()).arg(
                Arg::new("version")
                    .long("version")
                    .action(ArgAction::Version)
                    .help("Print version"),
            );
        }
        for primitive in &self.primitives {
            command = command.args(primitive.to_clap_args());
        }
        if self.accepts_extra_args || self.ignores_unknown_options {
            command = command.arg(
                Arg::new(EXTRA_ARGS_ID)
                    .num_args(0..)
                    .action(ArgAction::Append)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(self.ignores_unknown_options)
                    .value_parser(clap::value_parser!(String))
                    .hide(true),
            );
        }

        if let Some(group) = &self.group {
            command = command
                .disable_help_subcommand(true)
                .infer_subcommands(group.options.match_prefix)
                .allow_external_subcommands(group.options.default_command.is_some())
                .subcommand_required(
                    !(group.options.invoke_without_command || group.options.default_if_no_args),
                );
            for subcommand in group.subcommands.values() {
                command = command.subcommand(subcommand.to_clap());
            }
        }
        command
    }
}
