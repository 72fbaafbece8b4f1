//! Parsing and dispatch of command lines
//!
//! Every invocation runs the same stages per command level: clap matching,
//! raw extraction, the post-parse pipeline, then the callback. A group's
//! callback runs before its subcommand is dispatched.

use crate::command::{Command, GroupState, EXTRA_ARGS_ID};
use crate::error::InvocationError;
use crate::parsed::ParsedValues;
use clap::error::ErrorKind;
use clap::ArgMatches;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::ffi::OsString;
use tracing::debug;

/// The parsed values of one command level and its subcommand
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub command: String,
    pub values: ParsedValues,
    /// Extra positional arguments and unknown options, in command-line order
    pub extra_args: Vec<String>,
    pub subcommand: Option<Box<Invocation>>,
}

impl Invocation {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, InvocationError> {
        self.values.get_as(key)
    }

    /// The innermost invocation
    pub fn leaf(&self) -> &Invocation {
        match &self.subcommand {
            Some(subcommand) => subcommand.leaf(),
            None => self,
        }
    }
}

impl Command {
    /// Parse `argv` (including the program name) and run the command
    ///
    /// # Returns
    /// The invocation tree, after every pipeline and callback succeeded
    pub fn try_invoke_from<I, T>(&self, argv: I) -> Result<Invocation, InvocationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.to_clap().try_get_matches_from(argv)?;
        self.dispatch(&matches, true)
    }

    /// Like [`Command::try_invoke_from`] without a program name
    pub fn try_invoke<I, T>(&self, args: I) -> Result<Invocation, InvocationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv = std::iter::once(OsString::from(self.name()))
            .chain(args.into_iter().map(Into::into));
        self.try_invoke_from(argv)
    }

    /// Extract values without running pipelines or callbacks
    ///
    /// Usage and conversion errors are still reported.
    pub fn parse_resilient<I, T>(&self, argv: I) -> Result<Invocation, InvocationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.to_clap().try_get_matches_from(argv)?;
        self.dispatch(&matches, false)
    }

    /// Run with `argv`, printing errors the way clap does
    ///
    /// # Returns
    /// The process exit code: 0 on success or help, 2 for usage, conversion
    /// and validation errors, 1 for callback failures
    pub fn run_from<I, T>(&self, argv: I) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match self.try_invoke_from(argv) {
            Ok(_) => 0,
            Err(InvocationError::Usage(err)) => {
                let _ = err.print();
                err.exit_code()
            }
            Err(err) if err.is_usage_error() => {
                let err = self.to_clap().error(ErrorKind::ValueValidation, err.to_string());
                let _ = err.print();
                err.exit_code()
            }
            Err(err) => {
                debug!("Command '{}' failed: {err:?}", self.name());
                eprintln!("Error: {err:#}");
                err.exit_code()
            }
        }
    }

    /// Run with the process arguments and exit
    pub fn run(&self) -> ! {
        std::process::exit(self.run_from(std::env::args_os()))
    }

    fn dispatch(&self, matches: &ArgMatches, run: bool) -> Result<Invocation, InvocationError> {
        let mut values = ParsedValues::extract(self.primitives(), matches)?;
        let extra_args: Vec<String> = matches
            .try_get_many::<String>(EXTRA_ARGS_ID)
            .ok()
            .flatten()
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        if run {
            self.pipeline().run(&mut values)?;
        }
        let mut invocation = Invocation {
            command: self.name().to_string(),
            values,
            extra_args,
            subcommand: None,
        };
        if run {
            if let Some(callback) = self.callback() {
                debug!("Running callback of '{}'", self.name());
                callback(&invocation).map_err(InvocationError::Callback)?;
            }
        }

        if let Some(group) = self.group_state() {
            invocation.subcommand = self.dispatch_subcommand(group, matches, run)?.map(Box::new);
        }
        Ok(invocation)
    }

    fn dispatch_subcommand(
        &self,
        group: &GroupState,
        matches: &ArgMatches,
        run: bool,
    ) -> Result<Option<Invocation>, InvocationError> {
        match matches.subcommand() {
            Some((name, sub_matches)) => {
                if let Some(command) = group.subcommands.get(name) {
                    return command.dispatch(sub_matches, run).map(Some);
                }
                // Only external subcommands get here: hand the tokens to the
                // default command
                let default = self.default_command(group)?;
                debug!("Passing '{name}' to default command '{}'", default.name());
                let rest = sub_matches
                    .get_many::<OsString>("")
                    .into_iter()
                    .flatten()
                    .cloned();
                let argv = [OsString::from(default.name()), OsString::from(name)]
                    .into_iter()
                    .chain(rest);
                let default_matches = default.to_clap().try_get_matches_from(argv)?;
                default.dispatch(&default_matches, run).map(Some)
            }
            None if group.options.default_if_no_args => {
                let default = self.default_command(group)?;
                let default_matches = default.to_clap().try_get_matches_from([default.name()])?;
                default.dispatch(&default_matches, run).map(Some)
            }
            None => Ok(None),
        }
    }

    fn default_command<'g>(&self, group: &'g GroupState) -> Result<&'g Command, InvocationError> {
        group
            .options
            .default_command
            .as_deref()
            .and_then(|name| group.subcommands.get(name))
            .ok_or_else(|| {
                InvocationError::Usage(self.to_clap().error(
                    ErrorKind::InvalidSubcommand,
                    format!("'{}' has no usable default command", self.name()),
                ))
            })
    }
}
