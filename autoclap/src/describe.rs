//! Structured description of a built command
//!
//! The description lists exactly the primitives that were assembled, which
//! makes it the easiest way to check what a signature turned into.

use crate::command::Command;
use crate::primitive::CliPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of a command or group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub options: Vec<OptionDescription>,
    pub arguments: Vec<ArgumentDescription>,
    pub accepts_extra_args: bool,
    pub ignores_unknown_options: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<CommandDescription>,
}

/// The two spellings of a flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDescription {
    pub positive: String,
    pub negative: String,
    pub inverted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDescription {
    pub key: String,
    pub long: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<FlagDescription>,
    pub type_name: String,
    pub metavars: Vec<String>,
    pub arity: usize,
    pub multiple: bool,
    pub required: bool,
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDescription {
    pub key: String,
    pub name: String,
    pub type_name: String,
    pub arity: usize,
    /// Consumes every remaining token
    pub rest: bool,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl CommandDescription {
    pub fn option(&self, key: &str) -> Option<&OptionDescription> {
        self.options.iter().find(|option| option.key == key)
    }

    pub fn argument(&self, key: &str) -> Option<&ArgumentDescription> {
        self.arguments.iter().find(|argument| argument.key == key)
    }

    pub fn subcommand(&self, name: &str) -> Option<&CommandDescription> {
        self.subcommands.iter().find(|command| command.name == name)
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Describe a command and all of its subcommands
pub fn describe(command: &Command) -> CommandDescription {
    let mut options = Vec::new();
    let mut arguments = Vec::new();
    for primitive in command.primitives() {
        match primitive {
            CliPrimitive::Option(option) => options.push(OptionDescription {
                key: option.key.clone(),
                long: option.long.clone(),
                short: option.short,
                flag: option.flag.as_ref().map(|flag| FlagDescription {
                    positive: flag.positive.clone(),
                    negative: flag.negative.clone(),
                    inverted: flag.inverted,
                }),
                type_name: option.value.type_name(),
                metavars: option.value.metavars(),
                arity: option.value.arity(),
                multiple: option.multiple,
                required: option.required,
                hidden: option.hidden,
                default: option.default.clone(),
                choices: option.value.choices(),
                help: option.help.clone(),
            }),
            CliPrimitive::Argument(argument) => arguments.push(ArgumentDescription {
                key: argument.key.clone(),
                name: argument.name.clone(),
                type_name: argument.value.type_name(),
                arity: argument.value.arity(),
                rest: argument.rest,
                required: argument.required,
                default: argument.default.clone(),
                help: argument.help.clone(),
            }),
        }
    }

    CommandDescription {
        name: command.name().to_string(),
        help: command.help().map(str::to_string),
        version: command.version().map(str::to_string),
        options,
        arguments,
        accepts_extra_args: command.accepts_extra_args(),
        ignores_unknown_options: command.ignores_unknown_options(),
        subcommands: command.subcommands().map(describe).collect(),
    }
}
