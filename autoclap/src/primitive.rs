//! CLI primitives and their clap rendering
//!
//! A [`CliPrimitive`] is the fully-decided form of one parameter (or one
//! composite member): an option or a positional argument with its names,
//! arity, converters and default. Primitives render to `clap::Arg`s and read
//! their values back from `clap::ArgMatches`.

use crate::conversion::SharedConverter;
use crate::error::{ConversionError, InvocationError};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};
use serde_json::Value;

/// Id suffix of the negation half of a flag pair
pub const NEGATION_SUFFIX: &str = "::negated";

/// Converters for the value slots of one occurrence
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub converters: Vec<SharedConverter>,
}

impl ValueSpec {
    pub fn new(converters: Vec<SharedConverter>) -> Self {
        Self { converters }
    }

    pub fn single(converter: SharedConverter) -> Self {
        Self::new(vec![converter])
    }

    /// Tokens consumed per occurrence
    pub fn arity(&self) -> usize {
        self.converters.len().max(1)
    }

    /// Convert the tokens of one occurrence
    pub fn convert_group(&self, tokens: &[&str]) -> Result<Value, ConversionError> {
        match (self.converters.as_slice(), tokens) {
            ([converter], [token]) => converter.convert(token),
            (converters, tokens) if converters.len() == tokens.len() => converters
                .iter()
                .zip(tokens)
                .map(|(converter, token)| converter.convert(token))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (converters, tokens) => Err(ConversionError::new(format!(
                "expected {} values, got {}",
                converters.len(),
                tokens.len()
            ))),
        }
    }

    /// Combine the values of repeated occurrences
    pub fn aggregate(&self, values: Vec<Value>) -> Result<Value, ConversionError> {
        match self.converters.as_slice() {
            [converter] => converter.aggregate(values),
            _ => Ok(Value::Array(values)),
        }
    }

    pub fn metavars(&self) -> Vec<String> {
        self.converters.iter().map(|c| c.metavar()).collect()
    }

    pub fn choices(&self) -> Option<Vec<String>> {
        match self.converters.as_slice() {
            [converter] => converter.choices(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        self.converters
            .iter()
            .map(|c| c.name().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The two spellings of a boolean flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    /// Enabled form, rendered first
    pub positive: String,
    /// Negation form
    pub negative: String,
    /// The parameter is true when the negation form is given
    pub inverted: bool,
}

impl FlagSpec {
    /// Flag spellings for a long name, honoring an existing negation prefix
    pub fn for_long_name(long: &str) -> Self {
        match long.strip_prefix("no-").or_else(|| long.strip_prefix("no_")) {
            Some(stripped) if !stripped.is_empty() => Self {
                positive: stripped.to_string(),
                negative: long.to_string(),
                inverted: true,
            },
            _ => Self {
                positive: long.to_string(),
                negative: format!("no-{long}"),
                inverted: false,
            },
        }
    }
}

/// A named option
#[derive(Debug, Clone)]
pub struct OptionSpec {
    /// Key of the parsed value
    pub key: String,
    pub long: String,
    pub short: Option<char>,
    pub flag: Option<FlagSpec>,
    pub value: ValueSpec,
    pub multiple: bool,
    pub required: bool,
    pub default: Option<Value>,
    pub hidden: bool,
    pub help: Option<String>,
    pub show_default: bool,
}

/// A positional argument
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    /// Key of the parsed value
    pub key: String,
    /// Display name
    pub name: String,
    pub value: ValueSpec,
    /// Consumes every remaining token
    pub rest: bool,
    pub required: bool,
    pub default: Option<Value>,
    pub help: Option<String>,
}

/// One rendered parameter
#[derive(Debug, Clone)]
pub enum CliPrimitive {
    Option(OptionSpec),
    Argument(ArgumentSpec),
}

impl CliPrimitive {
    pub fn key(&self) -> &str {
        match self {
            CliPrimitive::Option(option) => &option.key,
            CliPrimitive::Argument(argument) => &argument.key,
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, CliPrimitive::Argument(_))
    }

    pub fn short(&self) -> Option<char> {
        match self {
            CliPrimitive::Option(option) => option.short,
            CliPrimitive::Argument(_) => None,
        }
    }

    /// Whether any spelling of this primitive appeared on the command line
    pub fn was_supplied(&self, matches: &ArgMatches) -> bool {
        match self {
            CliPrimitive::Option(option) => {
                given(matches, &option.key)
                    || (option.flag.is_some()
                        && given(matches, &format!("{}{}", option.key, NEGATION_SUFFIX)))
            }
            CliPrimitive::Argument(argument) => given(matches, &argument.key),
        }
    }

    pub fn to_clap_args(&self) -> Vec<Arg> {
        match self {
            CliPrimitive::Option(option) => option.to_clap_args(),
            CliPrimitive::Argument(argument) => vec![argument.to_clap_arg()],
        }
    }

    /// Read and convert the value of this primitive
    pub fn extract(&self, matches: &ArgMatches) -> Result<Value, InvocationError> {
        let result = match self {
            CliPrimitive::Option(option) => option.extract(matches),
            CliPrimitive::Argument(argument) => argument.extract(matches),
        };
        result.map_err(|source| InvocationError::Conversion {
            parameter: self.key().to_string(),
            source,
        })
    }
}

impl OptionSpec {
    fn help_text(&self) -> Option<String> {
        let mut parts: Vec<String> = self.help.iter().cloned().collect();
        if self.flag.is_none() {
            if let Some(choices) = self.value.choices() {
                parts.push(format!("[possible values: {}]", choices.join(", ")));
            }
        }
        if self.show_default {
            if let Some(default) = self.default.as_ref().filter(|d| !d.is_null()) {
                parts.push(format!("[default: {}]", display_value(default)));
            }
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    fn to_clap_args(&self) -> Vec<Arg> {
        let help = self.help_text();
        match &self.flag {
            Some(flag) => {
                let negated_id = format!("{}{}", self.key, NEGATION_SUFFIX);
                let mut positive = Arg::new(self.key.clone())
                    .long(flag.positive.clone())
                    .action(ArgAction::SetTrue)
                    .overrides_with(negated_id.clone())
                    .hide(self.hidden);
                let mut negative = Arg::new(negated_id)
                    .long(flag.negative.clone())
                    .action(ArgAction::SetTrue)
                    .overrides_with(self.key.clone())
                    .hide(self.hidden)
                    .help(format!("Negates --{}", flag.positive));
                if let Some(help) = help {
                    positive = positive.help(help);
                }
                if let Some(short) = self.short {
                    if flag.inverted {
                        negative = negative.short(short);
                    } else {
                        positive = positive.short(short);
                    }
                }
                vec![positive, negative]
            }
            None => {
                let arity = self.value.arity();
                let mut arg = Arg::new(self.key.clone())
                    .long(self.long.clone())
                    .num_args(arity)
                    .value_names(self.value.metavars())
                    .action(if self.multiple {
                        ArgAction::Append
                    } else {
                        ArgAction::Set
                    })
                    .allow_negative_numbers(true)
                    .required(self.required)
                    .hide(self.hidden);
                if let Some(short) = self.short {
                    arg = arg.short(short);
                }
                if let Some(help) = help {
                    arg = arg.help(help);
                }
                vec![arg]
            }
        }
    }

    fn extract(&self, matches: &ArgMatches) -> Result<Value, ConversionError> {
        match &self.flag {
            Some(flag) => {
                let negated_id = format!("{}{}", self.key, NEGATION_SUFFIX);
                if given(matches, &self.key) {
                    Ok(Value::Bool(!flag.inverted))
                } else if given(matches, &negated_id) {
                    Ok(Value::Bool(flag.inverted))
                } else {
                    Ok(self.default.clone().unwrap_or(Value::Bool(false)))
                }
            }
            None => {
                if !given(matches, &self.key) {
                    return absent(&self.default, &self.value, self.multiple);
                }
                convert_tokens(&raw_tokens(matches, &self.key)?, &self.value, self.multiple)
            }
        }
    }
}

impl ArgumentSpec {
    fn to_clap_arg(&self) -> Arg {
        let arity = self.value.arity();
        let mut arg = Arg::new(self.key.clone())
            .required(self.required)
            .allow_negative_numbers(true);
        arg = if self.rest {
            arg.num_args(arity..)
                .action(ArgAction::Append)
                .value_name(self.name.to_uppercase())
        } else if arity > 1 {
            arg.num_args(arity).value_names(self.value.metavars())
        } else {
            arg.value_name(self.name.to_uppercase())
        };
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }
        arg
    }

    fn extract(&self, matches: &ArgMatches) -> Result<Value, ConversionError> {
        if !given(matches, &self.key) {
            return absent(&self.default, &self.value, self.rest);
        }
        convert_tokens(&raw_tokens(matches, &self.key)?, &self.value, self.rest)
    }
}

fn given(matches: &ArgMatches, id: &str) -> bool {
    matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable)
    )
}

fn raw_tokens<'m>(matches: &'m ArgMatches, id: &str) -> Result<Vec<&'m str>, ConversionError> {
    let Ok(Some(raw)) = matches.try_get_raw(id) else {
        return Ok(Vec::new());
    };
    raw.map(|token| {
        token
            .to_str()
            .ok_or_else(|| ConversionError::new(format!("{token:?} is not valid UTF-8")))
    })
    .collect()
}

fn convert_tokens(
    tokens: &[&str],
    value: &ValueSpec,
    multiple: bool,
) -> Result<Value, ConversionError> {
    let mut groups = tokens
        .chunks(value.arity())
        .map(|group| value.convert_group(group))
        .collect::<Result<Vec<_>, _>>()?;
    if multiple {
        value.aggregate(groups)
    } else {
        // A repeated single-valued option keeps its last occurrence
        Ok(groups.pop().unwrap_or(Value::Null))
    }
}

fn absent(
    default: &Option<Value>,
    value: &ValueSpec,
    multiple: bool,
) -> Result<Value, ConversionError> {
    match default {
        Some(default) => Ok(default.clone()),
        None if multiple => value.aggregate(Vec::new()),
        None => Ok(Value::Null),
    }
}

/// Default values are shown without JSON quoting for strings
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
