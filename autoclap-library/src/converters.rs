//! Converters for common value shapes
//!
//! Each converter can be attached to a parameter with
//! [`CommonOptions::converter`](autoclap::CommonOptions::converter) or
//! registered for a type with
//! [`Registry::register_conversion`](autoclap::Registry::register_conversion).

use autoclap::conversion::{FloatConverter, IntegerConverter, StringConverter};
use autoclap::{ConversionError, Converter, SharedConverter};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Splits one token into a list of converted items
#[derive(Debug, Clone)]
pub struct DelimitedList {
    item: SharedConverter,
    delimiter: String,
    strip: bool,
    choices: Option<Vec<String>>,
}

impl DelimitedList {
    /// Comma separated strings
    pub fn new() -> Self {
        Self::of(Arc::new(StringConverter))
    }

    /// Comma separated items converted by `item`
    pub fn of(item: SharedConverter) -> Self {
        Self {
            item,
            delimiter: ",".to_string(),
            strip: false,
            choices: None,
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Trim whitespace around each item before converting it
    pub fn strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }
}

impl Default for DelimitedList {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for DelimitedList {
    fn name(&self) -> &str {
        "list"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        if raw.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        raw.split(self.delimiter.as_str())
            .map(|item| {
                let item = if self.strip { item.trim() } else { item };
                if let Some(choices) = &self.choices {
                    if !choices.iter().any(|choice| choice == item) {
                        return Err(ConversionError::new(format!(
                            "'{item}' is not one of {}",
                            choices.join(", ")
                        )));
                    }
                }
                self.item.convert(item)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn metavar(&self) -> String {
        format!("{}[{}...]", self.item.metavar(), self.delimiter)
    }

    fn choices(&self) -> Option<Vec<String>> {
        self.choices.clone()
    }
}

/// Numeric kind accepted by [`Positive`] and [`Range`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberKind {
    #[default]
    Int,
    Float,
}

impl NumberKind {
    fn parse(&self, raw: &str) -> Result<(Value, f64), ConversionError> {
        let value = match self {
            Self::Int => IntegerConverter.convert(raw)?,
            Self::Float => FloatConverter.convert(raw)?,
        };
        let number = value
            .as_f64()
            .ok_or_else(|| ConversionError::invalid(raw, "number"))?;
        Ok((value, number))
    }

    fn metavar(&self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Float => "FLOAT",
        }
    }
}

/// A number that must be zero or greater
#[derive(Debug, Clone, Copy, Default)]
pub struct Positive {
    kind: NumberKind,
}

impl Positive {
    pub fn int() -> Self {
        Self { kind: NumberKind::Int }
    }

    pub fn float() -> Self {
        Self {
            kind: NumberKind::Float,
        }
    }
}

impl Converter for Positive {
    fn name(&self) -> &str {
        match self.kind {
            NumberKind::Int => "positive_int",
            NumberKind::Float => "positive_float",
        }
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let (value, number) = self.kind.parse(raw)?;
        if number < 0.0 {
            return Err(ConversionError::new(format!("value {raw} must be >= 0")));
        }
        Ok(value)
    }

    fn metavar(&self) -> String {
        self.kind.metavar().to_string()
    }
}

/// A number within inclusive bounds
#[derive(Debug, Clone, Copy, Default)]
pub struct Range {
    kind: NumberKind,
    min: Option<f64>,
    max: Option<f64>,
}

impl Range {
    pub fn new(kind: NumberKind) -> Self {
        Self {
            kind,
            min: None,
            max: None,
        }
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

impl Converter for Range {
    fn name(&self) -> &str {
        "range"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let (value, number) = self.kind.parse(raw)?;
        let mut failures = Vec::new();
        if let Some(min) = self.min.filter(|min| number < *min) {
            failures.push(format!("must be >= {min}"));
        }
        if let Some(max) = self.max.filter(|max| number > *max) {
            failures.push(format!("must be <= {max}"));
        }
        if failures.is_empty() {
            Ok(value)
        } else {
            Err(ConversionError::new(format!(
                "value {raw} {}",
                failures.join(" and ")
            )))
        }
    }

    fn metavar(&self) -> String {
        self.kind.metavar().to_string()
    }
}

/// A directory, optionally created when missing
#[derive(Debug, Clone, Copy, Default)]
pub struct Directory {
    create: bool,
}

impl Directory {
    pub fn existing() -> Self {
        Self { create: false }
    }

    pub fn create() -> Self {
        Self { create: true }
    }
}

impl Converter for Directory {
    fn name(&self) -> &str {
        "directory"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let path = Path::new(raw);
        if path.exists() {
            if !path.is_dir() {
                return Err(ConversionError::new(format!("{raw} is not a directory")));
            }
        } else if self.create {
            std::fs::create_dir_all(path).map_err(|e| {
                ConversionError::new(format!("Failed to create directory {raw}: {e}"))
            })?;
            debug!("Created directory {}", path.display());
        } else {
            return Err(ConversionError::new(format!("Directory {raw} does not exist")));
        }
        Ok(Value::String(raw.to_string()))
    }

    fn metavar(&self) -> String {
        "DIR".to_string()
    }
}

fn matches_at_start(regex: &Regex, raw: &str) -> bool {
    regex.find(raw).is_some_and(|found| found.start() == 0)
}

/// Converts a token to whether it matches a pattern
#[derive(Debug, Clone)]
pub struct Matches {
    regex: Regex,
    anchored: bool,
}

impl Matches {
    /// Match anywhere in the token
    pub fn new(regex: Regex) -> Self {
        Self {
            regex,
            anchored: false,
        }
    }

    /// Match only at the start of the token
    pub fn anchored(regex: Regex) -> Self {
        Self {
            regex,
            anchored: true,
        }
    }
}

impl Converter for Matches {
    fn name(&self) -> &str {
        "matches"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let matched = if self.anchored {
            matches_at_start(&self.regex, raw)
        } else {
            self.regex.is_match(raw)
        };
        Ok(Value::Bool(matched))
    }

    fn metavar(&self) -> String {
        "TEXT".to_string()
    }
}

/// Converts a token to the capture groups of a pattern
///
/// Groups that did not participate in the match are null.
#[derive(Debug, Clone)]
pub struct Parse {
    regex: Regex,
    anchored: bool,
}

impl Parse {
    pub fn new(regex: Regex) -> Self {
        Self {
            regex,
            anchored: false,
        }
    }

    pub fn anchored(regex: Regex) -> Self {
        Self {
            regex,
            anchored: true,
        }
    }
}

impl Converter for Parse {
    fn name(&self) -> &str {
        "parse"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let captures = self
            .regex
            .captures(raw)
            .filter(|captures| !self.anchored || captures.get(0).is_some_and(|m| m.start() == 0))
            .ok_or_else(|| {
                ConversionError::new(format!(
                    "Pattern {} does not match value {raw}",
                    self.regex.as_str()
                ))
            })?;
        Ok(Value::Array(
            captures
                .iter()
                .skip(1)
                .map(|group| {
                    group.map_or(Value::Null, |m| Value::String(m.as_str().to_string()))
                })
                .collect(),
        ))
    }

    fn metavar(&self) -> String {
        "TEXT".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_delimited_list() {
        let list = DelimitedList::of(Arc::new(IntegerConverter)).strip(true);
        assert_eq!(list.convert("1, 2,3").unwrap(), json!([1, 2, 3]));
        assert_eq!(list.convert("").unwrap(), json!([]));
        assert!(list.convert("1,x").is_err());

        let colors = DelimitedList::new().delimiter(":").choices(["red", "blue"]);
        assert_eq!(colors.convert("red:blue").unwrap(), json!(["red", "blue"]));
        assert!(colors.convert("red:green").is_err());
    }

    #[test]
    fn test_positive() {
        assert_eq!(Positive::int().convert("0").unwrap(), json!(0));
        let err = Positive::int().convert("-1").unwrap_err();
        assert_eq!(err.message(), "value -1 must be >= 0");
        assert_eq!(Positive::float().convert("2.5").unwrap(), json!(2.5));
    }

    #[test]
    fn test_range_reports_failed_bound() {
        let range = Range::new(NumberKind::Int).min(1.0).max(10.0);
        assert_eq!(range.convert("5").unwrap(), json!(5));
        assert_eq!(range.convert("11").unwrap_err().message(), "value 11 must be <= 10");
        assert_eq!(range.convert("0").unwrap_err().message(), "value 0 must be >= 1");
    }

    #[test]
    fn test_directory_create() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b");
        let raw = target.to_string_lossy().to_string();

        assert!(Directory::existing().convert(&raw).is_err());
        assert_eq!(Directory::create().convert(&raw).unwrap(), json!(raw));
        assert!(target.is_dir());

        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(Directory::create().convert(&file.to_string_lossy()).is_err());
    }

    #[test]
    fn test_matches() {
        let regex = Regex::new(r"\d+").unwrap();
        assert_eq!(Matches::new(regex.clone()).convert("v12").unwrap(), json!(true));
        assert_eq!(Matches::anchored(regex).convert("v12").unwrap(), json!(false));
    }

    #[test]
    fn test_parse_captures() {
        let parse = Parse::new(Regex::new(r"(\w+)@(\w+)(\.org)?").unwrap());
        assert_eq!(parse.convert("me@host").unwrap(), json!(["me", "host", null]));
        let err = parse.convert("nobody").unwrap_err();
        assert_eq!(
            err.message(),
            r"Pattern (\w+)@(\w+)(\.org)? does not match value nobody"
        );
    }
}
