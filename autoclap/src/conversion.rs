//! Converters turn raw command-line tokens into [`Value`]s
//!
//! Every primitive keeps one converter per value slot. Repeated occurrences
//! are combined with [`Converter::aggregate`], which lets a mapping collect
//! `key=value` tokens into one object.

use crate::error::ConversionError;
use crate::types::{Primitive, TypeKey};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;

/// Converts a single raw token
pub trait Converter: Send + Sync + fmt::Debug {
    /// Name shown in help and command descriptions
    fn name(&self) -> &str;

    fn convert(&self, raw: &str) -> Result<Value, ConversionError>;

    /// Combine the converted values of a repeatable primitive
    fn aggregate(&self, values: Vec<Value>) -> Result<Value, ConversionError> {
        Ok(Value::Array(values))
    }

    fn metavar(&self) -> String {
        self.name().to_uppercase()
    }

    /// Accepted values, when the converter only accepts a fixed set
    fn choices(&self) -> Option<Vec<String>> {
        None
    }
}

pub type SharedConverter = Arc<dyn Converter>;

/// Signature of a conversion step
pub type ConversionFn = Arc<dyn Fn(Value) -> Result<Value, ConversionError> + Send + Sync>;

/// Converter for one of the built-in primitives
pub fn primitive_converter(primitive: Primitive) -> SharedConverter {
    match primitive {
        Primitive::Str => Arc::new(StringConverter),
        Primitive::Int => Arc::new(IntegerConverter),
        Primitive::Float => Arc::new(FloatConverter),
        Primitive::Bool => Arc::new(BooleanConverter),
        Primitive::Path => Arc::new(PathConverter),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringConverter;

impl Converter for StringConverter {
    fn name(&self) -> &str {
        "text"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        Ok(Value::String(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerConverter;

impl Converter for IntegerConverter {
    fn name(&self) -> &str {
        "integer"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        raw.trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| ConversionError::invalid(raw, "integer"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FloatConverter;

impl Converter for FloatConverter {
    fn name(&self) -> &str {
        "float"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| ConversionError::invalid(raw, "floating point value"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanConverter;

impl Converter for BooleanConverter {
    fn name(&self) -> &str {
        "boolean"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "t" | "yes" | "y" | "on" => Ok(Value::Bool(true)),
            "0" | "false" | "f" | "no" | "n" | "off" => Ok(Value::Bool(false)),
            _ => Err(ConversionError::invalid(raw, "boolean")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathConverter;

impl Converter for PathConverter {
    fn name(&self) -> &str {
        "path"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        if raw.is_empty() {
            return Err(ConversionError::new("path must not be empty"));
        }
        Ok(Value::String(raw.to_string()))
    }
}

/// Case handling for enum variant matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseFold {
    /// Compare case-insensitively
    #[default]
    Insensitive,
    /// Compare exactly
    Preserve,
}

/// Accepts one of a fixed set of variant names
#[derive(Debug, Clone)]
pub struct EnumChoice {
    name: String,
    variants: Vec<String>,
    fold: CaseFold,
}

impl EnumChoice {
    pub fn new(key: &TypeKey, variants: Vec<String>, fold: CaseFold) -> Self {
        Self {
            name: key.short_name().to_string(),
            variants,
            fold,
        }
    }
}

impl Converter for EnumChoice {
    fn name(&self) -> &str {
        &self.name
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let found = self.variants.iter().find(|variant| match self.fold {
            CaseFold::Insensitive => variant.eq_ignore_ascii_case(raw),
            CaseFold::Preserve => variant.as_str() == raw,
        });
        match found {
            Some(variant) => Ok(Value::String(variant.clone())),
            None => Err(ConversionError::new(format!(
                "'{raw}' is not one of {}",
                self.variants.join(", ")
            ))),
        }
    }

    fn metavar(&self) -> String {
        format!("[{}]", self.variants.join("|"))
    }

    fn choices(&self) -> Option<Vec<String>> {
        Some(self.variants.clone())
    }
}

/// Converts `key=value` tokens and merges them into one object
#[derive(Debug, Clone)]
pub struct KeyValueConverter {
    key: SharedConverter,
    value: SharedConverter,
}

impl KeyValueConverter {
    pub fn new(key: SharedConverter, value: SharedConverter) -> Self {
        Self { key, value }
    }
}

impl Converter for KeyValueConverter {
    fn name(&self) -> &str {
        "mapping"
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let Some((key, value)) = raw.split_once('=') else {
            return Err(ConversionError::new(format!(
                "'{raw}' is not a KEY=VALUE pair"
            )));
        };
        let key = match self.key.convert(key)? {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Value::Array(vec![Value::String(key), self.value.convert(value)?]))
    }

    fn aggregate(&self, values: Vec<Value>) -> Result<Value, ConversionError> {
        let mut merged = Map::new();
        for pair in values {
            match pair {
                Value::Array(mut kv) if kv.len() == 2 => {
                    let value = kv.pop().unwrap_or(Value::Null);
                    if let Some(Value::String(key)) = kv.pop() {
                        merged.insert(key, value);
                    }
                }
                Value::Object(map) => merged.extend(map),
                other => {
                    return Err(ConversionError::new(format!(
                        "cannot merge {other} into a mapping"
                    )))
                }
            }
        }
        Ok(Value::Object(merged))
    }

    fn metavar(&self) -> String {
        "KEY=VALUE".to_string()
    }
}

/// Converter backed by a function, optionally preceded by dependency steps
///
/// The raw token enters the chain as a JSON string; each dependency receives
/// the output of the previous one.
#[derive(Clone)]
pub struct FnConverter {
    name: String,
    depends: Vec<ConversionFn>,
    convert: ConversionFn,
}

impl FnConverter {
    pub fn new<F>(name: impl Into<String>, convert: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            depends: Vec::new(),
            convert: Arc::new(convert),
        }
    }

    pub fn with_depends(mut self, depends: impl IntoIterator<Item = ConversionFn>) -> Self {
        self.depends.extend(depends);
        self
    }
}

impl fmt::Debug for FnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter")
            .field("name", &self.name)
            .field("depends", &self.depends.len())
            .finish()
    }
}

impl Converter for FnConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let mut value = Value::String(raw.to_string());
        for step in &self.depends {
            value = step(value)?;
        }
        (self.convert)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Color;

    #[test]
    fn test_integer_converter() {
        assert_eq!(IntegerConverter.convert("42").unwrap(), json!(42));
        assert_eq!(IntegerConverter.convert("-3").unwrap(), json!(-3));
        assert!(IntegerConverter.convert("4.2").is_err());
    }

    #[test]
    fn test_float_converter() {
        assert_eq!(FloatConverter.convert("2.5").unwrap(), json!(2.5));
        assert!(FloatConverter.convert("NaN").is_err());
        assert!(FloatConverter.convert("abc").is_err());
    }

    #[test]
    fn test_boolean_converter() {
        assert_eq!(BooleanConverter.convert("Yes").unwrap(), json!(true));
        assert_eq!(BooleanConverter.convert("off").unwrap(), json!(false));
        assert!(BooleanConverter.convert("maybe").is_err());
    }

    #[test]
    fn test_enum_choice_case_folding() {
        let choice = EnumChoice::new(
            &TypeKey::of::<Color>(),
            vec!["RED".to_string(), "GREEN".to_string()],
            CaseFold::Insensitive,
        );
        assert_eq!(choice.convert("red").unwrap(), json!("RED"));
        assert!(choice.convert("blue").is_err());
        assert_eq!(choice.metavar(), "[RED|GREEN]");

        let strict = EnumChoice::new(
            &TypeKey::of::<Color>(),
            vec!["RED".to_string()],
            CaseFold::Preserve,
        );
        assert!(strict.convert("red").is_err());
    }

    #[test]
    fn test_key_value_aggregates_into_object() {
        let converter =
            KeyValueConverter::new(Arc::new(StringConverter), Arc::new(IntegerConverter));
        assert!(converter.convert("b=x").is_err());
        assert!(converter.convert("novalue").is_err());
        let merged = converter
            .aggregate(vec![
                converter.convert("a=1").unwrap(),
                converter.convert("c=3").unwrap(),
            ])
            .unwrap();
        assert_eq!(merged, json!({"a": 1, "c": 3}));
    }

    #[test]
    fn test_fn_converter_runs_depends_in_order() {
        let trim: ConversionFn = Arc::new(|v: Value| {
            Ok(Value::String(v.as_str().unwrap_or_default().trim().to_string()))
        });
        let upper: ConversionFn = Arc::new(|v: Value| {
            Ok(Value::String(v.as_str().unwrap_or_default().to_uppercase()))
        });
        let converter = FnConverter::new("shout", |v: Value| {
            Ok(json!(format!("{}!", v.as_str().unwrap_or_default())))
        })
        .with_depends([trim, upper]);
        assert_eq!(converter.convert("  hi ").unwrap(), json!("HI!"));
    }
}
