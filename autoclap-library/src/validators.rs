//! Reusable group and value validations

use autoclap::validation::{for_parameter, TypeValidation};
use autoclap::{BuildError, GroupValues, ValidationError, ValidationFn};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Comparison operator used by count and length checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "=",
            Self::Ne => "!=",
        }
    }

    pub fn holds<T: PartialOrd>(&self, left: T, right: T) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Eq => left == right,
            Self::Ne => left != right,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn is_defined(value: &Value) -> bool {
    !value.is_null()
}

/// Checks how many parameters of a group have a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Defined {
    count: usize,
    comparison: Comparison,
}

impl Defined {
    pub fn new(count: usize, comparison: Comparison) -> Self {
        Self { count, comparison }
    }

    pub fn exactly(count: usize) -> Self {
        Self::new(count, Comparison::Eq)
    }

    pub fn at_least(count: usize) -> Self {
        Self::new(count, Comparison::Ge)
    }

    pub fn at_most(count: usize) -> Self {
        Self::new(count, Comparison::Le)
    }

    pub fn check(&self, values: &GroupValues) -> Result<(), ValidationError> {
        let defined = values.values().filter(|value| is_defined(value)).count();
        if self.comparison.holds(defined, self.count) {
            return Ok(());
        }
        let keys: Vec<&str> = values.keys().map(String::as_str).collect();
        Err(ValidationError::new(format!(
            "Of the following parameters, the number defined must be {} {}: {}",
            self.comparison,
            self.count,
            keys.join(", ")
        )))
    }

    pub fn into_validation(self) -> ValidationFn {
        Arc::new(move |values: &GroupValues| self.check(values))
    }
}

/// Limits how many groups of mutually exclusive parameters may be used
///
/// Groups are positions within the validated parameter group. With no
/// groups, every parameter forms its own group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutex {
    groups: Vec<Vec<usize>>,
    max_defined: usize,
}

impl Mutex {
    /// At most one of the validated parameters may be set
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            max_defined: 1,
        }
    }

    pub fn groups<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: IntoIterator<Item = usize>,
    {
        self.groups = groups
            .into_iter()
            .map(|group| group.into_iter().collect())
            .collect();
        self
    }

    pub fn max_defined(mut self, max_defined: usize) -> Self {
        self.max_defined = max_defined;
        self
    }

    pub fn check(&self, values: &GroupValues) -> Result<(), ValidationError> {
        let positional: Vec<(&String, &Value)> = values.iter().collect();
        let groups: Vec<Vec<usize>> = if self.groups.is_empty() {
            (0..positional.len()).map(|index| vec![index]).collect()
        } else {
            self.groups.clone()
        };

        let defined: Vec<Vec<&str>> = groups
            .iter()
            .filter(|group| {
                group
                    .iter()
                    .filter_map(|index| positional.get(*index))
                    .any(|(_, value)| is_defined(value))
            })
            .map(|group| {
                group
                    .iter()
                    .filter_map(|index| positional.get(*index))
                    .map(|(key, _)| key.as_str())
                    .collect()
            })
            .collect();

        if defined.len() <= self.max_defined {
            return Ok(());
        }
        let listed: Vec<String> = defined
            .iter()
            .map(|group| format!("({})", group.join(",")))
            .collect();
        Err(ValidationError::new(format!(
            "Values specified for > {} mutually exclusive groups: {}",
            self.max_defined,
            listed.join(", ")
        )))
    }

    pub fn into_validation(self) -> ValidationFn {
        Arc::new(move |values: &GroupValues| self.check(values))
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds on the number of items of a sequence value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLength {
    min: usize,
    max: Option<usize>,
}

impl SequenceLength {
    pub fn exactly(length: usize) -> Self {
        Self {
            min: length,
            max: Some(length),
        }
    }

    pub fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn between(min: usize, max: usize) -> Result<Self, BuildError> {
        if min > max {
            return Err(BuildError::signature(format!(
                "Minimum sequence length {min} is greater than maximum {max}"
            )));
        }
        Ok(Self {
            min,
            max: Some(max),
        })
    }

    /// Check one value; non-array values are ignored
    pub fn check(&self, name: &str, value: &Value) -> Result<(), ValidationError> {
        let Some(items) = value.as_array() else {
            return Ok(());
        };
        let length = items.len();
        if length < self.min {
            return Err(ValidationError::new(format!(
                "Parameter {name} must have at least {} values; found {length}",
                self.min
            )));
        }
        if let Some(max) = self.max.filter(|max| length > *max) {
            return Err(ValidationError::new(format!(
                "Parameter {name} must have at most {max} values; found {length}"
            )));
        }
        Ok(())
    }

    pub fn into_type_validation(self) -> TypeValidation {
        Arc::new(move |name: &str, value: &Value| self.check(name, value))
    }

    /// Validation for a single named parameter
    pub fn for_parameter(self, name: &str) -> ValidationFn {
        for_parameter(name, self.into_type_validation(), false)
    }
}
