//! The parsed-values map
//!
//! [`ParsedValues`] holds the converted value of every primitive keyed by the
//! primitive's key. The post-parse pipeline rewrites it in place; callbacks
//! read the final values, typically with [`ParsedValues::get_as`].
//!
//! Values also record whether they were supplied on the command line or
//! filled in from a default.

use crate::error::InvocationError;
use crate::primitive::CliPrimitive;
use crate::validation::{GroupValues, ParamGroup};
use clap::ArgMatches;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Values of one invocation, in primitive order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParsedValues {
    values: IndexMap<String, Value>,
    /// Keys given on the command line or set by a conditional
    #[serde(skip)]
    supplied: HashSet<String>,
}

impl ParsedValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the raw tokens of every primitive
    pub fn extract(
        primitives: &[CliPrimitive],
        matches: &ArgMatches,
    ) -> Result<Self, InvocationError> {
        let mut values = Self::new();
        for primitive in primitives {
            values.insert(primitive.key(), primitive.extract(matches)?);
            if primitive.was_supplied(matches) {
                values.mark_supplied(primitive.key());
            }
        }
        Ok(values)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserialize a value; a missing key reads as null
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, InvocationError> {
        let value = self.values.get(key).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|source| InvocationError::Deserialize {
            key: key.to_string(),
            source,
        })
    }

    /// Whether `key` was given by the user rather than defaulted
    pub fn is_supplied(&self, key: &str) -> bool {
        self.supplied.contains(key)
    }

    pub fn mark_supplied(&mut self, key: impl Into<String>) {
        self.supplied.insert(key.into());
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Remove a value, keeping the order of the others
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values of a parameter group; missing keys read as null
    pub fn group(&self, group: &ParamGroup) -> GroupValues {
        group_values(&self.values, group)
    }

    pub fn as_map(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn as_map_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.values
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.values
    }
}

impl From<IndexMap<String, Value>> for ParsedValues {
    fn from(values: IndexMap<String, Value>) -> Self {
        Self {
            values,
            supplied: HashSet::new(),
        }
    }
}

impl FromIterator<(String, Value)> for ParsedValues {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<IndexMap<_, _>>())
    }
}

pub(crate) fn group_values(values: &IndexMap<String, Value>, group: &ParamGroup) -> GroupValues {
    group
        .names()
        .iter()
        .map(|name| (name.clone(), values.get(name).cloned().unwrap_or(Value::Null)))
        .collect()
}
