//! Conditionals and validations
//!
//! Both are keyed by a [`ParamGroup`]: the ordered names of the parameters a
//! function receives. Type-bound validations registered in the
//! [`Registry`](crate::registry::Registry) are single-parameter functions
//! that are adapted into group functions when a command is assembled.

use crate::error::ValidationError;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Values of a parameter group, in group order
pub type GroupValues = IndexMap<String, Value>;

/// Checks a group of parameter values
pub type ValidationFn = Arc<dyn Fn(&GroupValues) -> Result<(), ValidationError> + Send + Sync>;

/// Rewrites a group of parameter values; entries of the returned map
/// overwrite the parsed values
pub type ConditionalFn =
    Arc<dyn Fn(&GroupValues) -> Result<Option<GroupValues>, ValidationError> + Send + Sync>;

/// Checks the value of one parameter of a given type
pub type TypeValidation = Arc<dyn Fn(&str, &Value) -> Result<(), ValidationError> + Send + Sync>;

/// Ordered parameter names a rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamGroup(Vec<String>);

impl ParamGroup {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// The same group with every name passed through `rename`
    pub fn map_names(&self, rename: impl Fn(&str) -> String) -> Self {
        Self(self.0.iter().map(|name| rename(name)).collect())
    }
}

impl From<&str> for ParamGroup {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for ParamGroup {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl<const N: usize> From<[&str; N]> for ParamGroup {
    fn from(names: [&str; N]) -> Self {
        Self::new(names)
    }
}

impl From<Vec<String>> for ParamGroup {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl fmt::Display for ParamGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Insertion-ordered table of rules per parameter group
#[derive(Clone)]
pub struct RuleTable<F> {
    entries: IndexMap<ParamGroup, Vec<F>>,
}

impl<F> Default for RuleTable<F> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<F: Clone> RuleTable<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, group: impl Into<ParamGroup>, rule: F) {
        self.entries.entry(group.into()).or_default().push(rule);
    }

    pub fn extend_group(
        &mut self,
        group: impl Into<ParamGroup>,
        rules: impl IntoIterator<Item = F>,
    ) {
        self.entries.entry(group.into()).or_default().extend(rules);
    }

    /// Append every entry of `other`, merging groups that already exist
    pub fn merge(&mut self, other: &RuleTable<F>) {
        for (group, rules) in other.iter() {
            self.extend_group(group.clone(), rules.iter().cloned());
        }
    }

    /// The same rules keyed by renamed groups
    pub fn rekeyed(&self, rename: impl Fn(&str) -> String) -> Self {
        let mut table = Self::new();
        for (group, rules) in self.iter() {
            table.extend_group(group.map_names(&rename), rules.iter().cloned());
        }
        table
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamGroup, &Vec<F>)> {
        self.entries.iter()
    }

    pub fn get(&self, group: &ParamGroup) -> Option<&[F]> {
        self.entries.get(group).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl<F> fmt::Debug for RuleTable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(group, rules)| (group.to_string(), rules.len())),
            )
            .finish()
    }
}

/// Wrap `validation` so that every dependency runs first
///
/// Dependencies receive the same input in listed order; the first failure is
/// returned and `validation` does not run.
pub fn with_dependencies(
    validation: TypeValidation,
    depends_on: Vec<TypeValidation>,
) -> TypeValidation {
    if depends_on.is_empty() {
        return validation;
    }
    Arc::new(move |name: &str, value: &Value| {
        for dependency in &depends_on {
            dependency(name, value)?;
        }
        validation(name, value)
    })
}

/// Adapt a type validation into a group validation for one parameter
///
/// Absent values are skipped. Values of repeatable parameters are checked
/// element by element.
pub fn for_parameter(
    name: &str,
    validation: TypeValidation,
    allows_multiple: bool,
) -> ValidationFn {
    let name = name.to_string();
    Arc::new(move |values: &GroupValues| {
        match values.get(&name) {
            None | Some(Value::Null) => Ok(()),
            Some(Value::Array(items)) if allows_multiple => items
                .iter()
                .filter(|item| !item.is_null())
                .try_for_each(|item| validation(&name, item)),
            Some(value) => validation(&name, value),
        }
    })
}

/// Build a [`ValidationFn`] from a closure
pub fn validation<F>(f: F) -> ValidationFn
where
    F: Fn(&GroupValues) -> Result<(), ValidationError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a [`ConditionalFn`] from a closure
pub fn conditional<F>(f: F) -> ConditionalFn
where
    F: Fn(&GroupValues) -> Result<Option<GroupValues>, ValidationError> + Send + Sync + 'static,
{
    Arc::new(f)
}
