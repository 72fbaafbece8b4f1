//! The deferred post-parse pipeline
//!
//! Runs once per invocation after raw extraction and before the callback:
//!
//! 1. Conditionals, which may rewrite values; rewritten values count as
//!    supplied
//! 2. Validations, where the first failure aborts the invocation
//! 3. Composite reassembly, in declared parameter order

use crate::composite::CompositeCallback;
use crate::error::{InvocationError, ValidationError};
use crate::parsed::{group_values, ParsedValues};
use crate::validation::{ConditionalFn, RuleTable, ValidationFn};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

/// The post-parse stages of one command
#[derive(Debug, Clone, Default)]
pub struct PostParsePipeline {
    conditionals: RuleTable<ConditionalFn>,
    validations: RuleTable<ValidationFn>,
    composites: Vec<CompositeCallback>,
}

impl PostParsePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_conditionals(&mut self, conditionals: &RuleTable<ConditionalFn>) {
        self.conditionals.merge(conditionals);
    }

    pub fn add_validations(&mut self, validations: &RuleTable<ValidationFn>) {
        self.validations.merge(validations);
    }

    pub fn add_composite(&mut self, callback: CompositeCallback) {
        self.composites.push(callback);
    }

    pub fn conditionals(&self) -> &RuleTable<ConditionalFn> {
        &self.conditionals
    }

    pub fn validations(&self) -> &RuleTable<ValidationFn> {
        &self.validations
    }

    pub fn composites(&self) -> &[CompositeCallback] {
        &self.composites
    }

    /// Run every stage against `values`
    pub fn run(&self, values: &mut ParsedValues) -> Result<(), InvocationError> {
        trace!("Running {} conditionals", self.conditionals.len());
        for key in apply_conditionals(&self.conditionals, values.as_map_mut())? {
            values.mark_supplied(key);
        }

        trace!("Running {} validations", self.validations.len());
        apply_validations(&self.validations, values.as_map())?;

        for composite in &self.composites {
            trace!("Reassembling composite '{}'", composite.parameter());
            composite.reassemble(values)?;
        }
        Ok(())
    }
}

/// Call every conditional with its group's current values
///
/// Returned entries overwrite `values`; later functions see the updates.
///
/// # Returns
/// The keys whose values were changed
pub fn apply_conditionals(
    conditionals: &RuleTable<ConditionalFn>,
    values: &mut IndexMap<String, Value>,
) -> Result<Vec<String>, ValidationError> {
    let mut changed = Vec::new();
    for (group, functions) in conditionals.iter() {
        for function in functions {
            if let Some(updates) = function(&group_values(values, group))? {
                trace!("Conditional on {} updated {} values", group, updates.len());
                for (key, value) in updates {
                    if values.get(&key) != Some(&value) {
                        changed.push(key.clone());
                    }
                    values.insert(key, value);
                }
            }
        }
    }
    Ok(changed)
}

/// Call every validation with its group's values, stopping at the first error
pub fn apply_validations(
    validations: &RuleTable<ValidationFn>,
    values: &IndexMap<String, Value>,
) -> Result<(), ValidationError> {
    for (group, functions) in validations.iter() {
        let group_values = group_values(values, group);
        for function in functions {
            function(&group_values)?;
        }
    }
    Ok(())
}
