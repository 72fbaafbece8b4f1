//! Collision-free short option names
//!
//! A [`ShortNames`] set is threaded through one command build. Groups hand a
//! copy of their set to each subcommand so that subcommands never reuse a
//! group's letters, while letters claimed by one subcommand stay available to
//! its siblings.

use crate::error::BuildError;
use std::collections::BTreeSet;
use tracing::debug;

/// Fallback order when no letter of the parameter name is free
pub const FALLBACK_POOL: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Short names already claimed within one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortNames {
    used: BTreeSet<char>,
}

impl ShortNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set with `reserved` already claimed
    pub fn with_reserved(reserved: impl IntoIterator<Item = char>) -> Self {
        Self {
            used: reserved.into_iter().collect(),
        }
    }

    pub fn is_used(&self, short: char) -> bool {
        self.used.contains(&short)
    }

    pub fn used(&self) -> impl Iterator<Item = char> + '_ {
        self.used.iter().copied()
    }

    /// Claim an explicitly configured short name
    pub fn claim(&mut self, parameter: &str, short: char) -> Result<char, BuildError> {
        if !short.is_alphanumeric() {
            return Err(BuildError::signature(format!(
                "Short name '{short}' for parameter '{parameter}' must be a letter or digit"
            )));
        }
        if !self.used.insert(short) {
            return Err(BuildError::parameter_collision(format!(
                "Short name '-{short}' for parameter '{parameter}' is already in use"
            )));
        }
        Ok(short)
    }

    /// Infer a short name from the letters of `parameter`
    ///
    /// Each alphabetic character is tried in its lowercase form, then its
    /// uppercase form. When every such form is taken, the lowest unused
    /// letter of `a..z` then `A..Z` is used.
    pub fn infer(&mut self, parameter: &str) -> Result<char, BuildError> {
        let candidates = parameter
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .flat_map(|c| [c.to_ascii_lowercase(), c.to_ascii_uppercase()]);
        let chosen = candidates
            .chain(FALLBACK_POOL.chars())
            .find(|c| !self.used.contains(c))
            .ok_or_else(|| BuildError::ShortNameExhausted {
                parameter: parameter.to_string(),
            })?;
        self.used.insert(chosen);
        debug!("Assigned short name -{} to parameter '{}'", chosen, parameter);
        Ok(chosen)
    }

    /// Resolve the short name of a parameter
    ///
    /// # Arguments
    /// * `parameter` - Parameter name used for inference
    /// * `explicit` - `Some(Some(c))` for a configured short name,
    ///   `Some(None)` when the short name is disabled, `None` when unset
    /// * `infer` - Whether to infer a short name when none is configured
    pub fn assign(
        &mut self,
        parameter: &str,
        explicit: Option<Option<char>>,
        infer: bool,
    ) -> Result<Option<char>, BuildError> {
        match explicit {
            Some(Some(short)) => self.claim(parameter, short).map(Some),
            Some(None) => Ok(None),
            None if infer => self.infer(parameter).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_lowercase_then_uppercase() {
        let mut shorts = ShortNames::new();
        assert_eq!(shorts.infer("bar").unwrap(), 'b');
        assert_eq!(shorts.infer("baz").unwrap(), 'B');
        assert_eq!(shorts.infer("bab").unwrap(), 'a');
    }

    #[test]
    fn test_fallback_is_lowest_unused_letter() {
        let mut shorts = ShortNames::with_reserved(['x', 'X', 'a']);
        assert_eq!(shorts.infer("x").unwrap(), 'b');
        assert_eq!(shorts.infer("_1").unwrap(), 'c');
    }

    #[test]
    fn test_exhausted_pool_is_an_error() {
        let mut shorts = ShortNames::with_reserved(FALLBACK_POOL.chars());
        let err = shorts.infer("anything").unwrap_err();
        assert_eq!(
            err,
            BuildError::ShortNameExhausted {
                parameter: "anything".to_string()
            }
        );
    }

    #[test]
    fn test_explicit_collision() {
        let mut shorts = ShortNames::new();
        shorts.claim("verbose", 'v').unwrap();
        let err = shorts.claim("version", 'v').unwrap_err();
        assert!(matches!(err, BuildError::ParameterCollision { .. }));
    }

    #[test]
    fn test_assign_modes() {
        let mut shorts = ShortNames::new();
        assert_eq!(shorts.assign("count", Some(Some('n')), true).unwrap(), Some('n'));
        assert_eq!(shorts.assign("debug", Some(None), true).unwrap(), None);
        assert_eq!(shorts.assign("debug", None, false).unwrap(), None);
        assert_eq!(shorts.assign("debug", None, true).unwrap(), Some('d'));
        assert!(!shorts.is_used('c'));
    }

    #[test]
    fn test_never_returns_used_letter() {
        let mut shorts = ShortNames::new();
        let names = ["alpha", "alpine", "also", "a", "aa", "b", "beta"];
        let assigned: Vec<char> = names.iter().map(|n| shorts.infer(n).unwrap()).collect();
        let unique: BTreeSet<char> = assigned.iter().copied().collect();
        assert_eq!(unique.len(), assigned.len());
    }
}
