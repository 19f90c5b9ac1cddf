// SPDX-License-Identifier: MIT

use std::cell::RefCell;
use std::collections::HashMap;

use scr_core::VarValue;

use crate::context::ExpandContext;
use crate::error::ExpandError;
use crate::scanner::expand_string;

/// Looks up the expanded string value of a variable by name, given the
/// chain of names already being resolved (for cycle detection).
///
/// `scanner::expand_string` calls back into a `VariableResolver` for every
/// `%{name}` it encounters, so eager (already-expanded) and lazy
/// (first-touch) lookup share one scanning implementation.
pub trait VariableResolver {
    fn resolve(&mut self, name: &str, ctx: &ExpandContext) -> Result<String, ExpandError>;
}

/// Resolves references against a map that is already fully expanded —
/// used once a scope's own vars are materialized and a child scope's
/// templates need to read the parent's values.
pub struct EagerResolver {
    values: HashMap<String, String>,
}

impl EagerResolver {
    pub fn new(values: HashMap<String, String>) -> Self {
        EagerResolver { values }
    }
}

impl VariableResolver for EagerResolver {
    fn resolve(&mut self, name: &str, _ctx: &ExpandContext) -> Result<String, ExpandError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ExpandError::UndefinedVariable(name.to_string()))
    }
}

/// Resolves references against a map of raw, not-yet-expanded declarations,
/// expanding each one the first time it's touched and memoizing the result
/// so a variable referenced from several places is only ever expanded once
/// (spec §4.8: "expansion is lazy and memoized, not eager and ordered").
///
/// Falls through to `fallback` (typically an `EagerResolver` over the
/// enclosing scope) for names not declared in `raw`.
pub struct LazyResolver<'a> {
    raw: &'a HashMap<String, VarValue>,
    cache: RefCell<HashMap<String, String>>,
    fallback: Option<&'a HashMap<String, String>>,
}

impl<'a> LazyResolver<'a> {
    pub fn new(raw: &'a HashMap<String, VarValue>, fallback: Option<&'a HashMap<String, String>>) -> Self {
        LazyResolver {
            raw,
            cache: RefCell::new(HashMap::new()),
            fallback,
        }
    }

    /// Expand a single array element in the caller's current context
    /// (spec §4.8: array elements are expanded independently, each
    /// starting from the array variable's own name in the visited chain).
    pub fn resolve_array(&self, name: &str, index: usize) -> Result<String, ExpandError> {
        match self.raw.get(name) {
            Some(VarValue::Array(items)) => {
                let item = items.get(index).ok_or_else(|| {
                    ExpandError::UndefinedVariable(format!("{name}[{index}]"))
                })?;
                let ctx = ExpandContext::seeded(name);
                let mut resolver = LazyResolver {
                    raw: self.raw,
                    cache: RefCell::new(self.cache.borrow().clone()),
                    fallback: self.fallback,
                };
                expand_string(item, &mut resolver, &ctx)
            }
            Some(VarValue::String(_)) => Err(ExpandError::UndefinedVariable(format!("{name}[{index}]"))),
            None => Err(ExpandError::UndefinedVariable(name.to_string())),
        }
    }
}

impl<'a> VariableResolver for LazyResolver<'a> {
    fn resolve(&mut self, name: &str, ctx: &ExpandContext) -> Result<String, ExpandError> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }

        let expanded = match self.raw.get(name) {
            Some(VarValue::String(template)) => expand_string(template, self, ctx)?,
            Some(VarValue::Array(_)) => return Err(ExpandError::ArrayInStringContext(name.to_string())),
            None => {
                if let Some(value) = self.fallback.and_then(|f| f.get(name)) {
                    value.clone()
                } else {
                    return Err(ExpandError::UndefinedVariable(name.to_string()));
                }
            }
        };

        self.cache.borrow_mut().insert(name.to_string(), expanded.clone());
        Ok(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, VarValue)]) -> HashMap<String, VarValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn lazy_resolver_expands_forward_reference() {
        let vars = raw(&[
            ("a", VarValue::String("%{b}".to_string())),
            ("b", VarValue::String("leaf".to_string())),
        ]);
        let mut resolver = LazyResolver::new(&vars, None);
        let ctx = ExpandContext::seeded("a");
        assert_eq!(resolver.resolve("a", &ctx).unwrap(), "leaf");
    }

    #[test]
    fn lazy_resolver_memoizes() {
        let vars = raw(&[
            ("a", VarValue::String("x".to_string())),
            ("b", VarValue::String("%{a}-%{a}".to_string())),
        ]);
        let mut resolver = LazyResolver::new(&vars, None);
        let ctx = ExpandContext::seeded("b");
        assert_eq!(resolver.resolve("b", &ctx).unwrap(), "x-x");
    }

    #[test]
    fn lazy_resolver_falls_back_to_parent_scope() {
        let vars = raw(&[("child", VarValue::String("%{parent_val}".to_string()))]);
        let mut fallback = HashMap::new();
        fallback.insert("parent_val".to_string(), "inherited".to_string());
        let mut resolver = LazyResolver::new(&vars, Some(&fallback));
        let ctx = ExpandContext::seeded("child");
        assert_eq!(resolver.resolve("child", &ctx).unwrap(), "inherited");
    }

    #[test]
    fn array_referenced_as_string_is_rejected() {
        let vars = raw(&[("items", VarValue::Array(vec!["a".to_string()]))]);
        let mut resolver = LazyResolver::new(&vars, None);
        let ctx = ExpandContext::seeded("x");
        assert!(matches!(
            resolver.resolve("items", &ctx),
            Err(ExpandError::ArrayInStringContext(name)) if name == "items"
        ));
    }

    #[test]
    fn array_elements_expand_independently() {
        let vars = raw(&[
            ("suffix", VarValue::String("bin".to_string())),
            (
                "paths",
                VarValue::Array(vec!["/usr/%{suffix}".to_string(), "/opt/%{suffix}".to_string()]),
            ),
        ]);
        let resolver = LazyResolver::new(&vars, None);
        assert_eq!(resolver.resolve_array("paths", 0).unwrap(), "/usr/bin");
        assert_eq!(resolver.resolve_array("paths", 1).unwrap(), "/opt/bin");
    }
}
