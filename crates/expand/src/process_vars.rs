// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashMap};

use scr_core::{is_reserved_identifier, is_valid_identifier, VarValue, MAX_VARS_PER_SCOPE};

use crate::context::ExpandContext;
use crate::error::ExpandError;
use crate::resolver::{LazyResolver, VariableResolver};

/// Validate and expand a scope's declared variables (spec §4.8).
///
/// Phase A rejects the whole scope on the first structural problem: an
/// invalid or reserved name, too many variables, or an oversized value.
/// Phase B then materializes every variable through a [`LazyResolver`],
/// so cross-references within the scope resolve regardless of
/// declaration order, and references to `base_expanded_*` reach into the
/// enclosing scope.
pub fn process_vars(
    raw_vars: &BTreeMap<String, VarValue>,
    base_expanded_strings: &HashMap<String, String>,
    base_expanded_arrays: &HashMap<String, Vec<String>>,
    scope_name: &str,
) -> Result<(HashMap<String, String>, HashMap<String, Vec<String>>), ExpandError> {
    let _ = scope_name;

    if raw_vars.len() > MAX_VARS_PER_SCOPE {
        return Err(ExpandError::TooManyVariables(raw_vars.len()));
    }

    for (name, value) in raw_vars {
        if !is_valid_identifier(name) {
            return Err(ExpandError::InvalidVariableName(name.clone()));
        }
        if is_reserved_identifier(name) {
            return Err(ExpandError::ReservedVariableName(name.clone()));
        }
        if let Err(size_err) = value.validate_size() {
            return Err(ExpandError::InvalidValue {
                name: name.clone(),
                reason: size_err.to_string(),
            });
        }
    }

    let raw_map: HashMap<String, VarValue> = raw_vars
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut resolver = LazyResolver::new(&raw_map, Some(base_expanded_strings));

    let mut strings = base_expanded_strings.clone();
    let mut arrays = base_expanded_arrays.clone();

    for (name, value) in raw_vars {
        match value {
            VarValue::String(_) => {
                let ctx = ExpandContext::seeded(name);
                let expanded = resolver.resolve(name, &ctx)?;
                strings.insert(name.clone(), expanded);
            }
            VarValue::Array(items) => {
                let mut expanded_items = Vec::with_capacity(items.len());
                for index in 0..items.len() {
                    expanded_items.push(resolver.resolve_array(name, index)?);
                }
                arrays.insert(name.clone(), expanded_items);
            }
        }
    }

    Ok((strings, arrays))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, VarValue)]) -> BTreeMap<String, VarValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn expands_independent_vars() {
        let raw = vars(&[
            ("greeting", VarValue::String("hello".to_string())),
            ("name", VarValue::String("world".to_string())),
        ]);
        let (strings, _) = process_vars(&raw, &HashMap::new(), &HashMap::new(), "global").unwrap();
        assert_eq!(strings.get("greeting").unwrap(), "hello");
        assert_eq!(strings.get("name").unwrap(), "world");
    }

    #[test]
    fn forward_reference_resolves_regardless_of_declaration_order() {
        let raw = vars(&[
            ("full", VarValue::String("%{first} %{last}".to_string())),
            ("first", VarValue::String("Ada".to_string())),
            ("last", VarValue::String("Lovelace".to_string())),
        ]);
        let (strings, _) = process_vars(&raw, &HashMap::new(), &HashMap::new(), "global").unwrap();
        assert_eq!(strings.get("full").unwrap(), "Ada Lovelace");
    }

    #[test]
    fn inherits_from_enclosing_scope() {
        let raw = vars(&[("child", VarValue::String("%{parent_val}-suffix".to_string()))]);
        let mut base = HashMap::new();
        base.insert("parent_val".to_string(), "root".to_string());
        let (strings, _) = process_vars(&raw, &base, &HashMap::new(), "group").unwrap();
        assert_eq!(strings.get("child").unwrap(), "root-suffix");
    }

    #[test]
    fn array_elements_expand_independently() {
        let raw = vars(&[
            ("suffix", VarValue::String("txt".to_string())),
            (
                "files",
                VarValue::Array(vec!["a.%{suffix}".to_string(), "b.%{suffix}".to_string()]),
            ),
        ]);
        let (_, arrays) = process_vars(&raw, &HashMap::new(), &HashMap::new(), "global").unwrap();
        assert_eq!(arrays.get("files").unwrap(), &vec!["a.txt".to_string(), "b.txt".to_string()]);
    }

    #[test]
    fn circular_reference_is_rejected() {
        let raw = vars(&[
            ("a", VarValue::String("%{b}".to_string())),
            ("b", VarValue::String("%{c}".to_string())),
            ("c", VarValue::String("%{a}".to_string())),
        ]);
        let err = process_vars(&raw, &HashMap::new(), &HashMap::new(), "global").unwrap_err();
        assert!(matches!(err, ExpandError::CircularReference(chain) if chain == vec!["a","b","c","a"]));
    }

    #[test]
    fn reserved_name_is_rejected() {
        let raw = vars(&[("__runner_x", VarValue::String("v".to_string()))]);
        let err = process_vars(&raw, &HashMap::new(), &HashMap::new(), "global").unwrap_err();
        assert!(matches!(err, ExpandError::ReservedVariableName(name) if name == "__runner_x"));
    }

    #[test]
    fn invalid_name_is_rejected() {
        let raw = vars(&[("9bad", VarValue::String("v".to_string()))]);
        let err = process_vars(&raw, &HashMap::new(), &HashMap::new(), "global").unwrap_err();
        assert!(matches!(err, ExpandError::InvalidVariableName(name) if name == "9bad"));
    }
}
