// SPDX-License-Identifier: MIT

//! Internal variable typing: a value is either a single string or a
//! sequence of strings (spec §3). No class hierarchy — the tagged enum
//! plus a resolver callback (see `scr-expand`) is the whole story.

use crate::{MAX_VAR_ARRAY_LEN, MAX_VAR_VALUE_BYTES};
use serde::Deserialize;

/// A raw (pre-expansion) or fully-expanded variable value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    String(String),
    Array(Vec<String>),
}

impl VarValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            VarValue::String(_) => "string",
            VarValue::Array(_) => "array",
        }
    }

    pub fn is_same_type(&self, other: &VarValue) -> bool {
        self.type_name() == other.type_name()
    }

    /// Validate size bounds from spec §3: a string is capped at 10 KB; an
    /// array has at most 1000 elements, each at most 10 KB.
    pub fn validate_size(&self) -> Result<(), VarSizeError> {
        match self {
            VarValue::String(s) => {
                if s.len() > MAX_VAR_VALUE_BYTES {
                    return Err(VarSizeError::StringTooLarge(s.len()));
                }
                Ok(())
            }
            VarValue::Array(items) => {
                if items.len() > MAX_VAR_ARRAY_LEN {
                    return Err(VarSizeError::ArrayTooLong(items.len()));
                }
                for item in items {
                    if item.len() > MAX_VAR_VALUE_BYTES {
                        return Err(VarSizeError::StringTooLarge(item.len()));
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum VarSizeError {
    #[error("string value of {0} bytes exceeds the 10 KB limit")]
    StringTooLarge(usize),
    #[error("array of {0} elements exceeds the 1000-element limit")]
    ArrayTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_within_limit_is_valid() {
        let v = VarValue::String("hello".into());
        assert!(v.validate_size().is_ok());
    }

    #[test]
    fn oversized_string_is_rejected() {
        let v = VarValue::String("x".repeat(MAX_VAR_VALUE_BYTES + 1));
        assert!(matches!(
            v.validate_size(),
            Err(VarSizeError::StringTooLarge(_))
        ));
    }

    #[test]
    fn oversized_array_is_rejected() {
        let v = VarValue::Array(vec!["a".to_string(); MAX_VAR_ARRAY_LEN + 1]);
        assert!(matches!(
            v.validate_size(),
            Err(VarSizeError::ArrayTooLong(_))
        ));
    }

    #[test]
    fn type_mismatch_is_detected() {
        let s = VarValue::String("a".into());
        let a = VarValue::Array(vec!["a".into()]);
        assert!(!s.is_same_type(&a));
        assert!(s.is_same_type(&VarValue::String("b".into())));
    }
}
