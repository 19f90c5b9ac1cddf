// SPDX-License-Identifier: MIT

use crate::context::ExpandContext;
use crate::error::ExpandError;
use crate::resolver::VariableResolver;
use crate::MAX_EXPANSION_DEPTH;
use scr_core::is_valid_identifier;

/// Expand every `%{name}` reference in `input`, calling `resolver` for each
/// one encountered. `\%` and `\\` are the only valid escapes; any other
/// backslash-escape is an error. Scanning is a single left-to-right pass
/// (spec §4.8 step 1-4).
pub fn expand_string(
    input: &str,
    resolver: &mut dyn VariableResolver,
    ctx: &ExpandContext,
) -> Result<String, ExpandError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let escaped = chars.get(i + 1).copied();
                match escaped {
                    Some('%') => {
                        out.push('%');
                        i += 2;
                    }
                    Some('\\') => {
                        out.push('\\');
                        i += 2;
                    }
                    Some(other) => return Err(ExpandError::InvalidEscape(other)),
                    None => return Err(ExpandError::InvalidEscape('\0')),
                }
            }
            '%' if chars.get(i + 1) == Some(&'{') => {
                let start = i + 2;
                let mut end = start;
                let mut closed = false;
                while end < chars.len() {
                    if chars[end] == '}' {
                        closed = true;
                        break;
                    }
                    end += 1;
                }
                if !closed {
                    return Err(ExpandError::UnclosedReference);
                }
                let name: String = chars[start..end].iter().collect();
                out.push_str(&resolve_reference(&name, resolver, ctx)?);
                i = end + 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(out)
}

fn resolve_reference(
    name: &str,
    resolver: &mut dyn VariableResolver,
    ctx: &ExpandContext,
) -> Result<String, ExpandError> {
    if !is_valid_identifier(name) {
        return Err(ExpandError::InvalidVariableName(name.to_string()));
    }
    // Reserved names are fine to *reference* (e.g. a command template
    // reading `__runner_workdir`); only *declaring* one is forbidden, and
    // that's enforced in process_vars, not here.
    if ctx.depth + 1 >= MAX_EXPANSION_DEPTH {
        return Err(ExpandError::MaxDepthExceeded);
    }
    if ctx.contains(name) {
        let mut chain = ctx.visited.clone();
        chain.push(name.to_string());
        return Err(ExpandError::CircularReference(chain));
    }
    let next_ctx = ctx.descend(name);
    resolver.resolve(name, &next_ctx)
}
