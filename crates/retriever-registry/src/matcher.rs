//! Dataset name matching and local listing filters.
//!
//! A dataset argument is one of:
//! - an exact name (`bird-size`, any case), which selects that script alone
//! - `all` or `*`, which selects every script
//! - a glob (`breed-*`, `mammal-?`, `[ab]*`, `[!x]*`) matched against names
//!   without regard to case

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::descriptor::ScriptDescriptor;
use crate::error::{RegistryError, Result};

const GLOB_CHARS: [char; 3] = ['*', '?', '['];

/// Scripts selected by `pattern`, in registry order.
///
/// Zero matches is `Ok(vec![])`; only a malformed glob is an error.
pub fn name_matches(scripts: &[ScriptDescriptor], pattern: &str) -> Result<Vec<ScriptDescriptor>> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(exact) = scripts.iter().find(|s| s.is_named(pattern)) {
        return Ok(vec![exact.clone()]);
    }

    if pattern.eq_ignore_ascii_case("all") || pattern == "*" {
        return Ok(scripts.to_vec());
    }

    if !pattern.contains(GLOB_CHARS) {
        return Ok(Vec::new());
    }

    let glob = compile_glob(pattern)?;
    let matched: Vec<ScriptDescriptor> = scripts
        .iter()
        .filter(|s| glob.is_match(&s.name))
        .cloned()
        .collect();
    debug!(pattern, matched = matched.len(), "glob match");
    Ok(matched)
}

/// Whether `pattern` names a single dataset, i.e. is not `all` or a glob.
///
/// Only plain names are worth asking the upstream repository about, so
/// anything shaped like a path is not one.
pub fn is_plain_name(pattern: &str) -> bool {
    let pattern = pattern.trim();
    !pattern.is_empty()
        && !pattern.eq_ignore_ascii_case("all")
        && !pattern.contains(GLOB_CHARS)
        && !pattern.contains(['/', '\\'])
        && pattern != ".."
}

/// Scripts tagged with any of `keywords` or licensed under any of `licenses`.
///
/// A keyword also matches when it appears in the name or title. With no
/// filters every script is returned. Matching ignores case.
pub fn filter_datasets(
    scripts: &[ScriptDescriptor],
    keywords: &[String],
    licenses: &[String],
) -> Vec<ScriptDescriptor> {
    let keywords = lowercase_terms(keywords);
    let licenses = lowercase_terms(licenses);
    if keywords.is_empty() && licenses.is_empty() {
        return scripts.to_vec();
    }

    scripts
        .iter()
        .filter(|script| {
            has_keyword(script, &keywords)
                || script
                    .licenses
                    .iter()
                    .any(|l| licenses.contains(&l.to_lowercase()))
        })
        .cloned()
        .collect()
}

fn has_keyword(script: &ScriptDescriptor, keywords: &[String]) -> bool {
    let name = script.name.to_lowercase();
    let title = script.title.as_deref().unwrap_or_default().to_lowercase();
    keywords.iter().any(|term| {
        script.keywords.iter().any(|k| k.to_lowercase() == *term)
            || name.contains(term.as_str())
            || title.contains(term.as_str())
    })
}

fn lowercase_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Translate a shell glob into an anchored, case-insensitive regex.
fn compile_glob(pattern: &str) -> Result<Regex> {
    let invalid = |detail: String| RegistryError::InvalidPattern {
        pattern: pattern.to_string(),
        detail,
    };

    let mut translated = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                let mut first = true;
                for c in chars.by_ref() {
                    match c {
                        ']' if !first => {
                            closed = true;
                            break;
                        }
                        '\\' | '[' | ']' | '^' | '&' | '~' => {
                            class.push('\\');
                            class.push(c);
                        }
                        _ => class.push(c),
                    }
                    first = false;
                }
                if !closed {
                    return Err(invalid("unterminated character class".to_string()));
                }
                class.push(']');
                translated.push_str(&class);
            }
            _ => translated.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    translated.push('$');

    RegexBuilder::new(&translated)
        .case_insensitive(true)
        .build()
        .map_err(|e| invalid(e.to_string()))
}
