//! Bundle-rooted path globs for `file_rego_versions` patterns.
//!
//! Patterns are matched against a file's path relative to its bundle root,
//! in the normalized `/dir/file.rego` form:
//!
//! - `*` matches within one path segment,
//! - `**` matches across segments (`/**/` also matches a single `/`),
//! - a leading `*` spans directories, so `*/policy.rego` matches both
//!   `/policy.rego` and `/a/b/policy.rego`,
//! - `?` matches one non-separator character,
//! - `[abc]`, `[a-z]` and `[!abc]` are character classes,
//! - `{a,b}` is an alternation and `\` escapes the next character.
//!
//! A pattern that starts with neither `/` nor `*` is anchored at the bundle
//! root as if it started with `/`.

use crate::error::{BundleError, Result};
use regex::Regex;
use std::fmt;

/// A compiled path glob.
#[derive(Clone)]
pub struct PathGlob {
    pattern: String,
    regex: Regex,
}

impl PathGlob {
    /// Compiles a glob pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let source = translate(pattern).map_err(|reason| BundleError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        })?;
        let regex = Regex::new(&source).map_err(|e| BundleError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns true if the bundle-relative path matches this glob.
    pub fn is_match(&self, relative_path: &str) -> bool {
        self.regex.is_match(relative_path)
    }
}

impl fmt::Debug for PathGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathGlob").field(&self.pattern).finish()
    }
}

impl PartialEq for PathGlob {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for PathGlob {}

/// Translates a glob into an anchored regular expression.
fn translate(pattern: &str) -> std::result::Result<String, String> {
    if pattern.is_empty() {
        return Err("empty pattern".to_string());
    }

    let mut out = String::from("^");
    let body = if let Some(rest) = pattern.strip_prefix("**") {
        out.push_str(".*");
        rest
    } else if let Some(rest) = pattern.strip_prefix('*') {
        out.push_str(".*");
        rest
    } else if pattern.starts_with('/') {
        pattern
    } else {
        out.push('/');
        pattern
    };

    let chars: Vec<char> = body.chars().collect();
    let mut brace_depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    i += 1;
                    if chars.get(i + 1) == Some(&'/') {
                        i += 1;
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let (class, next) = translate_class(&chars, i)?;
                out.push_str(&class);
                i = next;
                continue;
            }
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            ',' if brace_depth > 0 => out.push('|'),
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| "trailing escape character".to_string())?;
                out.push_str(&regex::escape(&escaped.to_string()));
                i += 1;
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    if brace_depth > 0 {
        return Err("unterminated '{' alternation".to_string());
    }

    out.push('$');
    Ok(out)
}

/// Translates the character class starting at `chars[start] == '['`.
///
/// Returns the regex class and the index just past the closing `]`.
fn translate_class(chars: &[char], start: usize) -> std::result::Result<(String, usize), String> {
    let mut i = start + 1;
    let mut class = String::from("[");

    if matches!(chars.get(i), Some('!') | Some('^')) {
        class.push('^');
        i += 1;
    }

    let first = i;
    loop {
        let c = *chars
            .get(i)
            .ok_or_else(|| "unterminated '[' character class".to_string())?;
        // A `]` right after the opening bracket is a literal.
        if c == ']' && i > first {
            break;
        }
        if c == '-' && i > first && chars.get(i + 1) != Some(&']') {
            class.push('-');
        } else if c.is_ascii_punctuation() {
            class.push('\\');
            class.push(c);
        } else {
            class.push(c);
        }
        i += 1;
    }

    class.push(']');
    Ok((class, i + 1))
}
