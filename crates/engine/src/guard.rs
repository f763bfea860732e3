//! Reference guard.
//!
//! Expressions that are not pure literals (they mention context variables
//! such as `parent_id` or `user.company_id`) must pass this gate before the
//! reference reader sees them. The gate rejects blocklisted substrings and
//! anything outside the literal-plus-identifier shape.

use crate::ParseError;
use regex_lite::Regex;
use std::sync::LazyLock;

/// Substrings that are never accepted in a non-literal expression.
pub const BLOCKED_PATTERNS: [&str; 9] = [
    "function(",
    "eval(",
    "new ",
    "import ",
    "require(",
    "process.",
    "global.",
    "window.",
    "document.",
];

/// JSON string literals in translated text.
static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*""#).expect("string literal pattern is valid")
});

/// Brackets, commas, whitespace, numbers and dotted identifiers only.
static PERMITTED_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[\[\]\s,0-9A-Za-z_.\-]*\]$").expect("shape pattern is valid")
});

/// An identifier directly followed by a bracket: a call or an index.
static CALL_OR_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*\s*\[").expect("call pattern is valid")
});

/// Check that a non-literal expression is safe to read with references.
///
/// `raw` is the caller's text, `translated` the output of
/// [`translate`](crate::translate). Both are screened against the
/// blocklist; the shape checks run on the translated text with string
/// literals blanked out.
pub(crate) fn check(raw: &str, translated: &str) -> Result<(), ParseError> {
    for pattern in BLOCKED_PATTERNS {
        if raw.contains(pattern) || translated.contains(pattern) {
            return Err(ParseError::Unsafe {
                expression: raw.to_string(),
                pattern: pattern.to_string(),
            });
        }
    }

    let skeleton = STRING_LITERAL.replace_all(translated.trim(), "\"\"");
    let skeleton = skeleton.replace("\"\"", "0");

    if !PERMITTED_SHAPE.is_match(&skeleton) || CALL_OR_INDEX.is_match(&skeleton) {
        return Err(ParseError::DisallowedShape {
            expression: raw.to_string(),
        });
    }

    Ok(())
}
