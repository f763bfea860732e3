//! Reading expression text into nested values.
//!
//! Pure literals go straight through `serde_json` after translation. Text
//! that mentions context variables is screened by the [`guard`](crate::guard)
//! and then read by a small recursive-descent reader that resolves each bare
//! identifier through the evaluation [`Scope`].

use crate::translate::translate;
use crate::{guard, ParseError};
use domaineval_core::{Scope, Value};
use tracing::debug;

/// Read a domain expression into its top-level list of tokens.
///
/// Empty or whitespace-only input reads as an empty list. References are
/// only accepted when a `scope` is supplied.
pub(crate) fn read_domain(
    expression: &str,
    scope: Option<&Scope<'_>>,
    max_depth: usize,
) -> Result<Vec<Value>, ParseError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return Err(ParseError::NotBracketed {
            expression: expression.to_string(),
        });
    }

    let translated = translate(trimmed);

    let value = match serde_json::from_str::<serde_json::Value>(&translated) {
        Ok(json) => Value::from(json),
        Err(literal_err) => {
            debug!(expression = %trimmed, error = %literal_err, "Not a pure literal, trying references");
            guard::check(trimmed, &translated)?;
            ReferenceReader::new(trimmed, &translated, scope, max_depth).read()?
        }
    };

    if nesting_depth(&value) > max_depth {
        return Err(ParseError::TooDeep { limit: max_depth });
    }

    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ParseError::NotAList {
            expression: expression.to_string(),
        }),
    }
}

fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(nesting_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Recursive-descent reader over translated text with bare identifiers.
struct ReferenceReader<'t, 's, 'a> {
    expression: &'t str,
    src: &'t str,
    pos: usize,
    scope: Option<&'s Scope<'a>>,
    max_depth: usize,
}

impl<'t, 's, 'a> ReferenceReader<'t, 's, 'a> {
    fn new(
        expression: &'t str,
        src: &'t str,
        scope: Option<&'s Scope<'a>>,
        max_depth: usize,
    ) -> Self {
        Self {
            expression,
            src,
            pos: 0,
            scope,
            max_depth,
        }
    }

    fn read(mut self) -> Result<Value, ParseError> {
        let value = self.value(0)?;
        self.skip_ws();
        if self.pos < self.src.len() {
            return Err(self.syntax(format!("trailing characters at offset {}", self.pos)));
        }
        Ok(value)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn syntax(&self, detail: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            expression: self.expression.to_string(),
            detail: detail.into(),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('[') => self.array(depth + 1),
            Some('"') => self.string(),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
            Some(c) => Err(self.syntax(format!("unexpected character '{c}'"))),
            None => Err(self.syntax("unexpected end of expression")),
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, ParseError> {
        if depth > self.max_depth {
            return Err(ParseError::TooDeep {
                limit: self.max_depth,
            });
        }
        self.bump();
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.value(depth)?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                Some(c) => return Err(self.syntax(format!("expected ',' or ']', found '{c}'"))),
                None => return Err(self.syntax("unclosed '['")),
            }
        }
    }

    fn string(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('"') => break,
                Some(_) => {}
                None => return Err(self.syntax("unterminated string literal")),
            }
        }
        serde_json::from_str::<String>(&self.src[start..self.pos])
            .map(Value::String)
            .map_err(|e| self.syntax(e.to_string()))
    }

    fn number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .map(Value::Number)
            .map_err(|_| self.syntax(format!("invalid number: {text}")))
    }

    fn identifier(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.bump();
        }
        let name = &self.src[start..self.pos];
        match name {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" => Ok(Value::Null),
            path => match self.scope {
                Some(scope) => {
                    debug!(reference = %path, "Resolving context reference");
                    Ok(scope.resolve(path))
                }
                None => Err(ParseError::UnboundReference {
                    name: path.to_string(),
                }),
            },
        }
    }
}
