//! Token-walk evaluator.
//!
//! Works directly on the read token list rather than the
//! [`DomainAst`](crate::DomainAst), so it accepts every form authors write:
//!
//! - prefix (Polish): `['|', A, B]`, `['&', A, '!', B]`
//! - infix: `[[A, B], '|', C]`
//! - implicit AND: `[A, B, C]`, and any mix the prefix walk can reduce
//!
//! A sequence is read as infix only when it strictly alternates operand,
//! binary operator, operand (operands may carry `!` prefixes). Everything
//! else is walked in prefix order and the top-level results are ANDed, so
//! `[A, '|', B, C]` means `A AND (B OR C)`.

use crate::ast::LogicalOp;
use crate::condition::evaluate_tuple;
use crate::EvaluationError;
use domaineval_core::{Scope, Value};

enum Token<'t> {
    And,
    Or,
    Not,
    Condition {
        field: &'t str,
        operator: &'t Value,
        value: &'t Value,
    },
    Group(&'t [Value]),
    Invalid,
}

fn classify(value: &Value) -> Token<'_> {
    match value {
        Value::String(s) => match s.as_str() {
            "&" => Token::And,
            "|" => Token::Or,
            "!" => Token::Not,
            _ => Token::Invalid,
        },
        Value::Array(items) => match items.as_slice() {
            [Value::String(field), operator, value] if !matches!(field.as_str(), "&" | "|" | "!") => {
                Token::Condition {
                    field,
                    operator,
                    value,
                }
            }
            _ => Token::Group(items),
        },
        _ => Token::Invalid,
    }
}

/// Values the prefix reducer can combine.
pub(crate) trait Connective: Sized {
    fn negate(self) -> Self;
    fn join(op: LogicalOp, left: Self, right: Self) -> Self;
}

impl Connective for bool {
    fn negate(self) -> Self {
        !self
    }

    fn join(op: LogicalOp, left: Self, right: Self) -> Self {
        op.apply(left, right)
    }
}

/// A prefix operator still waiting for operands.
enum Pending<T> {
    Not,
    /// Holds the left operand once it has been reduced.
    Binary(LogicalOp, Option<T>),
}

/// Reduces prefix (Polish) notation one token at a time with an explicit
/// operator stack, so flat operator chains of any length never recurse.
pub(crate) struct PrefixStack<T> {
    pending: Vec<Pending<T>>,
    completed: Vec<T>,
}

impl<T: Connective> PrefixStack<T> {
    pub(crate) fn new() -> Self {
        Self {
            pending: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub(crate) fn push_not(&mut self) {
        self.pending.push(Pending::Not);
    }

    pub(crate) fn push_operator(&mut self, op: LogicalOp) {
        self.pending.push(Pending::Binary(op, None));
    }

    /// Feed an operand to the innermost pending operator until one still
    /// needs its right-hand side, or the top level is reached.
    pub(crate) fn push_operand(&mut self, mut value: T) {
        loop {
            match self.pending.pop() {
                None => {
                    self.completed.push(value);
                    return;
                }
                Some(Pending::Not) => value = value.negate(),
                Some(Pending::Binary(op, None)) => {
                    self.pending.push(Pending::Binary(op, Some(value)));
                    return;
                }
                Some(Pending::Binary(op, Some(left))) => value = T::join(op, left, value),
            }
        }
    }

    /// The completed top-level operands, or the symbol of the innermost
    /// operator that never received all of its operands.
    pub(crate) fn finish(self) -> Result<Vec<T>, &'static str> {
        match self.pending.last() {
            None => Ok(self.completed),
            Some(Pending::Not) => Err("!"),
            Some(Pending::Binary(LogicalOp::And, _)) => Err("&"),
            Some(Pending::Binary(LogicalOp::Or, _)) => Err("|"),
        }
    }
}

/// Reduces a token list to a boolean against one scope.
pub(crate) struct Evaluator<'s, 'a> {
    scope: &'s Scope<'a>,
    max_depth: usize,
}

impl<'s, 'a> Evaluator<'s, 'a> {
    pub(crate) fn new(scope: &'s Scope<'a>, max_depth: usize) -> Self {
        Self { scope, max_depth }
    }

    pub(crate) fn evaluate(&self, tokens: &[Value]) -> Result<bool, EvaluationError> {
        self.sequence(tokens, 0)
    }

    fn check_depth(&self, depth: usize) -> Result<(), EvaluationError> {
        if depth > self.max_depth {
            return Err(EvaluationError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn sequence(&self, tokens: &[Value], depth: usize) -> Result<bool, EvaluationError> {
        self.check_depth(depth)?;
        if is_infix(tokens) {
            self.infix(tokens, depth)
        } else {
            self.prefix(tokens, depth)
        }
    }

    /// Walk a prefix sequence; only bracket nesting recurses. Top-level
    /// results are ANDed.
    fn prefix(&self, tokens: &[Value], depth: usize) -> Result<bool, EvaluationError> {
        let mut stack = PrefixStack::new();
        for token in tokens {
            match classify(token) {
                Token::And => stack.push_operator(LogicalOp::And),
                Token::Or => stack.push_operator(LogicalOp::Or),
                Token::Not => stack.push_not(),
                Token::Condition {
                    field,
                    operator,
                    value,
                } => stack.push_operand(evaluate_tuple(field, operator, value, self.scope)),
                Token::Group(items) => stack.push_operand(self.sequence(items, depth + 1)?),
                Token::Invalid => {
                    return Err(EvaluationError::InvalidToken {
                        token: token.to_string(),
                    });
                }
            }
        }

        let completed = stack.finish().map_err(|symbol| EvaluationError::MissingOperand {
            operator: symbol.to_string(),
        })?;
        Ok(completed.into_iter().all(|value| value))
    }

    fn infix(&self, tokens: &[Value], depth: usize) -> Result<bool, EvaluationError> {
        let (mut result, mut cursor) = self.operand(tokens, 0, depth)?;
        while cursor < tokens.len() {
            let op = match classify(&tokens[cursor]) {
                Token::And => LogicalOp::And,
                Token::Or => LogicalOp::Or,
                _ => {
                    return Err(EvaluationError::InvalidToken {
                        token: tokens[cursor].to_string(),
                    });
                }
            };
            let (rhs, next) = self.operand(tokens, cursor + 1, depth)?;
            result = op.apply(result, rhs);
            cursor = next;
        }
        Ok(result)
    }

    /// An infix operand: any number of `!` followed by a condition or group.
    fn operand(
        &self,
        tokens: &[Value],
        mut cursor: usize,
        depth: usize,
    ) -> Result<(bool, usize), EvaluationError> {
        let mut negate = false;
        while matches!(tokens.get(cursor).map(classify), Some(Token::Not)) {
            negate = !negate;
            cursor += 1;
        }
        let Some(token) = tokens.get(cursor) else {
            return Err(EvaluationError::MissingOperand {
                operator: "!".into(),
            });
        };
        let value = match classify(token) {
            Token::Condition {
                field,
                operator,
                value,
            } => evaluate_tuple(field, operator, value, self.scope),
            Token::Group(items) => self.sequence(items, depth + 1)?,
            _ => {
                return Err(EvaluationError::InvalidToken {
                    token: token.to_string(),
                });
            }
        };
        Ok((value != negate, cursor + 1))
    }
}

/// Strict operand / binary operator / operand alternation with at least one
/// binary operator.
fn is_infix(tokens: &[Value]) -> bool {
    let mut expect_operand = true;
    let mut saw_binary = false;
    for token in tokens {
        match classify(token) {
            Token::Not if expect_operand => {}
            Token::Condition { .. } | Token::Group(_) if expect_operand => expect_operand = false,
            Token::And | Token::Or if !expect_operand => {
                expect_operand = true;
                saw_binary = true;
            }
            _ => return false,
        }
    }
    saw_binary && !expect_operand
}
