//! Structured form of a domain expression.
//!
//! A domain is either a single group of conditions joined by implicit AND
//! (the *simple* form) or a sequence of groups joined by explicit `&` / `|`
//! tokens (the *complex* form):
//!
//! ```text
//! simple:  [('a', '=', 1), ('b', '>', 2)]
//! complex: [[('a', '=', 1), ('b', '>', 2)], '|', ('c', '!=', False)]
//! prefix:  ['&', ('a', '=', 1), '|', ('b', '>', 2), ('c', '!=', False)]
//! ```
//!
//! Complex domains that alternate group and operator fold left to right.
//! Any other order is read as prefix notation, the same way the engine's
//! token walk reads it.

use crate::condition::evaluate_condition;
use crate::evaluator::{Connective, PrefixStack};
use crate::reader::read_domain;
use crate::{ParseError, DEFAULT_MAX_DEPTH};
use domaineval_core::{Scope, Value};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Every comparison operator a condition may use.
pub const SUPPORTED_OPERATORS: [&str; 10] = [
    "=", "!=", "<", ">", "<=", ">=", "in", "not in", "like", "ilike",
];

const AND_TOKEN: &str = "&";
const OR_TOKEN: &str = "|";
const NOT_TOKEN: &str = "!";

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    NotIn,
    Like,
    Ilike,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
        }
    }

    /// Whether the operator expects a list on the right-hand side.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Whether the operator expects a pattern string.
    pub fn takes_pattern(self) -> bool {
        matches!(self, Operator::Like | Operator::Ilike)
    }
}

impl FromStr for Operator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "like" => Operator::Like,
            "ilike" => Operator::Ilike,
            other => {
                return Err(ParseError::UnsupportedOperator {
                    operator: other.to_string(),
                });
            }
        })
    }
}

impl From<Operator> for &'static str {
    fn from(op: Operator) -> Self {
        op.as_str()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary connective between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn apply(self, left: bool, right: bool) -> bool {
        match self {
            LogicalOp::And => left && right,
            LogicalOp::Or => left || right,
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => f.write_str("AND"),
            LogicalOp::Or => f.write_str("OR"),
        }
    }
}

/// A leaf predicate: `(field, operator, value)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    /// Dotted path into the evaluation scope.
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Build a condition from a parsed `[field, operator, value]` item.
    pub fn from_item(item: &Value) -> Result<Self, ParseError> {
        let parts = match item.as_array() {
            Some(parts) if parts.len() == 3 => parts,
            _ => {
                return Err(ParseError::InvalidCondition {
                    item: item.to_string(),
                });
            }
        };

        let field = parts[0].as_str().ok_or_else(|| ParseError::FieldNotString {
            field: parts[0].to_string(),
        })?;
        let operator = match parts[1].as_str() {
            Some(op) => op.parse::<Operator>()?,
            None => {
                return Err(ParseError::UnsupportedOperator {
                    operator: parts[1].to_string(),
                });
            }
        };

        Ok(Self {
            field: field.to_string(),
            operator,
            value: parts[2].clone(),
        })
    }

    /// The first segment of the field path.
    pub fn base_field(&self) -> &str {
        self.field.split('.').next().unwrap_or(&self.field)
    }

    pub fn evaluate(&self, scope: &Scope<'_>) -> bool {
        evaluate_condition(self, scope)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "('{}', '{}', {})", self.field, self.operator, self.value)
    }
}

/// Conditions joined by implicit AND, optionally negated with a leading `!`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainGroup {
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub negated: bool,
}

impl DomainGroup {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            negated: false,
        }
    }

    pub fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let all = self.conditions.iter().all(|c| c.evaluate(scope));
        all != self.negated
    }

    fn from_item(item: &Value) -> Result<Self, ParseError> {
        let items = match item.as_array() {
            Some(items) if !items.is_empty() => items,
            _ => {
                return Err(ParseError::InvalidItem {
                    item: item.to_string(),
                });
            }
        };
        if is_condition_shaped(item) {
            return Ok(Self::new(vec![Condition::from_item(item)?]));
        }
        let conditions = items
            .iter()
            .map(Condition::from_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(conditions))
    }
}

impl fmt::Display for DomainGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("NOT (")?;
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{condition}")?;
        }
        if self.negated {
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// One item of a complex domain, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Op(LogicalOp),
    /// A `!` in front of an operator; `!` in front of a group is folded into
    /// [`DomainGroup::negated`].
    Not,
    Group(usize),
}

/// A parsed domain: `groups` joined by `operators`.
///
/// `operators.len() == groups.len() - 1` whenever there is at least one
/// group. An AST with no groups always evaluates to `true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainAst {
    pub groups: Vec<DomainGroup>,
    pub operators: Vec<LogicalOp>,
    #[serde(skip)]
    steps: Vec<Step>,
}

impl DomainAst {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every condition in source order.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.groups.iter().flat_map(|g| g.conditions.iter())
    }

    /// Build the AST from the top-level items of a read domain.
    pub fn from_items(items: &[Value]) -> Result<Self, ParseError> {
        if items.is_empty() {
            return Ok(Self::default());
        }

        let complex = items
            .iter()
            .any(|item| logical_token(item).is_some() || (item.as_array().is_some() && !is_condition_shaped(item)));

        if complex {
            debug!(items = items.len(), "Parsing complex domain");
            Self::complex(items)
        } else {
            debug!(items = items.len(), "Parsing simple domain");
            let conditions = items
                .iter()
                .map(Condition::from_item)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Self {
                groups: vec![DomainGroup::new(conditions)],
                operators: Vec::new(),
                steps: vec![Step::Group(0)],
            })
        }
    }

    fn complex(items: &[Value]) -> Result<Self, ParseError> {
        let mut groups = Vec::new();
        let mut operators = Vec::new();
        let mut steps = Vec::new();
        let mut negate_next = false;

        for item in items {
            let op = match logical_token(item) {
                Some(AND_TOKEN) => LogicalOp::And,
                Some(OR_TOKEN) => LogicalOp::Or,
                Some(_) => {
                    negate_next = !negate_next;
                    continue;
                }
                None => {
                    let mut group = DomainGroup::from_item(item)?;
                    group.negated = negate_next;
                    negate_next = false;
                    steps.push(Step::Group(groups.len()));
                    groups.push(group);
                    continue;
                }
            };
            if negate_next {
                steps.push(Step::Not);
                negate_next = false;
            }
            operators.push(op);
            steps.push(Step::Op(op));
        }

        if negate_next {
            return Err(ParseError::InvalidItem {
                item: format!("'{NOT_TOKEN}' without a following group"),
            });
        }
        if operators.len() + 1 != groups.len() {
            return Err(ParseError::OperatorCount {
                operators: operators.len(),
                groups: groups.len(),
            });
        }

        let ast = Self {
            groups,
            operators,
            steps,
        };
        if ast.is_prefix() {
            ast.check_prefix()?;
        }
        Ok(ast)
    }

    /// Whether the groups were written in prefix order rather than
    /// alternating with their operators.
    pub fn is_prefix(&self) -> bool {
        !self.steps.iter().enumerate().all(|(i, step)| {
            matches!((i % 2, step), (0, Step::Group(_)) | (1, Step::Op(_)))
        })
    }

    fn check_prefix(&self) -> Result<(), ParseError> {
        let mut stack = PrefixStack::new();
        for step in &self.steps {
            match step {
                Step::Op(op) => stack.push_operator(*op),
                Step::Not => stack.push_not(),
                Step::Group(_) => stack.push_operand(true),
            }
        }
        stack
            .finish()
            .map(|_| ())
            .map_err(|symbol| ParseError::MissingOperand {
                operator: symbol.to_string(),
            })
    }

    /// Reduce prefix-ordered steps, mapping each group with `operand`.
    /// `None` when the groups no longer match the parsed steps.
    fn reduce<T: Connective>(&self, operand: impl Fn(&DomainGroup) -> T) -> Option<T> {
        let mut stack = PrefixStack::new();
        for step in &self.steps {
            match step {
                Step::Op(op) => stack.push_operator(*op),
                Step::Not => stack.push_not(),
                Step::Group(idx) => stack.push_operand(operand(self.groups.get(*idx)?)),
            }
        }
        let mut completed = stack.finish().ok()?;
        if completed.len() == 1 {
            completed.pop()
        } else {
            None
        }
    }

    /// Evaluate the groups with the recorded operators: left to right for
    /// alternating domains, operator-first for prefix ones.
    pub fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let Some((first, rest)) = self.groups.split_first() else {
            return true;
        };
        if self.is_prefix() {
            return self.reduce(|group| group.evaluate(scope)).unwrap_or(false);
        }
        rest.iter()
            .zip(&self.operators)
            .fold(first.evaluate(scope), |acc, (group, op)| {
                op.apply(acc, group.evaluate(scope))
            })
    }
}

impl Connective for String {
    fn negate(self) -> Self {
        format!("NOT {self}")
    }

    fn join(op: LogicalOp, left: Self, right: Self) -> Self {
        format!("({left} {op} {right})")
    }
}

impl fmt::Display for DomainAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((first, rest)) = self.groups.split_first() else {
            return f.write_str("TRUE");
        };
        if rest.is_empty() {
            return write!(f, "{first}");
        }
        if self.is_prefix() {
            if let Some(formula) = self.reduce(|group| format!("({group})")) {
                return f.write_str(&formula);
            }
        }
        write!(f, "(({first})")?;
        for (group, op) in rest.iter().zip(&self.operators) {
            write!(f, " {op} ({group})")?;
        }
        f.write_str(")")
    }
}

/// Parse an expression into its AST.
///
/// Context references are rejected with [`ParseError::UnboundReference`];
/// use [`DomainEngine::parse_expression_in`](crate::DomainEngine::parse_expression_in)
/// to parse against a record.
pub fn parse_expression(expression: &str) -> Result<DomainAst, ParseError> {
    parse_with(expression, None, DEFAULT_MAX_DEPTH)
}

pub(crate) fn parse_with(
    expression: &str,
    scope: Option<&Scope<'_>>,
    max_depth: usize,
) -> Result<DomainAst, ParseError> {
    let items = read_domain(expression, scope, max_depth)?;
    DomainAst::from_items(&items)
}

/// `&`, `|` or `!` when the value is one of the logical tokens.
pub(crate) fn logical_token(value: &Value) -> Option<&'static str> {
    match value.as_str()? {
        AND_TOKEN => Some(AND_TOKEN),
        OR_TOKEN => Some(OR_TOKEN),
        NOT_TOKEN => Some(NOT_TOKEN),
        _ => None,
    }
}

/// A three-element array whose first element is a non-logical string.
pub(crate) fn is_condition_shaped(value: &Value) -> bool {
    match value.as_array() {
        Some([field, _, _]) => field.as_str().is_some() && logical_token(field).is_none(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domaineval_core::Context;

    const GROUP1: &str = "[('a','=',1),('b','=',2)]";
    const GROUP2: &str = "[('c','>',3)]";
    const GROUP3: &str = "('d','!=',False)";

    #[test]
    fn empty_expression_has_no_groups() {
        assert!(parse_expression("").unwrap().is_empty());
        assert!(parse_expression("  \t ").unwrap().is_empty());
    }

    #[test]
    fn simple_form_is_one_group() {
        let ast = parse_expression("[('status','=','draft'),('amount','>',100)]").unwrap();
        assert_eq!(ast.groups.len(), 1);
        assert!(ast.operators.is_empty());
        assert_eq!(
            ast.groups[0].conditions[1],
            Condition::new("amount", Operator::Gt, 100)
        );
    }

    #[test]
    fn operator_count_two_groups_one_or() {
        let ast = parse_expression(&format!("[{GROUP1}, '|', {GROUP2}]")).unwrap();
        assert_eq!(ast.groups.len(), 2);
        assert_eq!(ast.operators, vec![LogicalOp::Or]);
    }

    #[test]
    fn operator_count_missing_operator_is_error() {
        let err = parse_expression(&format!("[{GROUP1}, {GROUP2}]")).unwrap_err();
        assert_eq!(
            err,
            ParseError::OperatorCount {
                operators: 0,
                groups: 2
            }
        );
    }

    #[test]
    fn operator_count_three_groups_two_ors() {
        let ast = parse_expression(&format!("[{GROUP1}, '|', {GROUP2}, '|', {GROUP3}]")).unwrap();
        assert_eq!(ast.groups.len(), 3);
        assert_eq!(ast.operators, vec![LogicalOp::Or, LogicalOp::Or]);
        assert_eq!(ast.groups[2].conditions.len(), 1);
    }

    #[test]
    fn negation_marks_next_group() {
        let ast = parse_expression("[('a','=',1), '&', '!', ('b','=',2)]").unwrap();
        assert!(!ast.groups[0].negated);
        assert!(ast.groups[1].negated);
    }

    #[test]
    fn dangling_negation_is_error() {
        assert!(matches!(
            parse_expression("[('a','=',1), '!']"),
            Err(ParseError::InvalidItem { .. })
        ));
    }

    #[test]
    fn unsupported_operator_is_error() {
        assert_eq!(
            parse_expression("[('a','~',1)]"),
            Err(ParseError::UnsupportedOperator {
                operator: "~".into()
            })
        );
        assert!(matches!(
            parse_expression("[('a',1,1)]"),
            Err(ParseError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn malformed_conditions_are_errors() {
        assert!(matches!(
            parse_expression("['status']"),
            Err(ParseError::InvalidCondition { .. })
        ));
        assert!(matches!(
            parse_expression("[(1,'=',1)]"),
            Err(ParseError::InvalidCondition { .. }) | Err(ParseError::FieldNotString { .. })
        ));
        assert!(matches!(
            parse_expression("[[('a','=',1)], '|', 42]"),
            Err(ParseError::InvalidItem { .. })
        ));
    }

    #[test]
    fn all_supported_operators_parse() {
        for op in SUPPORTED_OPERATORS {
            let parsed: Operator = op.parse().unwrap();
            assert_eq!(parsed.as_str(), op);
        }
    }

    #[test]
    fn display_reads_like_a_formula() {
        let ast = parse_expression("[[('a','=','x'),('b','>',1)], '|', ('c','!=',False)]").unwrap();
        assert_eq!(
            ast.to_string(),
            "((('a', '=', 'x') AND ('b', '>', 1)) OR (('c', '!=', false)))"
        );
        assert_eq!(parse_expression("").unwrap().to_string(), "TRUE");
    }

    #[test]
    fn ast_evaluates_left_to_right() {
        let ast = parse_expression("[('a','=',1), '|', ('b','=',2), '&', ('c','=',3)]").unwrap();
        let user = Value::Null;

        // (a=1 OR b=2) AND c=3
        let ctx = Context::new().with("a", 1).with("b", 0).with("c", 0);
        assert!(!ast.evaluate(&Scope::new(&ctx, &user)));
        let ctx = Context::new().with("a", 1).with("b", 0).with("c", 3);
        assert!(ast.evaluate(&Scope::new(&ctx, &user)));
    }

    #[test]
    fn prefix_domain_keeps_operator_precedence() {
        let expr = "['&', ('a','=',1), '|', ('b','=',1), ('c','=',1)]";
        let ast = parse_expression(expr).unwrap();
        assert!(ast.is_prefix());
        assert_eq!(ast.operators, vec![LogicalOp::And, LogicalOp::Or]);

        let user = Value::Null;
        // a AND (b OR c)
        let ctx = Context::new().with("a", 0).with("b", 0).with("c", 1);
        assert!(!ast.evaluate(&Scope::new(&ctx, &user)));
        let ctx = Context::new().with("a", 1).with("b", 0).with("c", 1);
        assert!(ast.evaluate(&Scope::new(&ctx, &user)));

        assert_eq!(
            ast.to_string(),
            "((('a', '=', 1)) AND ((('b', '=', 1)) OR (('c', '=', 1))))"
        );
    }

    #[test]
    fn prefix_negation_applies_to_the_whole_operation() {
        let ast = parse_expression("['!', '|', ('a','=',1), ('b','=',1)]").unwrap();
        assert!(ast.groups.iter().all(|g| !g.negated));

        let user = Value::Null;
        let ctx = Context::new().with("a", 0).with("b", 1);
        assert!(!ast.evaluate(&Scope::new(&ctx, &user)));
        let ctx = Context::new().with("a", 0).with("b", 0);
        assert!(ast.evaluate(&Scope::new(&ctx, &user)));
        assert!(ast.to_string().starts_with("NOT ("));
    }

    #[test]
    fn unfinished_prefix_operator_is_error() {
        assert_eq!(
            parse_expression("[('a','=',1), ('b','=',1), '|']"),
            Err(ParseError::MissingOperand {
                operator: "|".into()
            })
        );
    }

    #[test]
    fn alternating_domain_is_not_prefix() {
        let ast = parse_expression(&format!("[{GROUP1}, '|', {GROUP2}]")).unwrap();
        assert!(!ast.is_prefix());
        assert!(!parse_expression(GROUP1).unwrap().is_prefix());
        assert!(!parse_expression("").unwrap().is_prefix());
    }

    #[test]
    fn base_field_is_first_segment() {
        let c = Condition::new("user.role.name", Operator::Eq, "admin");
        assert_eq!(c.base_field(), "user");
    }
}
