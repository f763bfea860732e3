//! Domain expressions: declarative field gating and relational filters.
//!
//! View metadata attaches small boolean filter expressions to form fields.
//! They decide whether a field is visible, read-only or required, and they
//! narrow the records a relation picker offers:
//!
//! ```text
//! [('status', '=', 'draft')]
//! [('amount', '>', 100), ('state', 'in', ['pending', 'approved'])]
//! [[('status', '=', 'scrapped'), ('user.role.name', '!=', 'admin')], '|', ('is_active', '!=', False)]
//! ['|', ('stage', '=', 'done'), '!', ('owner_id', '=', False)]
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ expression │──▶│ translate  │──▶│ literal read │──▶│  evaluator  │──▶ bool
//! │  (string)  │   │ (py → json)│   │ (+ guarded   │   │ (token walk)│
//! └────────────┘   └────────────┘   │  references) │   └─────────────┘
//!                                   └──────┬───────┘
//!                                          ├──▶ resolve_domain ──▶ filter list
//!                                          └──▶ DomainAst (parse_expression)
//! ```
//!
//! Nothing is ever executed as code: bare identifiers are resolved as context
//! paths after passing the reference guard.

mod ast;
mod condition;
mod diagnostics;
mod engine;
mod evaluator;
mod guard;
mod reader;
mod translate;
mod validate;

pub use ast::{
    parse_expression, Condition, DomainAst, DomainGroup, LogicalOp, Operator,
    SUPPORTED_OPERATORS,
};
pub use condition::{apply_operator, evaluate_condition};
pub use diagnostics::{Diagnostic, DiagnosticsSink, MemorySink, Operation};
pub use engine::{DomainEngine, EngineOptions, DEFAULT_MAX_DEPTH};
pub use guard::BLOCKED_PATTERNS;
pub use translate::translate;
pub use validate::ValidationReport;

use domaineval_core::IdentityError;

/// Re-export for convenience.
pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// Malformed or unsafe expression text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("domain expression must be wrapped in brackets: {expression}")]
    NotBracketed { expression: String },

    #[error("invalid domain expression syntax: {expression} ({detail})")]
    Syntax { expression: String, detail: String },

    #[error("domain expression must be a list: {expression}")]
    NotAList { expression: String },

    #[error("each condition must be a 3-tuple (field, operator, value): {item}")]
    InvalidCondition { item: String },

    #[error("field name must be a string: {field}")]
    FieldNotString { field: String },

    #[error("unsupported operator '{operator}' (supported: =, !=, <, >, <=, >=, in, not in, like, ilike)")]
    UnsupportedOperator { operator: String },

    #[error("number of operators ({operators}) must be one less than number of groups ({groups})")]
    OperatorCount { operators: usize, groups: usize },

    #[error("invalid item in complex expression: {item}")]
    InvalidItem { item: String },

    #[error("logical operator '{operator}' is missing an operand")]
    MissingOperand { operator: String },

    #[error("domain expression contains blocked pattern '{pattern}': {expression}")]
    Unsafe { expression: String, pattern: String },

    #[error("domain expression is not a plain list of literals and field references: {expression}")]
    DisallowedShape { expression: String },

    #[error("reference to '{name}' needs an evaluation context")]
    UnboundReference { name: String },

    #[error("domain expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Failures while reducing a parsed domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("logical operator '{operator}' is missing an operand")]
    MissingOperand { operator: String },

    #[error("unexpected token in domain: {token}")]
    InvalidToken { token: String },

    #[error("domain nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("untrusted user context: {0}")]
    UntrustedUser(#[from] IdentityError),
}

/// Errors from the domain subsystem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}
