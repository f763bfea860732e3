//! The domain engine facade.
//!
//! Every call re-reads the expression and binds the acting user into the
//! scope; nothing is cached between calls. The three runtime paths absorb
//! errors differently:
//!
//! | operation | on error |
//! |---|---|
//! | [`DomainEngine::evaluate`] | `true` (fail open) |
//! | [`DomainEngine::resolve_domain`] | `[]` (unfiltered) |
//! | [`DomainEngine::safe_evaluate`] | the caller's default |

use crate::ast::{parse_with, DomainAst};
use crate::diagnostics::{Diagnostic, DiagnosticsSink, Operation};
use crate::evaluator::Evaluator;
use crate::reader::read_domain;
use crate::validate::ValidationReport;
use crate::{DomainResult, EvaluationError, ParseError};
use domaineval_core::{Anonymous, Context, IdentitySource, Scope, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default limit on bracket nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Maximum bracket nesting. Flat operator chains do not count.
    pub max_depth: usize,
    /// Reject acting users that did not come from verified claims.
    pub strict_user_context: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_user_context: false,
        }
    }
}

/// Parses and evaluates domain expressions.
///
/// Immutable after construction and safe to share across threads.
pub struct DomainEngine {
    options: EngineOptions,
    identity: Arc<dyn IdentitySource>,
    sinks: Vec<Arc<dyn DiagnosticsSink>>,
}

impl fmt::Debug for DomainEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainEngine")
            .field("options", &self.options)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for DomainEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl DomainEngine {
    /// An engine with no authenticated user and no diagnostics sinks.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            identity: Arc::new(Anonymous),
            sinks: Vec::new(),
        }
    }

    /// Read the acting user from `identity` on every call.
    pub fn with_identity(mut self, identity: Arc<dyn IdentitySource>) -> Self {
        self.identity = identity;
        self
    }

    /// Report absorbed errors to `sink` as well.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // ── Parsing ──────────────────────────────────────────────────────────

    /// Parse an expression into its AST. Context references are errors.
    pub fn parse_expression(&self, expression: &str) -> Result<DomainAst, ParseError> {
        parse_with(expression, None, self.options.max_depth)
    }

    /// Parse an expression, resolving context references against `context`.
    pub fn parse_expression_in(&self, expression: &str, context: &Context) -> DomainResult<DomainAst> {
        let user = self.user_value()?;
        let scope = Scope::new(context, &user);
        Ok(parse_with(expression, Some(&scope), self.options.max_depth)?)
    }

    // ── Evaluation ───────────────────────────────────────────────────────

    /// Evaluate an expression, surfacing any error.
    pub fn try_evaluate(&self, expression: &str, context: &Context) -> DomainResult<bool> {
        if expression.trim().is_empty() {
            return Ok(true);
        }
        let user = self.user_value()?;
        let scope = Scope::new(context, &user);
        let tokens = read_domain(expression, Some(&scope), self.options.max_depth)?;
        let result = Evaluator::new(&scope, self.options.max_depth).evaluate(&tokens)?;
        debug!(expression = %expression, result, "Evaluated domain");
        Ok(result)
    }

    /// Evaluate an expression for field gating.
    ///
    /// Any error yields `true` so a broken expression never hides a field.
    pub fn evaluate(&self, expression: &str, context: &Context) -> bool {
        match self.try_evaluate(expression, context) {
            Ok(result) => result,
            Err(e) => {
                self.report(Operation::Evaluate, expression, &e, "true");
                true
            }
        }
    }

    /// Like [`evaluate`](Self::evaluate), but substitutes `default` on error.
    pub fn safe_evaluate(&self, expression: &str, context: &Context, default: bool) -> bool {
        match self.try_evaluate(expression, context) {
            Ok(result) => result,
            Err(e) => {
                self.report(
                    Operation::SafeEvaluate,
                    expression,
                    &e,
                    &default.to_string(),
                );
                default
            }
        }
    }

    /// Read an expression into a concrete filter list, surfacing any error.
    pub fn try_resolve_domain(&self, expression: &str, context: &Context) -> DomainResult<Vec<Value>> {
        if expression.trim().is_empty() {
            return Ok(Vec::new());
        }
        let user = self.user_value()?;
        let scope = Scope::new(context, &user);
        Ok(read_domain(expression, Some(&scope), self.options.max_depth)?)
    }

    /// Read an expression into a concrete filter list for a relation picker.
    ///
    /// Context references are substituted; nothing is evaluated. Any error
    /// yields an empty list.
    pub fn resolve_domain(&self, expression: &str, context: &Context) -> Vec<Value> {
        match self.try_resolve_domain(expression, context) {
            Ok(domain) => domain,
            Err(e) => {
                self.report(Operation::ResolveDomain, expression, &e, "[]");
                Vec::new()
            }
        }
    }

    // ── Validation ───────────────────────────────────────────────────────

    /// Check an expression for syntax errors and suspicious conditions.
    ///
    /// Context references are accepted and read as `null`.
    pub fn validate_expression(
        &self,
        expression: &str,
        available_fields: Option<&[&str]>,
    ) -> ValidationReport {
        if expression.trim().is_empty() {
            return ValidationReport::valid();
        }
        let empty = Context::new();
        let user = Value::Null;
        let scope = Scope::new(&empty, &user);
        match parse_with(expression, Some(&scope), self.options.max_depth) {
            Ok(ast) => ValidationReport::inspect(&ast, available_fields),
            Err(e) => ValidationReport::invalid(e.to_string()),
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// The value bound to `user`: the acting user, or an empty object.
    fn user_value(&self) -> Result<Value, EvaluationError> {
        match self.identity.current_user() {
            Some(user) => {
                if self.options.strict_user_context {
                    user.verify()?;
                }
                Ok(user.to_value())
            }
            None => Ok(Value::Object(BTreeMap::new())),
        }
    }

    fn report(&self, operation: Operation, expression: &str, err: &dyn fmt::Display, fallback: &str) {
        match operation {
            Operation::SafeEvaluate => {
                warn!(expression = %expression, error = %err, fallback, "Domain evaluation failed, using default");
            }
            _ => {
                error!(operation = %operation, expression = %expression, error = %err, fallback, "Domain expression failed");
            }
        }
        if self.sinks.is_empty() {
            return;
        }
        let diagnostic = Diagnostic::new(operation, expression, err.to_string(), fallback);
        for sink in &self.sinks {
            sink.record(&diagnostic);
        }
    }
}
