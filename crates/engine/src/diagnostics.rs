//! Diagnostics channel for swallowed expression errors.
//!
//! `evaluate`, `resolve_domain` and `safe_evaluate` never surface errors to
//! their callers. Each failure they absorb is recorded here instead, so
//! metadata authors can find broken expressions without the form breaking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// The engine operation that absorbed an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Evaluate,
    ResolveDomain,
    SafeEvaluate,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Evaluate => write!(f, "evaluate"),
            Operation::ResolveDomain => write!(f, "resolve_domain"),
            Operation::SafeEvaluate => write!(f, "safe_evaluate"),
        }
    }
}

/// One absorbed failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub expression: String,
    pub message: String,
    /// What the caller received instead (`true`, `false` or `[]`).
    pub fallback: String,
}

impl Diagnostic {
    pub fn new(
        operation: Operation,
        expression: &str,
        message: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            expression: expression.to_string(),
            message: message.into(),
            fallback: fallback.into(),
        }
    }
}

/// Where diagnostics are written.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, diagnostic: &Diagnostic);
}

/// Bounded in-memory log. When full, the oldest tenth is dropped.
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
    capacity: usize,
}

impl std::fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySink")
            .field("entry_count", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All stored diagnostics, oldest first.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    pub fn by_operation(&self, operation: Operation) -> Vec<Diagnostic> {
        self.lock()
            .iter()
            .filter(|d| d.operation == operation)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&self, diagnostic: &Diagnostic) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            let drain = (self.capacity / 10).max(1);
            entries.drain(..drain);
        }
        entries.push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(op: Operation, expr: &str) -> Diagnostic {
        Diagnostic::new(op, expr, "boom", "true")
    }

    #[test]
    fn records_and_filters() {
        let sink = MemorySink::default();
        sink.record(&diag(Operation::Evaluate, "[x"));
        sink.record(&diag(Operation::ResolveDomain, "[y"));
        sink.record(&diag(Operation::Evaluate, "[z"));

        assert_eq!(sink.len(), 3);
        let evals = sink.by_operation(Operation::Evaluate);
        assert_eq!(evals.len(), 2);
        assert_eq!(evals[1].expression, "[z");

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn drops_oldest_tenth_when_full() {
        let sink = MemorySink::new(20);
        for i in 0..21 {
            sink.record(&diag(Operation::Evaluate, &i.to_string()));
        }
        let entries = sink.entries();
        assert_eq!(entries.len(), 19);
        assert_eq!(entries[0].expression, "2");
        assert_eq!(entries.last().unwrap().expression, "20");
    }

    #[test]
    fn operation_serializes_snake_case() {
        let json = serde_json::to_string(&Operation::ResolveDomain).unwrap();
        assert_eq!(json, "\"resolve_domain\"");
    }
}
