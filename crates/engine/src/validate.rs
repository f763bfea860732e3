//! Authoring-time checks for domain expressions.

use crate::ast::DomainAst;
use serde::Serialize;

/// Outcome of [`DomainEngine::validate_expression`](crate::DomainEngine::validate_expression).
///
/// `errors` are fatal (the expression does not parse); `warnings` flag
/// suspicious but evaluable conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    /// Collect warnings for a successfully parsed AST.
    pub(crate) fn inspect(ast: &DomainAst, available_fields: Option<&[&str]>) -> Self {
        let mut report = Self::valid();

        for condition in ast.conditions() {
            if let Some(fields) = available_fields {
                let base = condition.base_field();
                if !fields.contains(&base) {
                    report
                        .warnings
                        .push(format!("Field '{base}' not found in available fields"));
                }
            }

            let op = condition.operator;
            if op.takes_list() && condition.value.as_array().is_none() {
                report.warnings.push(format!(
                    "Operator '{op}' expects a list value, got {}",
                    condition.value.type_name()
                ));
            }
            if op.takes_pattern() && condition.value.as_str().is_none() {
                report.warnings.push(format!(
                    "Operator '{op}' expects a string value, got {}",
                    condition.value.type_name()
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_expression;

    #[test]
    fn clean_expression_has_no_warnings() {
        let ast = parse_expression("[('state','in',['a','b']),('name','ilike','%x%')]").unwrap();
        let report = ValidationReport::inspect(&ast, Some(&["state", "name"]));
        assert!(report.is_valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn unknown_fields_are_warnings() {
        let ast = parse_expression("[('partner_id.name','=','x'),('ghost','=',1)]").unwrap();
        let report = ValidationReport::inspect(&ast, Some(&["partner_id"]));
        assert!(report.is_valid);
        assert_eq!(
            report.warnings,
            vec!["Field 'ghost' not found in available fields".to_string()]
        );
    }

    #[test]
    fn field_check_skipped_without_field_list() {
        let ast = parse_expression("[('ghost','=',1)]").unwrap();
        assert!(ValidationReport::inspect(&ast, None).warnings.is_empty());
    }

    #[test]
    fn operator_value_mismatches_are_warnings() {
        let ast = parse_expression("[('a','in',5),('b','like',3)]").unwrap();
        let report = ValidationReport::inspect(&ast, None);
        assert_eq!(
            report.warnings,
            vec![
                "Operator 'in' expects a list value, got number".to_string(),
                "Operator 'like' expects a string value, got number".to_string(),
            ]
        );
    }
}
