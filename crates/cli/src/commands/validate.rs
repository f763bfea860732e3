//! `domaineval validate` — authoring checks for expressions and configured rules.

use super::build_engine;
use domaineval_config::{AppConfig, RuleAttribute};
use domaineval_engine::{DomainEngine, ValidationReport};

/// Validate a single expression, or every enabled rule in the configuration.
pub fn run(
    config: &AppConfig,
    expression: Option<&str>,
    fields: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, _) = build_engine(config, None)?;

    if let Some(expression) = expression {
        let report = check(&engine, expression, fields);
        print_report(&report, "   ");
        if !report.is_valid {
            std::process::exit(1);
        }
        println!("Expression is valid.");
        return Ok(());
    }

    let rules: Vec<_> = config.active_rules().collect();
    if rules.is_empty() {
        println!("No rules configured.");
        println!("\nAdd rules in config.toml:");
        println!("  [[rules]]");
        println!("  name = \"hide_scrap_reason\"");
        println!("  model = \"fleet.vehicle\"");
        println!("  field = \"scrap_reason\"");
        println!("  attribute = \"invisible\"");
        println!("  expression = \"[('status','!=','scrapped')]\"");
        return Ok(());
    }

    println!("Checking {} rule(s):\n", rules.len());
    let mut failed = 0;
    let mut warned = 0;
    for rule in &rules {
        let rule_fields = if rule.fields.is_empty() {
            fields
        } else {
            rule.fields.as_slice()
        };
        let report = check(&engine, &rule.expression, rule_fields);
        let status = if !report.is_valid {
            failed += 1;
            "FAIL"
        } else if !report.warnings.is_empty() {
            warned += 1;
            "WARN"
        } else {
            "OK  "
        };
        println!(
            "  [{status}] {} ({}.{}, {})",
            rule.name,
            rule.model,
            rule.field,
            attribute_name(rule.attribute)
        );
        print_report(&report, "         ");
    }

    println!(
        "\n{} rule(s): {} failed, {} with warnings.",
        rules.len(),
        failed,
        warned
    );
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn check(engine: &DomainEngine, expression: &str, fields: &[String]) -> ValidationReport {
    let names: Vec<&str> = fields.iter().map(String::as_str).collect();
    let available = (!names.is_empty()).then_some(names.as_slice());
    engine.validate_expression(expression, available)
}

fn print_report(report: &ValidationReport, indent: &str) {
    for e in &report.errors {
        println!("{indent}error: {e}");
    }
    for w in &report.warnings {
        println!("{indent}warning: {w}");
    }
}

fn attribute_name(attribute: RuleAttribute) -> &'static str {
    match attribute {
        RuleAttribute::Invisible => "invisible",
        RuleAttribute::Readonly => "readonly",
        RuleAttribute::Required => "required",
        RuleAttribute::Domain => "domain",
    }
}
