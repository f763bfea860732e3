//! `domaineval eval | resolve | parse` — run an expression from the command line.

use super::{build_engine, parse_context, print_diagnostics};
use domaineval_config::AppConfig;
use domaineval_core::Value;

/// Evaluate an expression and print `true` or `false`.
pub fn eval(
    config: &AppConfig,
    expression: &str,
    context: Option<&str>,
    user: Option<&str>,
    safe: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, sink) = build_engine(config, user)?;
    let record = parse_context(context)?;

    let result = if safe {
        engine.safe_evaluate(expression, &record, config.engine.safe_default)
    } else {
        engine.evaluate(expression, &record)
    };

    print_diagnostics(&sink);
    println!("{result}");
    Ok(())
}

/// Resolve an expression and print the filter list as JSON.
pub fn resolve(
    config: &AppConfig,
    expression: &str,
    context: Option<&str>,
    user: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, sink) = build_engine(config, user)?;
    let record = parse_context(context)?;

    let domain = engine.resolve_domain(expression, &record);

    print_diagnostics(&sink);
    println!("{}", serde_json::to_string(&Value::Array(domain))?);
    Ok(())
}

/// Parse an expression and print its structure; exits 1 on a parse error.
pub fn parse(
    config: &AppConfig,
    expression: &str,
    context: Option<&str>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, _) = build_engine(config, None)?;

    let parsed = match context {
        Some(text) => {
            let record = parse_context(Some(text))?;
            engine.parse_expression_in(expression, &record)
        }
        None => engine.parse_expression(expression).map_err(Into::into),
    };

    match parsed {
        Ok(ast) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ast)?);
            } else {
                println!("{ast}");
                println!(
                    "\n{} group(s), {} condition(s)",
                    ast.groups.len(),
                    ast.conditions().count()
                );
            }
        }
        Err(e) => {
            eprintln!("Parse error: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
