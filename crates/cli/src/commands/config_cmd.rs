//! `domaineval config` — Configuration management commands.

use domaineval_config::{AppConfig, ConfigError};
use std::path::Path;

pub fn validate(loaded: Result<AppConfig, ConfigError>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match loaded {
        Ok(config) => {
            println!("   OK  Config parsed successfully");

            let mut warnings = Vec::new();

            if config.engine.strict_user_context && config.user.is_none() {
                warnings.push(
                    "strict_user_context is on but no [user] is configured; user.* paths resolve to null",
                );
            }
            if !config.engine.safe_default {
                warnings.push("safe_default = false: `eval --safe` hides fields on broken expressions");
            }
            if config.rules.iter().any(|r| r.expression.trim().is_empty()) {
                warnings.push("One or more rules have an empty expression (always true)");
            }

            if warnings.is_empty() {
                println!("   OK  All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   WARN {w}");
                }
            }

            println!();
            println!("   Max depth:   {}", config.engine.max_depth);
            println!("   Strict user: {}", config.engine.strict_user_context);
            println!("   Log level:   {}", config.logging.level);
            println!("   Rules:       {} ({} enabled)", config.rules.len(), config.active_rules().count());
        }
        Err(e) => {
            println!("   FAIL Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn show_defaults() {
    println!("{}", AppConfig::default_toml());
}

pub fn path(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    println!("{}", config_path.display());
    Ok(())
}
