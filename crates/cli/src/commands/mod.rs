//! Subcommand implementations.

pub mod config_cmd;
pub mod eval;
pub mod validate;

use domaineval_config::AppConfig;
use domaineval_core::{Context, StaticIdentity, UserContext};
use domaineval_engine::{DomainEngine, EngineOptions, MemorySink};
use std::sync::Arc;

/// Build an engine from configuration, with an optional user override.
///
/// Absorbed errors land in the returned sink so commands can print them.
pub(crate) fn build_engine(
    config: &AppConfig,
    user_json: Option<&str>,
) -> Result<(DomainEngine, Arc<MemorySink>), Box<dyn std::error::Error>> {
    let options = EngineOptions {
        max_depth: config.engine.max_depth,
        strict_user_context: config.engine.strict_user_context,
    };
    let sink = Arc::new(MemorySink::new(config.engine.diagnostics_capacity));
    let mut engine = DomainEngine::new(options).with_sink(sink.clone());

    let user = match user_json {
        Some(text) => {
            let claims: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| format!("--user is not valid JSON: {e}"))?;
            Some(UserContext::from_claims(&claims)?)
        }
        None => config.acting_user()?,
    };
    if let Some(user) = user {
        tracing::debug!(email = ?user.email, "Acting as configured user");
        engine = engine.with_identity(Arc::new(StaticIdentity(user)));
    }

    Ok((engine, sink))
}

/// Parse a `--context` argument into a record context.
pub(crate) fn parse_context(text: Option<&str>) -> Result<Context, Box<dyn std::error::Error>> {
    let Some(text) = text else {
        return Ok(Context::new());
    };
    Context::parse(text).map_err(|e| format!("--context: {e}").into())
}

/// Print absorbed errors to stderr.
pub(crate) fn print_diagnostics(sink: &MemorySink) {
    for d in sink.entries() {
        eprintln!("warning: {} failed ({}), returned {}", d.operation, d.message, d.fallback);
    }
}
