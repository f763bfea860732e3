//! End-to-end integration tests for domaineval.
//!
//! These tests exercise the full pipeline from configuration and expression
//! text to evaluation results, plus the `domaineval` binary itself.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use domaineval_config::AppConfig;
use domaineval_core::{Context, SessionIdentity, StaticIdentity, UserContext, Value};
use domaineval_engine::{
    DomainEngine, EngineOptions, MemorySink, Operation, ParseError, parse_expression,
};
use serde_json::json;

// ── Helpers ──────────────────────────────────────────────────────────────

fn record(json: serde_json::Value) -> Context {
    Context::from_json(json)
}

fn engine_from(config: &AppConfig) -> (DomainEngine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new(config.engine.diagnostics_capacity));
    let mut engine = DomainEngine::new(EngineOptions {
        max_depth: config.engine.max_depth,
        strict_user_context: config.engine.strict_user_context,
    })
    .with_sink(sink.clone());
    if let Some(user) = config.acting_user().unwrap() {
        engine = engine.with_identity(Arc::new(StaticIdentity(user)));
    }
    (engine, sink)
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn run_cli(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_domaineval"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("DOMAINEVAL_LOG_LEVEL")
        .env_remove("DOMAINEVAL_LOG_FORMAT")
        .env_remove("DOMAINEVAL_STRICT_USER")
        .env("RUST_LOG", "off")
        .output()
        .expect("binary runs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

const FLEET_CONFIG: &str = r#"
[engine]
strict_user_context = true

[user]
user_id = 7
email = "ops@example.com"
role = "fleet_manager"
company_id = 3

[[rules]]
name = "hide_scrap_reason"
model = "fleet.vehicle"
field = "scrap_reason"
attribute = "invisible"
expression = "[('status','!=','scrapped')]"
fields = ["status", "scrap_reason"]

[[rules]]
name = "driver_filter"
model = "fleet.trip"
field = "driver_id"
attribute = "domain"
expression = "[('company_id','=',user.company_id),('active','=',True)]"
"#;

// ── E2E: Gating scenarios ────────────────────────────────────────────────

#[test]
fn e2e_simple_and_scenario() {
    let engine = DomainEngine::default();
    let ctx = record(json!({"role": "admin", "active": true}));
    assert!(engine.evaluate("[('role','=','admin'),('active','!=',false)]", &ctx));

    let ctx = record(json!({"role": "admin", "active": false}));
    assert!(!engine.evaluate("[('role','=','admin'),('active','!=',false)]", &ctx));
}

#[test]
fn e2e_grouped_or_scenario() {
    let engine = DomainEngine::default();
    let expr = "[[('status','=','scrapped'),('owner','!=','root')],'|',('flag','=',false)]";

    let ctx = record(json!({"status": "scrapped", "owner": "alice", "flag": 0}));
    assert!(engine.evaluate(expr, &ctx));

    let ctx = record(json!({"status": "active", "owner": "alice", "flag": 1}));
    assert!(!engine.evaluate(expr, &ctx));
}

#[test]
fn e2e_user_role_follows_session() {
    let session = Arc::new(SessionIdentity::new());
    let engine = DomainEngine::default().with_identity(session.clone());
    let expr = "[('user.role.name','=','admin')]";
    let ctx = Context::new();

    assert!(!engine.evaluate(expr, &ctx));

    let admin = UserContext::from_claims(&json!({
        "user_id": 1, "email": "a@example.com", "role": "admin"
    }))
    .unwrap();
    session.sign_in(admin);
    assert!(engine.evaluate(expr, &ctx));

    let no_role: UserContext = serde_json::from_value(json!({"id": 2, "role": {"name": null}})).unwrap();
    session.sign_in(no_role);
    assert!(!engine.evaluate(expr, &ctx));

    session.sign_out();
    assert!(!engine.evaluate(expr, &ctx));
}

#[test]
fn e2e_odoo_prefix_domain() {
    let engine = DomainEngine::default();
    let expr = "['|', ('stage','=','done'), '!', ('owner_id','=',False)]";

    assert!(engine.evaluate(expr, &record(json!({"stage": "done"}))));
    assert!(engine.evaluate(
        expr,
        &record(json!({"stage": "draft", "owner_id": {"id": 4, "display_name": "Ann"}}))
    ));
    assert!(!engine.evaluate(
        expr,
        &record(json!({"stage": "draft", "owner_id": {"id": null}}))
    ));
}

// ── E2E: Failure policy ──────────────────────────────────────────────────

#[test]
fn e2e_fail_open_fail_closed_asymmetry() {
    let sink = Arc::new(MemorySink::default());
    let engine = DomainEngine::default().with_sink(sink.clone());
    let ctx = Context::new();
    let broken = "[('a','=',window.location)]";

    assert!(engine.evaluate(broken, &ctx));
    assert!(engine.resolve_domain(broken, &ctx).is_empty());
    assert!(!engine.safe_evaluate(broken, &ctx, false));

    assert_eq!(sink.by_operation(Operation::Evaluate).len(), 1);
    assert_eq!(sink.by_operation(Operation::ResolveDomain).len(), 1);
    assert_eq!(sink.by_operation(Operation::SafeEvaluate).len(), 1);
}

#[test]
fn e2e_dangerous_patterns_never_evaluate() {
    for expr in [
        "[('a','=',eval('x'))]",
        "[('a','=',function(){return 1})]",
        "[('a','=',document.cookie)]",
        "[('a','=',require('fs'))]",
        "[('a','=',process.exit)]",
        "[('a','=',global.x)]",
    ] {
        assert!(
            matches!(parse_expression(expr), Err(ParseError::Unsafe { .. })),
            "{expr} must be rejected"
        );
    }
}

// ── E2E: Configured rules ────────────────────────────────────────────────

#[test]
fn e2e_config_drives_engine() {
    let file = write_config(FLEET_CONFIG);
    let config = AppConfig::load_from(file.path()).unwrap();
    let (engine, sink) = engine_from(&config);

    let driver_rule = config.rules.iter().find(|r| r.name == "driver_filter").unwrap();
    let domain = engine.resolve_domain(&driver_rule.expression, &Context::new());
    assert_eq!(
        serde_json::to_value(Value::Array(domain)).unwrap(),
        json!([["company_id", "=", 3], ["active", "=", true]])
    );

    let hide = config.rules.iter().find(|r| r.name == "hide_scrap_reason").unwrap();
    assert!(!engine.evaluate(&hide.expression, &record(json!({"status": "scrapped"}))));
    assert!(engine.evaluate(&hide.expression, &record(json!({"status": "active"}))));
    assert!(sink.is_empty());
}

#[test]
fn e2e_validate_configured_rules() {
    let file = write_config(FLEET_CONFIG);
    let config = AppConfig::load_from(file.path()).unwrap();
    let engine = DomainEngine::default();

    for rule in config.active_rules() {
        let fields: Vec<&str> = rule.fields.iter().map(String::as_str).collect();
        let available = (!fields.is_empty()).then_some(fields.as_slice());
        let report = engine.validate_expression(&rule.expression, available);
        assert!(report.is_valid, "{}: {:?}", rule.name, report.errors);
        assert!(report.warnings.is_empty(), "{}: {:?}", rule.name, report.warnings);
    }
}

// ── E2E: Binary ──────────────────────────────────────────────────────────

#[test]
fn e2e_cli_eval_and_resolve() {
    let file = write_config(FLEET_CONFIG);

    let out = run_cli(
        file.path(),
        &[
            "eval",
            "[('status','=','draft'),('amount','>',100)]",
            "--context",
            r#"{"status":"draft","amount":250}"#,
        ],
    );
    assert!(out.status.success());
    assert_eq!(stdout(&out), "true");

    let out = run_cli(
        file.path(),
        &["resolve", "[('company_id','=',user.company_id)]"],
    );
    assert!(out.status.success());
    assert_eq!(stdout(&out), r#"[["company_id","=",3]]"#);
}

#[test]
fn e2e_cli_eval_fails_open() {
    let file = write_config(FLEET_CONFIG);
    let out = run_cli(file.path(), &["eval", "[('a','=',eval('1'))]"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "true");
    assert!(String::from_utf8_lossy(&out.stderr).contains("evaluate failed"));
}

#[test]
fn e2e_cli_parse_reports_errors() {
    let file = write_config(FLEET_CONFIG);

    let out = run_cli(file.path(), &["parse", "[('a','=',1)], '|', ('b','=',2)]"]);
    assert!(!out.status.success());

    let out = run_cli(file.path(), &["parse", "[[('a','=',1)], [('b','=',2)]]"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("number of operators"));

    let out = run_cli(file.path(), &["parse", "[('a','=',1), '|', ('b','=',2)]"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("OR"));
}

#[test]
fn e2e_cli_validate_rules() {
    let file = write_config(FLEET_CONFIG);
    let out = run_cli(file.path(), &["validate"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("2 rule(s): 0 failed"));

    let out = run_cli(file.path(), &["validate", "[('ghost','=',1)]", "--fields", "a,b"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Field 'ghost' not found"));

    let out = run_cli(file.path(), &["validate", "[('a','regex','x')]"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn e2e_cli_config_defaults_round_trip() {
    let file = write_config(FLEET_CONFIG);
    let out = run_cli(file.path(), &["config", "show", "--defaults"]);
    assert!(out.status.success());

    let defaults = write_config(&String::from_utf8_lossy(&out.stdout));
    let config = AppConfig::load_from(defaults.path()).unwrap();
    assert_eq!(config.engine.max_depth, 64);
    assert!(config.rules.is_empty());
    assert!(config.user.is_none());
}
