//! domaineval CLI — the main entry point.
//!
//! Commands:
//! - `eval`     — Evaluate an expression against a record
//! - `resolve`  — Resolve an expression into a filter list
//! - `parse`    — Show the parsed structure of an expression
//! - `validate` — Check one expression, or every configured rule
//! - `config`   — Show, locate or validate the configuration

use clap::{Parser, Subcommand};
use domaineval_config::{AppConfig, ConfigError, LogFormat, LoggingConfig};
use std::path::{Path, PathBuf};

mod commands;

#[derive(Parser)]
#[command(
    name = "domaineval",
    about = "domaineval — domain expressions for metadata-driven forms",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.domaineval/config.toml
    #[arg(short, long, global = true, env = "DOMAINEVAL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression to true or false
    Eval {
        /// The domain expression, e.g. "[('status','=','draft')]"
        expression: String,

        /// Record field values as a JSON object
        #[arg(long)]
        context: Option<String>,

        /// Acting user's token claims as a JSON object (overrides [user])
        #[arg(long)]
        user: Option<String>,

        /// Substitute engine.safe_default instead of failing open
        #[arg(long)]
        safe: bool,
    },

    /// Resolve an expression into a JSON filter list
    Resolve {
        expression: String,

        #[arg(long)]
        context: Option<String>,

        #[arg(long)]
        user: Option<String>,
    },

    /// Parse an expression and print its structure
    Parse {
        expression: String,

        /// Resolve context references against this JSON record
        #[arg(long)]
        context: Option<String>,

        /// Print the AST as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate one expression, or every configured rule when omitted
    Validate {
        expression: Option<String>,

        /// Comma-separated field names the expression may reference
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show {
        /// Print the built-in defaults instead of the loaded file
        #[arg(long)]
        defaults: bool,
    },
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_at(path),
        None => AppConfig::load(),
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    let default_logging = LoggingConfig::default();
    let logging = config.as_ref().map(|c| &c.logging).unwrap_or(&default_logging);
    init_tracing(logging, cli.verbose);

    match cli.command {
        Commands::Eval {
            expression,
            context,
            user,
            safe,
        } => commands::eval::eval(
            &config?,
            &expression,
            context.as_deref(),
            user.as_deref(),
            safe,
        )?,
        Commands::Resolve {
            expression,
            context,
            user,
        } => commands::eval::resolve(&config?, &expression, context.as_deref(), user.as_deref())?,
        Commands::Parse {
            expression,
            context,
            json,
        } => commands::eval::parse(&config?, &expression, context.as_deref(), json)?,
        Commands::Validate { expression, fields } => {
            commands::validate::run(&config?, expression.as_deref(), &fields)?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { defaults: true } => commands::config_cmd::show_defaults(),
            ConfigAction::Show { defaults: false } => commands::config_cmd::show(config?)?,
            ConfigAction::Path => commands::config_cmd::path(cli.config.as_deref())?,
            ConfigAction::Validate => commands::config_cmd::validate(config)?,
        },
    }

    Ok(())
}
