//! nlq-gateway - Main entry point.
//!
//! One-shot CLI: loads the database registry from the environment, wires
//! the gateway together, answers a single question, and prints the result
//! as JSON. The surrounding UI/API layer is expected to embed the library
//! the same way.

use clap::Parser;
use nlq_gateway::config::{self, Settings};
use nlq_gateway::db::{MongoDocumentDriver, SqlxRelationalDriver};
use nlq_gateway::gateway::{Gateway, GatewayConfig};
use nlq_gateway::interpret::{DisabledInterpreter, HttpInterpreter, Interpreter};
use nlq_gateway::router::{Mode, Router};
use nlq_gateway::registry::RegistryHandle;
use nlq_gateway::validator::{DocumentValidatorConfig, SqlValidatorConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "nlq-gateway",
    about = "Answer natural-language business questions from configured data stores",
    version
)]
struct Cli {
    /// The question to answer.
    question: String,

    /// Declared request intent.
    #[arg(long, value_enum, default_value = "open")]
    mode: Mode,

    #[command(flatten)]
    settings: Settings,
}

/// Initialize the tracing subscriber for logging.
fn init_tracing(settings: &Settings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if settings.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.settings);

    let report = config::load_registry_from_env()?;
    for (name, error) in &report.skipped {
        warn!(database = %name, error = %error, "Database entry skipped");
    }
    info!(
        databases = report.registry.len(),
        default = report.registry.default_name().unwrap_or("-"),
        "Registry loaded"
    );

    let interpreter: Arc<dyn Interpreter> = match (
        &cli.settings.interpreter_url,
        &cli.settings.interpreter_api_key,
    ) {
        (Some(url), Some(key)) => Arc::new(HttpInterpreter::new(
            url.clone(),
            key.clone(),
            cli.settings.interpreter_model.clone(),
        )),
        _ => {
            warn!("No interpretation service configured; only template requests will resolve");
            Arc::new(DisabledInterpreter)
        }
    };

    let gateway = Gateway::new(
        RegistryHandle::new(report.registry),
        Router::with_builtin_rules(),
        interpreter,
        Arc::new(SqlxRelationalDriver::new()),
        Arc::new(MongoDocumentDriver::new()),
        GatewayConfig {
            interpret_timeout: cli.settings.interpret_timeout_duration(),
            query_timeout: cli.settings.query_timeout_duration(),
            max_rows: cli.settings.max_result_rows,
            sql: SqlValidatorConfig {
                max_rows: cli.settings.max_result_rows,
                ..SqlValidatorConfig::default()
            },
            document: DocumentValidatorConfig::default(),
        },
    );

    match gateway.answer(&cli.question, cli.mode).await {
        Ok(answer) => {
            println!("{}", serde_json::to_string_pretty(&answer)?);
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "Request failed");
            let rendered = serde_json::json!({
                "error": err.user_message(),
            });
            println!("{}", serde_json::to_string_pretty(&rendered)?);
            std::process::exit(1);
        }
    }
}
