//! DB Read Router - Main entry point.
//!
//! Installs the router from the command line and runs each `--query` as a
//! routed read, printing the results as JSON.

use clap::Parser;
use db_read_router::config::Config;
use db_read_router::models::QueryRequest;
use db_read_router::routing::{ReadRouter, RoutingContext, RoutingOverride};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Logs go to stderr so stdout carries only query results
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!("Starting DB Read Router v{}", env!("CARGO_PKG_VERSION"));

    let router_config = config.router_config()?;
    let router = match ReadRouter::install(&router_config).await {
        Ok(router) => router,
        Err(e) => {
            error!(error = %e, "Failed to connect to the primary");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            return Err(e.into());
        }
    };

    let default_override = if config.force_primary {
        RoutingOverride::ForcePrimary
    } else {
        RoutingOverride::NoOverride
    };
    let ctx = RoutingContext::with_override(default_override);

    if config.queries.is_empty() {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "reader": router.reader_state() }))?
        );
    }

    let mut failed = false;
    for sql in &config.queries {
        let route = router.route_for(&ctx);
        let request = QueryRequest::new(sql).with_decode_binary(config.decode_binary);
        let output = match router.execute_read(&ctx, &request).await {
            Ok(result) => json!({ "sql": sql, "route": route.to_string(), "result": result }),
            Err(e) => {
                failed = true;
                error!(error = %e, sql = %sql, "Query failed");
                json!({
                    "sql": sql,
                    "route": route.to_string(),
                    "error": e.to_string(),
                    "suggestion": e.suggestion(),
                })
            }
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    router.close().await;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
