//! swipl-query: run Prolog queries from stdin against one long-running process.
//!
//! Each input line is one query. Every solution is printed as a line of
//! `Var = Value` pairs; `false.` marks a query with no (more) solutions.

use std::io::Write;

use anyhow::{Context, Result};
use swipl_engine::{Bindings, Engine, EngineConfig, EngineError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Render one solution the way the Prolog toplevel does.
fn format_bindings(bindings: &Bindings) -> String {
    if bindings.is_empty() {
        return "true.".to_string();
    }
    let pairs: Vec<String> = bindings
        .iter()
        .map(|(name, value)| format!("{} = {}", name, value))
        .collect();
    format!("{}.", pairs.join(",\n"))
}

async fn run_query(engine: &Engine, text: &str, out: &mut impl Write) -> Result<()> {
    let query = engine.create_query(text)?.await?;
    let mut found = false;
    loop {
        match query.next()?.await {
            Ok(Some(bindings)) => {
                found = true;
                writeln!(out, "{}", format_bindings(&bindings))?;
            }
            Ok(None) => {
                if !found {
                    writeln!(out, "false.")?;
                }
                break;
            }
            Err(EngineError::Query(message)) => {
                writeln!(out, "ERROR: {}", message)?;
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "swipl_engine=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = EngineConfig::from_env();
    tracing::info!("Starting swipl-query v{}", env!("CARGO_PKG_VERSION"));
    let engine = Engine::spawn(&config)
        .with_context(|| format!("Failed to start {}", config.program))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let stdout = std::io::stdout();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let text = line.trim().trim_end_matches('.');
        if text.is_empty() {
            continue;
        }
        run_query(&engine, text, &mut stdout.lock())
            .await
            .with_context(|| format!("Query failed: {}", text))?;
    }

    engine.close();
    tracing::info!("swipl-query exited cleanly");
    Ok(())
}
