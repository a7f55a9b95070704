//! pagerduty-handler - manage `PagerDuty` incidents from monitoring events.
//!
//! Reads one event as JSON from stdin (or `--event <file>`) and triggers or
//! resolves the matching incident.
//!
//! ```bash
//! export PAGERDUTY_TOKEN=R0UT1NGK3Y
//! pagerduty-handler --sensu-base-url https://sensu.example.com < event.json
//! ```

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use pagerduty_handler::cli::Cli;
use pagerduty_handler::{pipeline, Event, HandlebarsEvaluator, ProcessEnv};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "pagerduty_handler=debug,pagerduty=debug"
    } else {
        "pagerduty_handler=info,pagerduty=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let input = match &cli.event {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event from {}", path.display()))?,
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read event from stdin")?;
            input
        }
    };
    let event: Event = serde_json::from_str(&input).context("Failed to parse event")?;

    let config = cli.into_config()?;
    let templates = HandlebarsEvaluator::new();

    let outcomes = pipeline::run(&config, &event, &templates, &ProcessEnv).await?;
    tracing::debug!(
        deliveries = outcomes.len(),
        fallbacks = outcomes.iter().filter(|outcome| outcome.used_fallback()).count(),
        "Event handled"
    );
    Ok(())
}
