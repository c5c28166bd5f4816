//! kudoscache - inspect and maintain the assessment API response cache
//!
//! Reads cache settings from the environment, applies command-line overrides,
//! and runs one cache operation.

use std::error::Error;
use std::io;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use kudoscache::cache::{CacheKey, CacheManager};
use kudoscache::cli::{log_filter, parse_params, resolve_settings, Cli, CliError, Command};
use kudoscache::clients::SlackClient;
use kudoscache::config::{duration_from_minutes, CacheSettings};

/// Sets up logging to stderr; `-v` flags take precedence over RUST_LOG
fn init_tracing(verbose: u8) {
    let filter = if verbose > 0 {
        EnvFilter::new(log_filter(verbose))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(0)))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let settings = CacheSettings::from_env()
        .map_err(CliError::from)
        .and_then(|settings| resolve_settings(&cli, settings));
    // Opened on demand so `key` works without a usable cache configuration.
    let open_cache = move || -> Result<CacheManager, Box<dyn Error>> {
        Ok(CacheManager::from_settings(&settings?)?)
    };

    match cli.command {
        Command::Key { prefix, params } => {
            let params = parse_params(&params)?;
            println!("{}", CacheKey::from_params(&prefix, &params)?);
        }
        Command::Get { key } => {
            let key = CacheKey::new(key)?;
            match open_cache()?.load_value(&key, None) {
                Some(payload) => print_json(&payload)?,
                None => {
                    eprintln!("No fresh cache entry for '{}'", key);
                    return Ok(ExitCode::from(1));
                }
            }
        }
        Command::Put { key, json } => {
            let key = CacheKey::new(key)?;
            let payload: Value = serde_json::from_str(&json)?;
            open_cache()?.save(&key, &payload)?;
        }
        Command::Invalidate { key } => {
            open_cache()?.invalidate(&CacheKey::new(key)?)?;
        }
        Command::Clear => {
            open_cache()?.clear_all()?;
        }
        Command::Purge { older_than_minutes } => {
            let max_age = duration_from_minutes(older_than_minutes)?;
            let removed = open_cache()?.purge_expired(max_age)?;
            println!("Removed {} expired entries", removed);
        }
        Command::SlackHistory {
            channel,
            oldest,
            latest,
        } => {
            let client = SlackClient::from_env(open_cache()?)?;
            let messages = client
                .conversation_history(&channel, oldest.as_deref(), latest.as_deref())
                .await?;
            print_json(&messages)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
