//! Command-line interface parsing for kudoscache
//!
//! This module handles parsing of CLI arguments using clap. Global flags
//! override the environment-derived [`CacheSettings`]; subcommands map onto
//! cache operations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;

use crate::config::{duration_from_minutes, BackendKind, CacheSettings, ConfigError};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A key parameter was not written as NAME=VALUE
    #[error("Invalid parameter: '{0}'. Expected NAME=VALUE")]
    InvalidParam(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// kudoscache - Inspect and maintain the API response cache used for team assessments
#[derive(Parser, Debug)]
#[command(name = "kudoscache")]
#[command(about = "Inspect and maintain the API response cache used for team assessments")]
#[command(version)]
pub struct Cli {
    /// Cache directory (overrides KUDOSCACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cache backend: file, memory or none (overrides KUDOSCACHE_BACKEND)
    #[arg(long, global = true, value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Default TTL in minutes for reads (overrides KUDOSCACHE_TTL_MINUTES)
    #[arg(long, global = true, value_name = "MINUTES")]
    pub ttl_minutes: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the cached payload for a key; exits 1 if there is no fresh entry
    Get { key: String },

    /// Store a JSON payload under a key
    Put { key: String, json: String },

    /// Remove the entry for a key
    Invalidate { key: String },

    /// Remove every entry owned by the cache
    Clear,

    /// Remove entries older than the given age
    Purge {
        #[arg(long, value_name = "MINUTES")]
        older_than_minutes: u64,
    },

    /// Print the cache key derived from a prefix and NAME=VALUE parameters
    ///
    /// Examples:
    ///   kudoscache key slack_history channel=C123 year=2025
    Key {
        prefix: String,
        #[arg(value_name = "NAME=VALUE")]
        params: Vec<String>,
    },

    /// Fetch a Slack channel's history through the cache (needs SLACK_BOT_TOKEN)
    SlackHistory {
        #[arg(long)]
        channel: String,
        /// Only messages after this Slack timestamp
        #[arg(long)]
        oldest: Option<String>,
        /// Only messages before this Slack timestamp
        #[arg(long)]
        latest: Option<String>,
    },
}

/// Parses a NAME=VALUE key parameter
pub fn parse_param_arg(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidParam(s.to_string())),
    }
}

/// Parses all key parameters into a sorted map
pub fn parse_params(params: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    params.iter().map(|p| parse_param_arg(p)).collect()
}

/// Applies the global CLI flags on top of environment settings
pub fn resolve_settings(cli: &Cli, mut settings: CacheSettings) -> Result<CacheSettings, CliError> {
    if let Some(backend) = &cli.backend {
        settings.backend = backend.parse::<BackendKind>()?;
    }
    if let Some(dir) = &cli.cache_dir {
        settings.dir = Some(dir.clone());
    }
    if let Some(minutes) = cli.ttl_minutes {
        settings.default_ttl = Some(duration_from_minutes(minutes)?);
    }
    Ok(settings)
}

/// Maps the -v count to a tracing filter directive
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
