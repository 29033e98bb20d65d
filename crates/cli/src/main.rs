// Tabsight CLI - natural-language queries and insights over tabular JSON

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{debug, info};
use serde::Serialize;

use tabsight_ai_client::OpenAiCompatibleClient;
use tabsight_cli::api;
use tabsight_cli::exit_codes::{
    status_exit_code, EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_ERROR, EXIT_INVALID_REQUEST, EXIT_IO,
    EXIT_SUCCESS, EXIT_USAGE,
};
use tabsight_config::ai::{AIConfigStatus, AIDiagnostics, ResolvedAIConfig};
use tabsight_config::settings::Settings;
use tabsight_engine::clock::{iso_timestamp, Clock};
use tabsight_engine::{QueryEngine, SystemClock};
use tabsight_protocol::{Envelope, Response, Status};

#[derive(Parser)]
#[command(name = "tabsight")]
#[command(about = "Ask questions of tabular data in plain language")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter, sort and summarize rows from a {query, data, columns} request
    #[command(after_help = "\
Examples:
  tabsight query request.json
  tabsight query request.json --query 'show top performers'
  cat request.json | tabsight query - --offline --compact
  tabsight query request.json --limit 100")]
    Query {
        /// Request file (omit or `-` for stdin)
        input: Option<PathBuf>,

        /// Query text; replaces the request's `query` field
        #[arg(long, short = 'q')]
        query: Option<String>,

        /// Return at most N rows (totalCount still counts every match)
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Use keyword interpretation and built-in insights only
        #[arg(long)]
        offline: bool,

        /// Print JSON on one line
        #[arg(long)]
        compact: bool,
    },

    /// Generate insights for a {data, columns} request
    Insights {
        /// Request file (omit or `-` for stdin)
        input: Option<PathBuf>,

        /// Use built-in insights only
        #[arg(long)]
        offline: bool,

        /// Print JSON on one line
        #[arg(long)]
        compact: bool,
    },

    /// Print per-column statistics for a {data, columns} request
    Stats {
        /// Request file (omit or `-` for stdin)
        input: Option<PathBuf>,

        /// Print JSON on one line
        #[arg(long)]
        compact: bool,
    },

    /// Print the service health report
    Health {
        /// Print JSON on one line
        #[arg(long)]
        compact: bool,
    },

    /// AI provider diagnostics
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Show the resolved AI configuration and whether it is usable
    #[command(after_help = "\
Exit codes:
  0   AI ready
  10  AI disabled (provider=none)
  11  Provider selected but no API key")]
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  tabsight-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
        "\nprotocol_version: 1",
    )
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries exactly one JSON document
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query { input, query, limit, offline, compact } => {
            cmd_query(input, query, limit, offline, compact)
        }
        Commands::Insights { input, offline, compact } => cmd_insights(input, offline, compact),
        Commands::Stats { input, compact } => cmd_stats(input, compact),
        Commands::Health { compact } => cmd_health(compact),
        Commands::Ai { command } => match command {
            AiCommands::Doctor { json } => cmd_ai_doctor(json),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = &e.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
struct CliError {
    code: u8,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn args(message: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: message.into(), hint: None }
    }

    fn io(message: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: message.into(), hint: None }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: message.into(), hint: None }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_query(
    input: Option<PathBuf>,
    query: Option<String>,
    limit: Option<usize>,
    offline: bool,
    compact: bool,
) -> Result<(), CliError> {
    let settings = Settings::load();
    let mut body = read_input(input.as_ref())?;
    if let Some(text) = query {
        body = replace_query(&body, &text);
    }
    if limit == Some(0) {
        return Err(CliError::args("--limit must be at least 1"));
    }

    let engine = build_engine(&settings, offline, limit);
    let response = api::handle_query(&engine, &body, &SystemClock);
    finish(response, pretty(&settings, compact))
}

fn cmd_insights(input: Option<PathBuf>, offline: bool, compact: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let body = read_input(input.as_ref())?;
    let engine = build_engine(&settings, offline, None);
    let response = api::handle_insights(&engine, &body, &SystemClock);
    finish(response, pretty(&settings, compact))
}

fn cmd_stats(input: Option<PathBuf>, compact: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let body = read_input(input.as_ref())?;
    let pretty = pretty(&settings, compact);

    match api::statistics(&QueryEngine::new(), &body) {
        Ok(stats) => print_json(&stats, pretty),
        Err(e) => {
            finish(
                Response {
                    status: Status::BadRequest,
                    body: Envelope::rejected(&e, iso_timestamp(SystemClock.now())),
                },
                pretty,
            )
        }
    }
}

fn cmd_health(compact: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let config = ResolvedAIConfig::from_settings(&settings.ai);
    let report = api::health(&config, &SystemClock);
    print_json(&report, pretty(&settings, compact))
}

fn cmd_ai_doctor(json: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let config = ResolvedAIConfig::from_settings(&settings.ai);
    let diag = AIDiagnostics::from_resolved(&config);
    let validation = config.validate_config();

    if json {
        let report = serde_json::json!({
            "schema_version": 1,
            "status": diag.status.as_str(),
            "blocking_reason": diag.blocking_reason,
            "provider": diag.provider,
            "auto_selected": diag.auto_selected,
            "model": if diag.model.is_empty() { None } else { Some(&diag.model) },
            "endpoint": diag.endpoint,
            "timeout_secs": diag.timeout_secs,
            "key": if diag.key_present { "present" } else { "missing" },
            "key_source": diag.key_source.as_str(),
            "keychain": if diag.keychain_available { "ok" } else { "unavailable" },
            "config_path": Settings::config_path_display(),
            "validation": validation.as_str(),
        });
        print_json(&report, true)?;
    } else {
        print!("{}", diag);
        println!("Validation:        {}", validation.as_str());
        println!("Settings file:     {}", Settings::config_path_display());

        match diag.status {
            AIConfigStatus::Disabled => {
                println!();
                println!("AI is disabled; queries use keyword interpretation. To enable:");
                println!("  Set ai.provider in {}", Settings::config_path_display());
                println!("  or export OPENAI_API_KEY");
            }
            AIConfigStatus::MissingKey => {
                if let Some(reason) = &diag.blocking_reason {
                    println!();
                    println!("Fix: {}", reason);
                }
            }
            AIConfigStatus::Ready => {}
        }
    }

    match diag.status {
        AIConfigStatus::Ready => Ok(()),
        AIConfigStatus::Disabled => Err(CliError {
            code: EXIT_AI_DISABLED,
            message: "AI is disabled".to_string(),
            hint: None,
        }),
        AIConfigStatus::MissingKey => Err(CliError {
            code: EXIT_AI_MISSING_KEY,
            message: format!(
                "AI misconfigured: {}",
                diag.blocking_reason.unwrap_or_else(|| "missing API key".to_string())
            ),
            hint: None,
        }),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Engine for the current settings. The remote provider is attached only
/// when the resolved configuration is ready and `--offline` was not given.
fn build_engine(settings: &Settings, offline: bool, limit: Option<usize>) -> QueryEngine {
    let mut engine = QueryEngine::new();
    if let Some(limit) = limit.or(settings.max_rows) {
        engine = engine.with_max_rows(limit);
    }
    if offline {
        debug!("offline: remote interpretation disabled");
        return engine;
    }

    let config = ResolvedAIConfig::from_settings(&settings.ai);
    match OpenAiCompatibleClient::from_config(&config) {
        Ok(client) => {
            info!("remote interpretation via {} ({})", config.provider_name(), client.model());
            engine.with_remote(Box::new(client))
        }
        Err(e) => {
            debug!("remote interpretation unavailable: {}", e);
            engine
        }
    }
}

/// Read a request body from `path`, or stdin when absent or `-`.
fn read_input(path: Option<&PathBuf>) -> Result<String, CliError> {
    match path {
        Some(p) if p.as_os_str() != "-" => fs::read_to_string(p)
            .map_err(|e| CliError::io(format!("cannot read {}: {}", p.display(), e))),
        _ => {
            let mut body = String::new();
            io::stdin()
                .read_to_string(&mut body)
                .map_err(|e| CliError::io(format!("cannot read stdin: {}", e)))?;
            Ok(body)
        }
    }
}

/// Set `query` on a JSON object body. Anything else is returned unchanged so
/// that validation reports it.
fn replace_query(body: &str, query: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.insert("query".to_string(), serde_json::Value::String(query.to_string()));
            serde_json::Value::Object(map).to_string()
        }
        _ => body.to_string(),
    }
}

fn pretty(settings: &Settings, compact: bool) -> bool {
    settings.pretty && !compact
}

/// Print the envelope, then map a non-200 status to its exit code.
fn finish(response: Response, pretty: bool) -> Result<(), CliError> {
    print_json(&response.body, pretty)?;

    match response.status {
        Status::Ok => Ok(()),
        status => {
            let message = response.body.error.unwrap_or_else(|| "request failed".to_string());
            let err = CliError { code: status_exit_code(status), message, hint: None };
            Err(if err.code == EXIT_INVALID_REQUEST {
                err.with_hint("request bodies look like {\"query\": \"...\", \"data\": [...], \"columns\": [...]}")
            } else {
                err
            })
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| CliError::internal(format!("cannot serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}
