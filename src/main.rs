//! tabload command-line interface.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tabload::config;
use tabload::models::TableMode;
use tabload::state::StateStore;
use tabload::{run_ingest, IngestJob, QueryExtract};

#[derive(Parser)]
#[command(name = "tabload", version, about = "Scheduled tabular ingest into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one ad-hoc ingest from a SQL query.
    Run(RunArgs),
    /// Show persisted model run state.
    State(StateArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Environment variable holding the source DSN.
    #[arg(long, value_name = "VAR")]
    source_env: String,

    /// Environment variable holding the destination DSN.
    #[arg(long, value_name = "VAR")]
    dest_env: String,

    /// Destination table as schema.table (schema defaults to public).
    #[arg(long, value_name = "TABLE")]
    dest_table: String,

    /// Extraction query text.
    #[arg(long, conflicts_with = "query_file")]
    query: Option<String>,

    /// File containing the extraction query.
    #[arg(long, value_name = "PATH")]
    query_file: Option<PathBuf>,

    /// full (replace) or incremental (append).
    #[arg(long, default_value = "full")]
    mode: TableMode,

    /// Five-field cron expression; enables gating and run-state tracking.
    #[arg(long, value_name = "CRON")]
    schedule: Option<String>,

    /// Opaque start boundary forwarded to the query context.
    #[arg(long)]
    start: Option<String>,

    /// Opaque end boundary forwarded to the query context.
    #[arg(long)]
    end: Option<String>,

    /// Run even if the schedule says the model is not due.
    #[arg(long)]
    force: bool,

    /// Suppress per-phase progress logging.
    #[arg(long)]
    quiet: bool,

    /// Extra key=value parameters forwarded to the extraction context.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Explicit destination column types, as column=TYPE. Wins over inference.
    #[arg(long = "col-type", value_name = "COLUMN=TYPE")]
    col_types: Vec<String>,
}

#[derive(Args)]
struct StateArgs {
    /// Show a single model instead of all of them.
    #[arg(long, value_name = "NAME")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::State(args) => state(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let query = match (args.query, args.query_file) {
        (Some(q), None) => q,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading query file {}", path.display()))?,
        _ => bail!("exactly one of --query or --query-file is required"),
    };

    let col_types = parse_pairs(&args.col_types, "--col-type")?;
    let job = IngestJob {
        mode: args.mode,
        schedule: args.schedule,
        start: args.start,
        end: args.end,
        force: args.force,
        verbose: !args.quiet,
        col_types: if col_types.is_empty() {
            None
        } else {
            Some(col_types)
        },
        params: parse_pairs(&args.params, "--param")?,
        ..IngestJob::new(args.dest_env, args.dest_table)
    };

    let extract = QueryExtract {
        source_env: args.source_env,
        query,
    };
    let report = run_ingest(&job, &extract).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn state(args: StateArgs) -> Result<()> {
    let store = StateStore::connect(&config::state_dsn()?).await?;
    let records = match &args.model {
        Some(name) => store.get(name).await?.into_iter().collect(),
        None => store.all().await?,
    };

    if records.is_empty() {
        println!("no run state recorded");
        return Ok(());
    }
    for record in records {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

fn parse_pairs(raw: &[String], flag: &str) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("{flag} expects KEY=VALUE, got {entry:?}"))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}
