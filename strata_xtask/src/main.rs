use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::Value as JsonValue;
use strata_store::{
    FieldPath, LifecycleApi, NodeId, ObjectStore, ObjectWriteApi, SeriesApi, SnapshotApi,
    StrataError, Timestamp, Value, load_or_init_config, open_store,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let base = cli.base;
    match cli.command {
        Command::Init => init(base).await,
        Command::Insert(args) => insert(base, args).await,
        Command::InsertField(args) => insert_field(base, args).await,
        Command::Snapshot(args) => snapshot(base, args).await,
        Command::Series(args) => series(base, args).await,
        Command::Search(args) => search(base, args).await,
        Command::Exists(args) => exists(base, args).await,
        Command::Remove(args) => remove(base, args).await,
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Operator utilities for a strata object time-series store"
)]
struct Cli {
    /// Directory holding `strata.json` (and the sqlite file for the default backend).
    #[arg(long, global = true, default_value = ".strata")]
    base: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config if missing and provision the partition tables.
    Init,
    /// Record a JSON object for a node at one event time.
    Insert(InsertArgs),
    /// Record a single field value for a node.
    InsertField(InsertFieldArgs),
    /// Print the reconstructed object of a node, optionally as of an instant.
    Snapshot(SnapshotArgs),
    /// Print the most recent values of one field, newest first.
    Series(SeriesArgs),
    /// List nodes whose field held a value at or before an instant.
    Search(SearchArgs),
    /// Report whether a node has any stored observation.
    Exists(NodeArgs),
    /// Delete every observation of a node.
    Remove(RemoveArgs),
}

#[derive(Parser)]
struct InsertArgs {
    #[arg(long)]
    node: String,
    /// Object to record, inline JSON or `@path/to/file.json`.
    #[arg(long)]
    json: String,
    /// Event time in epoch milliseconds (defaults to now).
    #[arg(long)]
    at: Option<i64>,
}

#[derive(Parser)]
struct InsertFieldArgs {
    #[arg(long)]
    node: String,
    /// Dotted path such as `.sub.value`.
    #[arg(long)]
    field: String,
    #[arg(long)]
    json: String,
    #[arg(long)]
    at: Option<i64>,
}

#[derive(Parser)]
struct SnapshotArgs {
    #[arg(long)]
    node: String,
    /// Reconstruct as of this instant instead of the current state.
    #[arg(long)]
    at: Option<i64>,
}

#[derive(Parser)]
struct SeriesArgs {
    #[arg(long)]
    node: String,
    #[arg(long)]
    field: String,
    #[arg(long)]
    at: Option<i64>,
    #[arg(long, default_value_t = 100)]
    limit: u32,
}

#[derive(Parser)]
struct SearchArgs {
    #[arg(long)]
    field: String,
    /// Value to match exactly, as JSON (`"on"`, `42`, `true`).
    #[arg(long)]
    json: String,
    #[arg(long)]
    at: Option<i64>,
    #[arg(long, default_value_t = 100)]
    limit: u32,
}

#[derive(Parser)]
struct NodeArgs {
    #[arg(long)]
    node: String,
}

#[derive(Parser)]
struct RemoveArgs {
    #[arg(long)]
    node: String,
    /// Confirm that the node's whole history should be deleted.
    #[arg(long, default_value_t = false)]
    yes: bool,
}

async fn init(base: PathBuf) -> Result<()> {
    let config = load_or_init_config(&base)
        .with_context(|| format!("load config under {}", base.display()))?;
    let store = ObjectStore::connect(&config, &base).await?;
    let tables: Vec<&str> = store.router().table_names().collect();
    info!("initialized {} backend under {}", config.backend_name(), base.display());
    print_json(&serde_json::json!({
        "backend": config.backend_name(),
        "nodeKind": store.node_kind(),
        "locking": store.locking_enabled(),
        "partitions": tables,
    }))
}

async fn insert(base: PathBuf, args: InsertArgs) -> Result<()> {
    let store = open(&base).await?;
    let node = NodeId::parse(store.node_kind(), &args.node)?;
    let object = parse_value(&args.json)?;
    let receipts = store
        .insert_object(&node, &object, instant(args.at)?)
        .await?;
    print_json(&receipts)
}

async fn insert_field(base: PathBuf, args: InsertFieldArgs) -> Result<()> {
    let store = open(&base).await?;
    let node = NodeId::parse(store.node_kind(), &args.node)?;
    let field = FieldPath::parse(&args.field)?;
    let value = parse_value(&args.json)?;
    let receipt = store
        .insert_field(&node, &field, &value, instant(args.at)?)
        .await?;
    print_json(&receipt)
}

async fn snapshot(base: PathBuf, args: SnapshotArgs) -> Result<()> {
    let store = open(&base).await?;
    let node = NodeId::parse(store.node_kind(), &args.node)?;
    let snapshot = match args.at {
        Some(at) => {
            store
                .synthesize_object_at(&node, Timestamp::from_millis(at)?)
                .await?
        }
        None => store.synthesize_object(&node).await?,
    };
    print_json(&snapshot)
}

async fn series(base: PathBuf, args: SeriesArgs) -> Result<()> {
    let store = open(&base).await?;
    let node = NodeId::parse(store.node_kind(), &args.node)?;
    let field = FieldPath::parse(&args.field)?;
    let points = store
        .get_series(&node, &field, instant(args.at)?, args.limit)
        .await?;
    print_json(&points)
}

async fn search(base: PathBuf, args: SearchArgs) -> Result<()> {
    let store = open(&base).await?;
    let field = FieldPath::parse(&args.field)?;
    let value = parse_value(&args.json)?;
    let hits = store
        .search(&field, &value, instant(args.at)?, args.limit)
        .await?;
    print_json(&hits)
}

async fn exists(base: PathBuf, args: NodeArgs) -> Result<()> {
    let store = open(&base).await?;
    let node = NodeId::parse(store.node_kind(), &args.node)?;
    let found = store.exists(&node).await?;
    print_json(&serde_json::json!({ "node": node, "exists": found }))
}

async fn remove(base: PathBuf, args: RemoveArgs) -> Result<()> {
    let store = open(&base).await?;
    let node = NodeId::parse(store.node_kind(), &args.node)?;
    let removed = match store.remove(&node, args.yes).await {
        Err(StrataError::ConfirmationRequired { message }) => {
            return Err(anyhow!("{message} (re-run with --yes)"));
        }
        other => other?,
    };
    info!("removed node {node}");
    print_json(&serde_json::json!({ "node": node, "removed": removed }))
}

async fn open(base: &Path) -> Result<ObjectStore> {
    open_store(base)
        .await
        .with_context(|| format!("open store under {}", base.display()))
}

fn instant(at: Option<i64>) -> Result<Timestamp> {
    match at {
        Some(millis) => Ok(Timestamp::from_millis(millis)?),
        None => Ok(Timestamp::now()),
    }
}

fn parse_value(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("read {path}"))?,
        None => raw.to_string(),
    };
    let json: JsonValue = serde_json::from_str(&text).context("parse JSON value")?;
    Ok(Value::from_json(json)?)
}

fn print_json<T: serde::Serialize + ?Sized>(payload: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}
