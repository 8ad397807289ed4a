//! `tenure` — inspect and maintain a persistent session store from the shell.

mod sweep;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tenure_core::TenureConfig;
use tenure_session::{Payload, Session, SessionStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tenure", about = "Tenure — expiring session store")]
struct Cli {
    /// Path to config file (missing file means defaults)
    #[arg(short, long, default_value = "tenure.toml")]
    config: PathBuf,

    /// Session directory (overrides config)
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a session and print its id
    Create {
        owner: String,
        /// Lifetime in seconds (defaults to the store default)
        #[arg(long)]
        ttl: Option<u64>,
        /// Initial payload as a JSON object
        #[arg(long)]
        data: Option<String>,
    },
    /// Print a live session as JSON
    Get { id: String },
    /// Merge a JSON object into a session's payload
    Update {
        id: String,
        data: String,
        /// Replace the payload instead of merging
        #[arg(long)]
        replace: bool,
    },
    /// Give a session a new lifetime counted from now
    Extend { id: String, ttl: u64 },
    /// Delete a session
    Delete { id: String },
    /// List live sessions, optionally for one owner
    List {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Print the number of indexed sessions
    Count,
    /// Remove expired sessions once
    Cleanup,
    /// Remove every session
    Clear,
    /// Remove expired sessions periodically until Ctrl-C
    Sweep {
        /// Seconds between passes (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Parses a command-line JSON argument that must be an object.
fn parse_payload(raw: &str) -> anyhow::Result<Payload> {
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON payload: {raw}"))?;
    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => anyhow::bail!("Payload must be a JSON object, got: {other}"),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Loads the config file, applies `--storage` and opens (recovers) the store.
fn open_store(
    config_path: &Path,
    storage: Option<PathBuf>,
) -> anyhow::Result<(TenureConfig, Arc<SessionStore>)> {
    let mut config = TenureConfig::load_or_default(config_path)?;
    if let Some(storage) = storage {
        config.store.storage_path = Some(storage);
    }
    if config.store.storage_path.is_none() {
        warn!("No storage_path configured; sessions will not outlive this process");
    }

    let store = Arc::new(SessionStore::from_config(&config.store)?);
    Ok((config, store))
}

/// Live sessions for `list`. Never touches or rewrites a session.
fn list_sessions(store: &SessionStore, owner: Option<&str>) -> Vec<Session> {
    match owner {
        Some(owner) => store.get_user_sessions(owner),
        None => store.live_sessions(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let (mut config, store) = open_store(&cli.config, cli.storage)?;

    match cli.command {
        Commands::Create { owner, ttl, data } => {
            let payload = data.as_deref().map(parse_payload).transpose()?;
            let id = store.create_session(owner, payload, ttl)?;
            println!("{id}");
        }
        Commands::Get { id } => match store.get_session(&id)? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => anyhow::bail!("Session '{id}' not found"),
        },
        Commands::Update { id, data, replace } => {
            let payload = parse_payload(&data)?;
            if !store.update_session(&id, payload, !replace)? {
                anyhow::bail!("Session '{id}' not found");
            }
        }
        Commands::Extend { id, ttl } => {
            if !store.update_session_ttl(&id, ttl)? {
                anyhow::bail!("Session '{id}' not found");
            }
        }
        Commands::Delete { id } => {
            if !store.delete_session(&id)? {
                anyhow::bail!("Session '{id}' not found");
            }
        }
        Commands::List { owner } => {
            let sessions = list_sessions(&store, owner.as_deref());
            if sessions.is_empty() {
                println!("No live sessions.");
            }
            for session in &sessions {
                println!(
                    "{}  owner={}  expires_at={}",
                    session.id,
                    session.owner_id,
                    session.expires_at.to_rfc3339()
                );
            }
        }
        Commands::Count => println!("{}", store.count()),
        Commands::Cleanup => {
            let removed = sweep::sweep_once(&store).await?;
            println!("Removed {removed} expired session(s)");
        }
        Commands::Clear => {
            store.clear()?;
            println!("All sessions removed");
        }
        Commands::Sweep { interval } => {
            if let Some(interval_secs) = interval {
                config.sweep.interval_secs = interval_secs;
            }
            config.sweep.validate()?;

            let interval = Duration::from_secs(config.sweep.interval_secs);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
            };
            let removed = sweep::run(Arc::clone(&store), interval, shutdown).await;
            info!(removed, "Sweep finished");
        }
    }

    Ok(())
}
