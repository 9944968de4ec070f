//! Doorward CLI
//!
//! Runs the access decision server, or evaluates a single credential
//! against a seed file offline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use doorward_access::{AccessCache, AccessService};
use doorward_api::{ApiConfig, ApiServer};
use doorward_core::traits::FixedClock;
use doorward_core::types::{Credential, CredentialType};
use doorward_store::{MemoryStore, StoreSnapshot};

/// Doorward - schedule-based door access decisions
#[derive(Parser)]
#[command(name = "doorward")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
        /// Bind address
        #[arg(short, long, env = "BIND_ADDR")]
        bind: Option<String>,
        /// JSON seed file for the in-memory store
        #[arg(short, long, env = "SEED_FILE")]
        seed: Option<PathBuf>,
        /// libSQL/Turso database URL
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        /// Greet granted users by name
        #[arg(long)]
        include_display_name: bool,
    },

    /// Evaluate one credential against a seed file
    Verify {
        /// JSON seed file
        #[arg(short, long)]
        seed: PathBuf,
        /// Sensor id
        #[arg(long)]
        sensor: String,
        /// Fingerprint or NFC identifier
        #[arg(long)]
        key: String,
        /// Credential type (FINGERPRINT or NFC)
        #[arg(long = "type", default_value = "FINGERPRINT")]
        kind: CredentialType,
        /// Local time to evaluate at (YYYY-MM-DDTHH:MM), defaults to now
        #[arg(long, value_parser = parse_at)]
        at: Option<NaiveDateTime>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "doorward=debug,tower_http=debug,info"
    } else {
        "doorward=info,warn"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if cli.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    match cli.command {
        Commands::Serve {
            port,
            bind,
            seed,
            database_url,
            include_display_name,
        } => cmd_serve(port, bind, seed, database_url, include_display_name).await,
        Commands::Verify {
            seed,
            sensor,
            key,
            kind,
            at,
        } => cmd_verify(&seed, sensor, key, kind, at).await,
    }
}

fn parse_at(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM, got '{}'", raw))
}

/// Run the API server
async fn cmd_serve(
    port: Option<u16>,
    bind: Option<String>,
    seed: Option<PathBuf>,
    database_url: Option<String>,
    include_display_name: bool,
) -> Result<()> {
    let mut config = ApiConfig::from_env().context("Invalid server configuration")?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if seed.is_some() {
        config.seed_file = seed;
    }
    if database_url.is_some() {
        config.database_url = database_url;
    }
    config.include_display_name |= include_display_name;

    println!("{}", "🚪 Starting Doorward API server...".cyan().bold());
    println!("   Address: {}", config.listen_addr().yellow());
    match (&config.database_url, &config.seed_file) {
        (Some(url), _) => println!("   Store:   libSQL {}", url.dimmed()),
        (None, Some(path)) => println!("   Store:   seed {}", path.display().to_string().dimmed()),
        (None, None) => println!("   Store:   {}", "empty (no SEED_FILE)".yellow()),
    }
    println!();
    println!("   Endpoints:");
    println!("   POST /verify-access");
    println!("   POST /clear-access-cache[?sensorIds=a,b]");
    println!("   GET  /health");
    println!();

    let server = ApiServer::from_config(config)
        .await
        .context("Failed to initialise schedule store")?;
    server.run().await.context("Server error")?;

    Ok(())
}

/// Evaluate one credential against a seed file
async fn cmd_verify(
    seed: &Path,
    sensor: String,
    key: String,
    kind: CredentialType,
    at: Option<NaiveDateTime>,
) -> Result<()> {
    let snapshot = StoreSnapshot::load(seed)
        .await
        .with_context(|| format!("Failed to load seed {}", seed.display()))?;
    let store = Arc::new(MemoryStore::from_snapshot(snapshot)?);

    let at = at.unwrap_or_else(|| Local::now().naive_local());
    tracing::debug!(%at, seed = %seed.display(), "Evaluating credential offline");
    let service = AccessService::new(Arc::new(AccessCache::new()), store.clone(), store.clone())
        .with_clock(Arc::new(FixedClock::new(at)));

    println!(
        "{} {} at {} ({})",
        "🔍 Verifying".cyan().bold(),
        format!("{}:{}", kind, key).yellow(),
        sensor.yellow(),
        at.format("%A %Y-%m-%d %H:%M")
    );

    let decision = service
        .verify(Credential::new(sensor, key, kind))
        .await
        .context("Verification failed")?;
    service.drain(Duration::from_secs(1)).await;

    if decision.granted {
        let who = decision
            .subject
            .as_ref()
            .map(|s| s.display_name.clone().unwrap_or_else(|| s.user_id.clone()))
            .unwrap_or_default();
        println!("   {} Access granted to {}", "✅".green(), who.green().bold());
    } else {
        println!("   {} Denied: {}", "❌".red(), decision.reason.red());
    }

    for record in store.audit_records() {
        println!("   audit: {}", serde_json::to_string(&record)?.dimmed());
    }

    Ok(())
}
